//! MQTT 3.1.1 wire transport for embedded systems.
//!
//! [`WireTransport`] speaks the MQTT 3.1.1 protocol over any connection opened
//! by a [`Connect`] implementation. It keeps a single fixed-size packet buffer,
//! publishes at QoS 0, and acknowledges inbound QoS 1 and QoS 2 messages.
//!
//! # Keepalive
//!
//! [`poll`](Transport::poll) sends a PINGREQ once the connection has been idle
//! for the keepalive interval in either direction. If the broker has not
//! answered by the time the next interval elapses, the session is dropped and
//! `poll` returns [`Error::Timeout`].
//!
//! # Partial packets
//!
//! Reads returning `Ok(0)` or [`Error::Timeout`] mean no data yet. A packet
//! that arrives in pieces is assembled across `poll` calls and handled once
//! complete. A peer that closes the stream must be reported as an error such
//! as [`Error::ConnectionClosed`]. The CONNACK is the exception: `connect`
//! expects it in the reads that follow CONNECT.
//!
//! # Examples
//!
//! ```rust,no_run
//! use minimqtt::network::application::mqtt::WireTransport;
//! # use minimqtt::network::{Close, Connect, Connection, Read, Write};
//! # use minimqtt::network::error::Error;
//! # struct TcpConnection;
//! # impl Connection for TcpConnection {}
//! # impl Read for TcpConnection {
//! #     type Error = Error;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for TcpConnection {
//! #     type Error = Error;
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for TcpConnection {
//! #     type Error = Error;
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct TcpStack;
//! # impl Connect for TcpStack {
//! #     type Connection = TcpConnection;
//! #     type Error = Error;
//! #     fn connect(&mut self, _remote: &str) -> Result<TcpConnection, Error> { Ok(TcpConnection) }
//! # }
//!
//! let transport = WireTransport::new(TcpStack);
//! // Hand it to `MqttClient::new(transport, &registry)`.
//! ```

use super::QoS;
use super::config::HOST_CAPACITY;
use super::transport::{Credentials, DEFAULT_SESSION, InboundMessage, SessionId, Transport};
use crate::network::error::Error;
use crate::network::{Close, Connect, Read, Write};
use core::fmt::Write as _;
use heapless::{String, Vec};

// MQTT Control Packet types - these are the fixed header packet type values
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const PUBREC: u8 = 0x50;
const PUBREL: u8 = 0x60;
const PUBCOMP: u8 = 0x70;
const SUBSCRIBE: u8 = 0x82;
const UNSUBSCRIBE: u8 = 0xA2;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

/// MQTT protocol name as defined in the specification.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

const FLAG_CLEAN_SESSION: u8 = 0x02;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_USERNAME: u8 = 0x80;
const FLAG_RETAIN: u8 = 0x01;

/// Size of the packet buffer shared by outbound and inbound packets.
pub const PACKET_CAPACITY: usize = 1024;

/// Fixed header: one type byte plus up to four remaining-length bytes.
type FixedHeader = Vec<u8, 5>;
type Packet = Vec<u8, PACKET_CAPACITY>;

/// Room for `host:port`.
type Remote = String<{ HOST_CAPACITY + 6 }>;

/// An MQTT 3.1.1 transport over a network connector.
///
/// # Type Parameters
///
/// * `N` - The connector used to open the broker connection
pub struct WireTransport<N: Connect> {
    network: N,
    connection: Option<N::Connection>,
    session: SessionId,
    remote: Remote,
    keep_alive_secs: u16,
    next_packet_id: u16,
    last_inbound_ms: Option<u64>,
    last_outbound_ms: Option<u64>,
    ping_outstanding: bool,
    inbound: Inbound,
    buffer: Packet,
}

/// Progress through the inbound packet being read.
#[derive(Debug, Default)]
struct Inbound {
    header: Option<u8>,
    length: usize,
    length_bytes: u32,
    length_known: bool,
    filled: usize,
    discard: usize,
}

impl<N: Connect> core::fmt::Debug for WireTransport<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WireTransport")
            .field("session", &self.session)
            .field("remote", &self.remote)
            .field("connected", &self.connection.is_some())
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("ping_outstanding", &self.ping_outstanding)
            .finish()
    }
}

impl<N> WireTransport<N>
where
    N: Connect,
    <N::Connection as Read>::Error: Into<Error>,
{
    /// Create a transport on [`DEFAULT_SESSION`].
    pub fn new(network: N) -> Self {
        Self::with_session(network, DEFAULT_SESSION)
    }

    /// Create a transport on a specific session.
    pub fn with_session(network: N, session: SessionId) -> Self {
        Self {
            network,
            connection: None,
            session,
            remote: String::new(),
            keep_alive_secs: 0,
            next_packet_id: 1,
            last_inbound_ms: None,
            last_outbound_ms: None,
            ping_outstanding: false,
            inbound: Inbound::default(),
            buffer: Vec::new(),
        }
    }

    /// The connector this transport opens connections with.
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Mutable access to the connector.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// The `host:port` the next connect will dial.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = id.wrapping_add(1).max(1);
        id
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
        self.ping_outstanding = false;
        self.last_inbound_ms = None;
        self.last_outbound_ms = None;
        self.inbound = Inbound::default();
    }

    /// Write a complete packet. Any failure drops the connection.
    fn send(&mut self, header: &[u8], body: &[u8]) -> Result<(), Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        let result = write_packet(connection, header, body);
        if result.is_err() {
            self.drop_connection();
        }
        result
    }

    fn send_packet(&mut self, packet_type: u8, body: &[u8]) -> Result<(), Error> {
        let mut header = FixedHeader::new();
        header.push(packet_type).map_err(|_| Error::BufferOverflow)?;
        encode_remaining_length(&mut header, body.len())?;
        self.send(&header, body)
    }

    fn handshake(&mut self, client_id: &str, credentials: Option<Credentials<'_>>) -> Result<(), Error> {
        // --- Variable Header ---
        let mut packet = Packet::new();
        put_bytes(&mut packet, PROTOCOL_NAME)?;
        push(&mut packet, PROTOCOL_LEVEL)?;

        let mut connect_flags = FLAG_CLEAN_SESSION;
        if credentials.is_some() {
            connect_flags |= FLAG_USERNAME | FLAG_PASSWORD;
        }
        push(&mut packet, connect_flags)?;
        extend(&mut packet, &self.keep_alive_secs.to_be_bytes())?;

        // --- Payload ---
        put_bytes(&mut packet, client_id.as_bytes())?;
        if let Some(credentials) = credentials {
            put_bytes(&mut packet, credentials.username.as_bytes())?;
            put_bytes(&mut packet, credentials.password.as_bytes())?;
        }

        self.send_packet(CONNECT, &packet)?;

        // Wait for and parse CONNACK
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        let mut connack = [0u8; 4];
        read_exact(connection, &mut connack)?;

        if connack[0] != CONNACK || connack[1] != 2 {
            return Err(Error::ProtocolError);
        }

        match connack[3] {
            0 => Ok(()),
            code @ 1..=5 => {
                debug!("broker refused connection, return code {}", code);
                Err(Error::ConnectionRefused)
            }
            _ => Err(Error::ProtocolError),
        }
    }

    /// Read and handle at most one packet.
    ///
    /// Returns `Ok(false)` while the next packet is incomplete.
    fn read_packet(&mut self, on_message: &mut dyn FnMut(InboundMessage<'_>)) -> Result<bool, Error> {
        let connection = self.connection.as_mut().ok_or(Error::NotOpen)?;
        let inbound = &mut self.inbound;

        let header = match inbound.header {
            Some(header) => header,
            None => {
                let mut byte = [0u8; 1];
                if read_some(connection, &mut byte)? == 0 {
                    return Ok(false);
                }
                inbound.header = Some(byte[0]);
                byte[0]
            }
        };

        // Remaining length: 7 bits per byte, at most 4 bytes.
        while !inbound.length_known {
            let mut byte = [0u8; 1];
            if read_some(connection, &mut byte)? == 0 {
                return Ok(false);
            }
            inbound.length += usize::from(byte[0] & 0x7F) << (7 * inbound.length_bytes);
            inbound.length_bytes += 1;
            if byte[0] & 0x80 == 0 {
                // Keep what fits into the buffer, discard the rest.
                let kept = inbound.length.min(PACKET_CAPACITY);
                self.buffer.clear();
                self.buffer
                    .resize(kept, 0)
                    .map_err(|_| Error::BufferOverflow)?;
                inbound.discard = inbound.length - kept;
                inbound.length_known = true;
            } else if inbound.length_bytes == 4 {
                return Err(Error::ProtocolError);
            }
        }

        while inbound.filled < self.buffer.len() {
            let n = read_some(connection, &mut self.buffer[inbound.filled..])?;
            if n == 0 {
                return Ok(false);
            }
            inbound.filled += n;
        }

        let mut scratch = [0u8; 64];
        while inbound.discard > 0 {
            let chunk = inbound.discard.min(scratch.len());
            let n = read_some(connection, &mut scratch[..chunk])?;
            if n == 0 {
                return Ok(false);
            }
            inbound.discard -= n;
        }

        *inbound = Inbound::default();

        match header & 0xF0 {
            PUBLISH => {
                let qos = (header >> 1) & 0x03;
                let packet_id = deliver(&self.buffer, qos, on_message)?;
                match (qos, packet_id) {
                    (1, Some(id)) => self.send_packet(PUBACK, &id.to_be_bytes())?,
                    (2, Some(id)) => self.send_packet(PUBREC, &id.to_be_bytes())?,
                    _ => {}
                }
            }
            PUBREL => {
                if self.buffer.len() < 2 {
                    return Err(Error::ProtocolError);
                }
                let id = [self.buffer[0], self.buffer[1]];
                self.send_packet(PUBCOMP, &id)?;
            }
            PINGRESP => self.ping_outstanding = false,
            other => trace!("ignoring packet type {}", other),
        }

        Ok(true)
    }

    fn poll_inner(
        &mut self,
        now_ms: u64,
        on_message: &mut dyn FnMut(InboundMessage<'_>),
    ) -> Result<(), Error> {
        let last_in = *self.last_inbound_ms.get_or_insert(now_ms);
        let last_out = *self.last_outbound_ms.get_or_insert(now_ms);
        let interval = u64::from(self.keep_alive_secs) * 1000;

        if interval > 0
            && (now_ms.saturating_sub(last_in) >= interval
                || now_ms.saturating_sub(last_out) >= interval)
        {
            if self.ping_outstanding {
                warn!("keepalive timeout, dropping connection");
                self.drop_connection();
                return Err(Error::Timeout);
            }
            self.send_packet(PINGREQ, &[])?;
            self.last_inbound_ms = Some(now_ms);
            self.last_outbound_ms = Some(now_ms);
            self.ping_outstanding = true;
        }

        if self.read_packet(on_message)? {
            self.last_inbound_ms = Some(now_ms);
        }
        Ok(())
    }
}

impl<N> Transport for WireTransport<N>
where
    N: Connect,
    <N::Connection as Read>::Error: Into<Error>,
{
    type Error = Error;

    fn session(&self) -> SessionId {
        self.session
    }

    fn set_server(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.remote.clear();
        write!(self.remote, "{}:{}", host, port).map_err(|_| Error::InvalidAddress)
    }

    fn set_keep_alive(&mut self, secs: u16) {
        self.keep_alive_secs = secs;
    }

    fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error> {
        if self.remote.is_empty() {
            return Err(Error::InvalidAddress);
        }
        self.drop_connection();

        let connection = self
            .network
            .connect(&self.remote)
            .map_err(|_| Error::ConnectionRefused)?;
        self.connection = Some(connection);

        let result = self.handshake(client_id, credentials);
        if result.is_err() {
            self.drop_connection();
        }
        result
    }

    fn disconnect(&mut self) {
        if self.connection.is_some() {
            let _ = self.send_packet(DISCONNECT, &[]);
        }
        self.drop_connection();
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let mut packet = Packet::new();
        put_bytes(&mut packet, topic.as_bytes())?;
        extend(&mut packet, payload)?;

        let mut flags = PUBLISH;
        if retain {
            flags |= FLAG_RETAIN;
        }
        self.send_packet(flags, &packet)
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        let mut packet = Packet::new();
        let packet_id = self.packet_id();
        extend(&mut packet, &packet_id.to_be_bytes())?;
        put_bytes(&mut packet, topic.as_bytes())?;
        push(&mut packet, qos as u8)?;
        self.send_packet(SUBSCRIBE, &packet)
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let mut packet = Packet::new();
        let packet_id = self.packet_id();
        extend(&mut packet, &packet_id.to_be_bytes())?;
        put_bytes(&mut packet, topic.as_bytes())?;
        self.send_packet(UNSUBSCRIBE, &packet)
    }

    fn poll(
        &mut self,
        now_ms: u64,
        on_message: &mut dyn FnMut(InboundMessage<'_>),
    ) -> Result<(), Self::Error> {
        if self.connection.is_none() {
            return Err(Error::NotOpen);
        }
        let result = self.poll_inner(now_ms, on_message);
        if result.is_err() {
            // The stream is at an unknown offset after a failed read.
            self.drop_connection();
        }
        result
    }
}

/// Parse a PUBLISH body and hand it to `on_message`. Returns the packet id for QoS > 0.
fn deliver(
    body: &[u8],
    qos: u8,
    on_message: &mut dyn FnMut(InboundMessage<'_>),
) -> Result<Option<u16>, Error> {
    if body.len() < 2 {
        return Err(Error::ProtocolError);
    }
    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
    let mut offset = 2 + topic_len;
    if body.len() < offset {
        return Err(Error::ProtocolError);
    }
    let topic = core::str::from_utf8(&body[2..offset]).map_err(|_| Error::ProtocolError)?;

    let packet_id = if qos > 0 {
        if body.len() < offset + 2 {
            return Err(Error::ProtocolError);
        }
        let id = u16::from_be_bytes([body[offset], body[offset + 1]]);
        offset += 2;
        Some(id)
    } else {
        None
    };

    on_message(InboundMessage {
        topic,
        payload: &body[offset..],
    });
    Ok(packet_id)
}

fn push(packet: &mut Packet, byte: u8) -> Result<(), Error> {
    packet.push(byte).map_err(|_| Error::BufferOverflow)
}

fn extend(packet: &mut Packet, bytes: &[u8]) -> Result<(), Error> {
    packet
        .extend_from_slice(bytes)
        .map_err(|_| Error::BufferOverflow)
}

/// Append a length-prefixed field.
fn put_bytes(packet: &mut Packet, bytes: &[u8]) -> Result<(), Error> {
    let len = u16::try_from(bytes.len()).map_err(|_| Error::BufferOverflow)?;
    extend(packet, &len.to_be_bytes())?;
    extend(packet, bytes)
}

fn write_packet<W: Write>(writer: &mut W, header: &[u8], body: &[u8]) -> Result<(), Error> {
    write_all(writer, header)?;
    write_all(writer, body)?;
    writer.flush().map_err(|_| Error::WriteError)
}

fn write_all<W: Write>(writer: &mut W, mut bytes: &[u8]) -> Result<(), Error> {
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(0) | Err(_) => return Err(Error::WriteError),
            Ok(n) => bytes = &bytes[n..],
        }
    }
    Ok(())
}

fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), Error>
where
    R: Read,
    R::Error: Into<Error>,
{
    let mut total_read = 0;
    while total_read < buf.len() {
        match reader.read(&mut buf[total_read..]) {
            Ok(0) => return Err(Error::ConnectionClosed),
            Ok(n) => total_read += n,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read whatever is available. A read timeout counts as no data.
fn read_some<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, Error>
where
    R: Read,
    R::Error: Into<Error>,
{
    match reader.read(buf) {
        Ok(n) => Ok(n),
        Err(e) => {
            let e: Error = e.into();
            if e == Error::Timeout { Ok(0) } else { Err(e) }
        }
    }
}

/// Encode the remaining length field for an MQTT packet.
///
/// Each byte carries 7 bits of the length; the high bit marks a following
/// byte. At most 4 bytes, so lengths up to 268,435,455.
fn encode_remaining_length(buf: &mut FixedHeader, mut len: usize) -> Result<(), Error> {
    loop {
        if buf.is_full() {
            return Err(Error::BufferOverflow);
        }
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| Error::BufferOverflow)?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}
