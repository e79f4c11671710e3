//! Shared mocks for the integration tests.

#![allow(dead_code)]

use minimqtt::mqtt::{Credentials, InboundMessage, QoS, SessionId, Transport};
use minimqtt::network::error::Error;
use minimqtt::network::{Close, Connect, Connection, Read, Write};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Everything a [`MockTransport`] was asked to do, plus knobs to make it fail.
#[derive(Debug, Default)]
pub struct TransportState {
    pub connected: bool,
    pub fail_connect: bool,
    pub fail_requests: bool,
    pub fail_poll: bool,
    /// Keep the session open when a failing poll returns.
    pub poll_error_keeps_session: bool,
    pub server: Option<(String, u16)>,
    pub keep_alive: Option<u16>,
    pub connects: Vec<(String, Option<(String, String)>)>,
    pub disconnects: usize,
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub subscribed: Vec<(String, QoS)>,
    pub unsubscribed: Vec<String>,
    pub polls: Vec<u64>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
}

impl TransportState {
    /// Number of publish, subscribe and unsubscribe calls that reached the transport.
    pub fn requests(&self) -> usize {
        self.published.len() + self.subscribed.len() + self.unsubscribed.len()
    }
}

/// A transport that records calls into shared state the test keeps a handle to.
#[derive(Debug)]
pub struct MockTransport {
    session: SessionId,
    state: Rc<RefCell<TransportState>>,
}

impl MockTransport {
    pub fn new() -> (Self, Rc<RefCell<TransportState>>) {
        Self::on_session(0)
    }

    pub fn on_session(session: SessionId) -> (Self, Rc<RefCell<TransportState>>) {
        let state = Rc::new(RefCell::new(TransportState::default()));
        (
            Self {
                session,
                state: state.clone(),
            },
            state,
        )
    }
}

impl Transport for MockTransport {
    type Error = ();

    fn session(&self) -> SessionId {
        self.session
    }

    fn set_server(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.state.borrow_mut().server = Some((host.to_string(), port));
        Ok(())
    }

    fn set_keep_alive(&mut self, secs: u16) {
        self.state.borrow_mut().keep_alive = Some(secs);
    }

    fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.connects.push((
            client_id.to_string(),
            credentials.map(|c| (c.username.to_string(), c.password.to_string())),
        ));
        if state.fail_connect {
            state.connected = false;
            return Err(());
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.disconnects += 1;
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state
            .published
            .push((topic.to_string(), payload.to_vec(), retain));
        if state.fail_requests { Err(()) } else { Ok(()) }
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.subscribed.push((topic.to_string(), qos));
        if state.fail_requests { Err(()) } else { Ok(()) }
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.unsubscribed.push(topic.to_string());
        if state.fail_requests { Err(()) } else { Ok(()) }
    }

    fn poll(
        &mut self,
        now_ms: u64,
        on_message: &mut dyn FnMut(InboundMessage<'_>),
    ) -> Result<(), Self::Error> {
        let pending: Vec<(String, Vec<u8>)> = {
            let mut state = self.state.borrow_mut();
            state.polls.push(now_ms);
            if state.fail_poll {
                if !state.poll_error_keeps_session {
                    state.connected = false;
                }
                return Err(());
            }
            state.inbound.drain(..).collect()
        };
        for (topic, payload) in &pending {
            on_message(InboundMessage {
                topic: topic.as_str(),
                payload: payload.as_slice(),
            });
        }
        Ok(())
    }
}

/// Bytes flowing through a [`MockNetwork`] connection.
#[derive(Debug, Default)]
pub struct Wire {
    /// Bytes the broker sends, consumed by reads.
    pub inbound: VecDeque<u8>,
    /// Bytes the client wrote.
    pub outbound: Vec<u8>,
    /// Addresses dialled.
    pub remotes: Vec<String>,
    pub refuse: bool,
    pub closed: bool,
    /// The broker closed its end: reads fail once `inbound` is drained.
    pub eof: bool,
}

impl Wire {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }
}

#[derive(Debug)]
pub struct MockConnection {
    wire: Rc<RefCell<Wire>>,
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if wire.inbound.is_empty() && wire.eof {
            return Err(Error::ConnectionClosed);
        }
        let len = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.wire.borrow_mut().outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().closed = true;
        Ok(())
    }
}

impl Connection for MockConnection {}

#[derive(Debug)]
pub struct MockNetwork {
    wire: Rc<RefCell<Wire>>,
}

impl MockNetwork {
    pub fn new() -> (Self, Rc<RefCell<Wire>>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        (Self { wire: wire.clone() }, wire)
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        wire.remotes.push(remote.to_string());
        if wire.refuse {
            return Err(Error::ConnectionRefused);
        }
        wire.closed = false;
        wire.eof = false;
        Ok(MockConnection {
            wire: self.wire.clone(),
        })
    }
}

/// A CONNACK accepting the session.
pub const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// Encode an inbound PUBLISH packet with a short body.
pub fn publish_packet(topic: &str, payload: &[u8], qos: u8, packet_id: u16) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    if qos > 0 {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);

    let mut packet = vec![0x30 | (qos << 1)];
    let mut len = body.len();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        packet.push(byte);
        if len == 0 {
            break;
        }
    }
    packet.extend_from_slice(&body);
    packet
}
