//! The transport seam between the client facade and an MQTT implementation.
//!
//! [`MqttClient`](super::MqttClient) never speaks the protocol itself. It drives
//! a [`Transport`], chosen when the firmware is built:
//!
//! - [`WireTransport`](super::WireTransport) encodes MQTT 3.1.1 packets over any
//!   [`Connect`](crate::network::Connect) implementation.
//! - [`NullTransport`] accepts every request without touching the network,
//!   for host builds and dry runs.

use super::QoS;

/// Identifies the inbound-message channel of a transport.
///
/// Transports that share one global message handler report the same session
/// identifier, so only one client at a time receives their messages.
pub type SessionId = u32;

/// Session identifier used by transports unless told otherwise.
pub const DEFAULT_SESSION: SessionId = 0;

/// Username and password sent with CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// The username.
    pub username: &'a str,
    /// The password.
    pub password: &'a str,
}

/// A message as handed over by the transport, before any buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundMessage<'a> {
    /// Topic the message was published on.
    pub topic: &'a str,
    /// Raw payload bytes.
    pub payload: &'a [u8],
}

/// Operations the client facade needs from an MQTT implementation.
pub trait Transport {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// The inbound-message channel this transport delivers on.
    fn session(&self) -> SessionId;

    /// Set the broker address used by the next [`connect`](Transport::connect).
    fn set_server(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Set the keepalive interval in seconds.
    fn set_keep_alive(&mut self, secs: u16);

    /// Open an MQTT session.
    fn connect(
        &mut self,
        client_id: &str,
        credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error>;

    /// Close the MQTT session.
    fn disconnect(&mut self);

    /// Whether an MQTT session is currently open.
    fn is_connected(&self) -> bool;

    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Remove a subscription.
    fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Run one processing step.
    ///
    /// `now_ms` is a monotonic timestamp in milliseconds. Every inbound
    /// message read during this step is passed to `on_message`.
    fn poll(
        &mut self,
        now_ms: u64,
        on_message: &mut dyn FnMut(InboundMessage<'_>),
    ) -> Result<(), Self::Error>;
}

/// A transport that accepts everything and delivers nothing.
///
/// Useful on hosts without a broker: connects always succeed and every
/// publish, subscribe and unsubscribe is accepted.
#[derive(Debug, Default)]
pub struct NullTransport {
    session: SessionId,
    connected: bool,
}

impl NullTransport {
    /// Create a transport on [`DEFAULT_SESSION`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport on a specific session.
    pub fn with_session(session: SessionId) -> Self {
        Self {
            session,
            connected: false,
        }
    }
}

impl Transport for NullTransport {
    type Error = core::convert::Infallible;

    fn session(&self) -> SessionId {
        self.session
    }

    fn set_server(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_keep_alive(&mut self, _secs: u16) {}

    fn connect(
        &mut self,
        _client_id: &str,
        _credentials: Option<Credentials<'_>>,
    ) -> Result<(), Self::Error> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, _topic: &str, _payload: &[u8], _retain: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    fn subscribe(&mut self, _topic: &str, _qos: QoS) -> Result<(), Self::Error> {
        Ok(())
    }

    fn unsubscribe(&mut self, _topic: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll(
        &mut self,
        _now_ms: u64,
        _on_message: &mut dyn FnMut(InboundMessage<'_>),
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}
