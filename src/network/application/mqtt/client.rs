//! The MQTT client facade.
//!
//! [`MqttClient`] keeps the broker parameters, forwards requests to its
//! [`Transport`] and turns inbound messages into calls of a user callback.
//!
//! # Examples
//!
//! ```rust
//! use core::cell::Cell;
//! use minimqtt::network::application::mqtt::{MqttClient, NullTransport, QoS, SessionRegistry};
//!
//! let registry: SessionRegistry = SessionRegistry::new();
//! let connects = Cell::new(0);
//! let mut on_connect = || connects.set(connects.get() + 1);
//!
//! let mut client = MqttClient::new(NullTransport::new(), &registry).unwrap();
//! client.on_connect(&mut on_connect);
//! client.begin("mqtt://broker.local").unwrap();
//! client.connect(Some("thermostat")).unwrap();
//!
//! let first = client.subscribe("home/+/setpoint", QoS::AtLeastOnce).unwrap();
//! let second = client.publish("home/livingroom/temp", b"21.5", false).unwrap();
//! assert!(second > first);
//!
//! drop(client);
//! assert_eq!(connects.get(), 1);
//! ```

use super::QoS;
use super::config::{BrokerConfig, Settings};
use super::error::Error;
use super::registry::{InstanceId, RequestId, SessionRegistry};
use super::transport::{Credentials, InboundMessage, SessionId, Transport};

/// Size of the inbound payload buffer. One byte is reserved, so at most
/// [`MAX_PAYLOAD_LEN`] bytes reach the message callback.
pub const PAYLOAD_BUFFER_SIZE: usize = 512;
/// Longest payload delivered to the message callback, in bytes.
pub const MAX_PAYLOAD_LEN: usize = PAYLOAD_BUFFER_SIZE - 1;
/// Client identifier used when `connect` is given none.
pub const DEFAULT_CLIENT_ID: &str = "mqtt_client";

/// Callback receiving `(topic, payload)` for every delivered message.
///
/// The payload is text. Binary payloads are cut at their first invalid UTF-8
/// byte (see [`truncate_payload`]), so a payload starting with a non-UTF-8
/// byte arrives as `""` and counts as truncated.
pub type MessageCallback<'a> = &'a mut (dyn FnMut(&str, &str) + 'a);
/// Callback fired on connect or disconnect.
pub type EventCallback<'a> = &'a mut (dyn FnMut() + 'a);

/// An inbound payload after applying the delivery bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload<'a> {
    /// The text handed to the message callback.
    pub text: &'a str,
    /// Number of bytes that were cut off.
    pub dropped: usize,
}

impl Payload<'_> {
    /// Whether any bytes were cut off.
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Bound `payload` to [`MAX_PAYLOAD_LEN`] bytes of UTF-8 text.
///
/// The cut never splits a character, and invalid UTF-8 ends the text at the
/// last valid byte. Everything cut off is counted in [`Payload::dropped`].
///
/// ```rust
/// use minimqtt::network::application::mqtt::{truncate_payload, MAX_PAYLOAD_LEN};
///
/// let long = [b'x'; 600];
/// let payload = truncate_payload(&long);
/// assert_eq!(payload.text.len(), MAX_PAYLOAD_LEN);
/// assert_eq!(payload.dropped, 600 - MAX_PAYLOAD_LEN);
/// ```
pub fn truncate_payload(payload: &[u8]) -> Payload<'_> {
    let bounded = &payload[..payload.len().min(MAX_PAYLOAD_LEN)];
    let text = match core::str::from_utf8(bounded) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&bounded[..e.valid_up_to()]).unwrap_or_default(),
    };
    Payload {
        text,
        dropped: payload.len() - text.len(),
    }
}

/// A simplified MQTT client on top of a [`Transport`].
///
/// The client is either disconnected or connected:
///
/// ```text
/// Disconnected --connect ok--> Connected --disconnect / transport failure--> Disconnected
/// ```
///
/// Messages only reach this client while it owns its transport's session in
/// the [`SessionRegistry`]. Creating another client on the same session takes
/// delivery over; dropping a client gives its session up.
///
/// # Type Parameters
///
/// * `T` - The transport performing the MQTT protocol work
/// * `N` - Capacity of the shared [`SessionRegistry`]
pub struct MqttClient<'a, T: Transport, const N: usize = 4> {
    transport: T,
    registry: &'a SessionRegistry<N>,
    instance: InstanceId,
    config: Option<BrokerConfig>,
    connected: bool,
    truncated: u32,
    on_message: Option<MessageCallback<'a>>,
    on_connect: Option<EventCallback<'a>>,
    on_disconnect: Option<EventCallback<'a>>,
}

impl<T: Transport, const N: usize> core::fmt::Debug for MqttClient<'_, T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MqttClient")
            .field("instance", &self.instance)
            .field("session", &self.transport.session())
            .field("config", &self.config)
            .field("connected", &self.connected)
            .field("truncated", &self.truncated)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Transport, const N: usize> MqttClient<'a, T, N> {
    /// Create a client and bind the transport's session to it.
    ///
    /// A client previously bound to the same session stops receiving messages.
    ///
    /// # Errors
    ///
    /// * [`Error::RegistryFull`] - no free slot for a new session
    pub fn new(transport: T, registry: &'a SessionRegistry<N>) -> Result<Self, Error> {
        let instance = registry.allocate_instance();
        let session = transport.session();
        if let Some(previous) = registry.bind(session, instance)? {
            debug!("session {} taken over from instance {}", session, previous);
        }
        Ok(Self {
            transport,
            registry,
            instance,
            config: None,
            connected: false,
            truncated: 0,
            on_message: None,
            on_connect: None,
            on_disconnect: None,
        })
    }

    /// Configure the broker from a URI, anonymous and with the default keepalive.
    ///
    /// Replaces any earlier configuration. No network I/O takes place.
    pub fn begin(&mut self, uri: &str) -> Result<(), Error> {
        self.begin_with_config(BrokerConfig::parse(uri)?)
    }

    /// Configure the broker from a URI, credentials and keepalive interval.
    ///
    /// An empty `username` connects anonymously.
    pub fn begin_with_credentials(
        &mut self,
        uri: &str,
        username: &str,
        password: &str,
        keep_alive_secs: u16,
    ) -> Result<(), Error> {
        let config = BrokerConfig::parse(uri)?
            .with_credentials(username, password)?
            .with_keep_alive(keep_alive_secs);
        self.begin_with_config(config)
    }

    /// Configure the broker from JSON-provisioned settings.
    pub fn begin_with_settings(&mut self, settings: &Settings<'_>) -> Result<(), Error> {
        self.begin_with_config(settings.to_config()?)
    }

    /// Configure the broker from a prepared [`BrokerConfig`].
    pub fn begin_with_config(&mut self, config: BrokerConfig) -> Result<(), Error> {
        self.transport
            .set_server(config.host(), config.port())
            .map_err(|_| Error::TransportRejected)?;
        self.transport.set_keep_alive(config.keep_alive_secs());
        info!("initialized for {}:{}", config.host(), config.port());
        self.config = Some(config);
        Ok(())
    }

    /// Open the MQTT session.
    ///
    /// Returns immediately if the transport is already connected, adopting its
    /// session without firing the connect callback. Credentials
    /// are sent when a username is configured. The connect callback fires
    /// once on success. Failures are not retried.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConfigured`] - no `begin` call yet
    /// * [`Error::TransportRejected`] - the transport could not connect
    pub fn connect(&mut self, client_id: Option<&str>) -> Result<(), Error> {
        if self.transport.is_connected() {
            self.connected = true;
            return Ok(());
        }
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;
        let client_id = client_id.unwrap_or(DEFAULT_CLIENT_ID);
        let credentials = config.username().map(|username| Credentials {
            username,
            password: config.password(),
        });

        match self.transport.connect(client_id, credentials) {
            Ok(()) => {
                self.connected = true;
                if let Some(callback) = self.on_connect.as_mut() {
                    callback();
                }
                Ok(())
            }
            Err(_) => {
                self.connected = false;
                error!("connect failed");
                Err(Error::TransportRejected)
            }
        }
    }

    /// Close the MQTT session.
    ///
    /// The disconnect callback fires even if the client was not connected.
    pub fn disconnect(&mut self) {
        if self.transport.is_connected() {
            self.transport.disconnect();
        }
        self.connected = false;
        if let Some(callback) = self.on_disconnect.as_mut() {
            callback();
        }
    }

    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the client is not connected; the transport is not called
    /// * [`Error::TransportRejected`] - the transport failed to publish
    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<RequestId, Error> {
        self.ensure_connected()?;
        self.transport.publish(topic, payload, retain).map_err(|_| {
            error!("publish failed: {}", topic);
            Error::TransportRejected
        })?;
        Ok(self.registry.next_request_id())
    }

    /// Subscribe to a topic filter. Wildcards are passed through unchecked.
    ///
    /// Same error contract as [`publish`](Self::publish).
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<RequestId, Error> {
        self.ensure_connected()?;
        self.transport.subscribe(topic, qos).map_err(|_| {
            error!("subscribe failed: {}", topic);
            Error::TransportRejected
        })?;
        Ok(self.registry.next_request_id())
    }

    /// Remove a subscription.
    ///
    /// Same error contract as [`publish`](Self::publish).
    pub fn unsubscribe(&mut self, topic: &str) -> Result<RequestId, Error> {
        self.ensure_connected()?;
        self.transport.unsubscribe(topic).map_err(|_| {
            error!("unsubscribe failed: {}", topic);
            Error::TransportRejected
        })?;
        Ok(self.registry.next_request_id())
    }

    /// Run one processing step of the transport and deliver inbound messages.
    ///
    /// Call this regularly from the main loop with a monotonic millisecond
    /// timestamp. Returns the number of messages handed to the callback. If
    /// the transport fails or loses its session, the client becomes
    /// disconnected and the disconnect callback fires.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the client is not connected
    /// * [`Error::TransportRejected`] - the transport failed; the client is now disconnected
    pub fn poll(&mut self, now_ms: u64) -> Result<usize, Error> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let session = self.transport.session();
        let instance = self.instance;
        let registry = self.registry;
        let truncated = &mut self.truncated;
        let on_message = &mut self.on_message;
        let mut delivered = 0;

        let result = self.transport.poll(now_ms, &mut |message: InboundMessage<'_>| {
            if registry.owner(session) != Some(instance) {
                trace!("session {} owned elsewhere, dropping message", session);
                return;
            }
            let payload = truncate_payload(message.payload);
            if payload.is_truncated() {
                *truncated = truncated.saturating_add(1);
                warn!(
                    "payload on {} truncated, {} bytes dropped",
                    message.topic,
                    payload.dropped
                );
            }
            if let Some(callback) = on_message.as_mut() {
                callback(message.topic, payload.text);
                delivered += 1;
            }
        });

        if result.is_err() || !self.transport.is_connected() {
            warn!("connection lost");
            // A failed step leaves the session in an unknown state.
            if self.transport.is_connected() {
                self.transport.disconnect();
            }
            self.connected = false;
            if let Some(callback) = self.on_disconnect.as_mut() {
                callback();
            }
            return Err(Error::TransportRejected);
        }
        Ok(delivered)
    }

    /// Register the message callback, replacing any previous one.
    pub fn on_message(&mut self, callback: MessageCallback<'a>) {
        self.on_message = Some(callback);
    }

    /// Register the connect callback, replacing any previous one.
    pub fn on_connect(&mut self, callback: EventCallback<'a>) {
        self.on_connect = Some(callback);
    }

    /// Register the disconnect callback, replacing any previous one.
    pub fn on_disconnect(&mut self, callback: EventCallback<'a>) {
        self.on_disconnect = Some(callback);
    }

    /// Whether the client considers itself connected.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The broker configuration from the last `begin`.
    pub fn config(&self) -> Option<&BrokerConfig> {
        self.config.as_ref()
    }

    /// This client's identifier within its registry.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// The session this client's transport delivers on.
    pub fn session(&self) -> SessionId {
        self.transport.session()
    }

    /// Number of inbound messages whose payload was truncated.
    pub fn truncated_messages(&self) -> u32 {
        self.truncated
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.connected && self.transport.is_connected() {
            Ok(())
        } else {
            error!("not connected");
            Err(Error::NotConnected)
        }
    }
}

impl<T: Transport, const N: usize> Drop for MqttClient<'_, T, N> {
    fn drop(&mut self) {
        self.registry.release(self.transport.session(), self.instance);
        if self.transport.is_connected() {
            self.transport.disconnect();
        }
    }
}
