//! MQTT 3.1.1 client facade for embedded systems.
//!
//! This module provides a small, callback-based MQTT client for `no_std`
//! devices. The [`MqttClient`] facade stores the broker parameters, forwards
//! connect, publish, subscribe and unsubscribe requests to a [`Transport`],
//! and delivers inbound messages to a single user callback.
//!
//! # Architecture
//!
//! - [`MqttClient`]: connection state, callbacks and request identifiers
//! - [`Transport`]: the protocol implementation behind the facade
//!   - [`WireTransport`]: MQTT 3.1.1 over any [`Connect`](crate::network::Connect)
//!   - [`NullTransport`]: accepts everything, for hosts without a broker
//! - [`SessionRegistry`]: which client receives each transport session's messages
//! - [`BrokerConfig`] / [`Settings`]: broker URI, credentials and keepalive
//!
//! # Usage
//!
//! ```rust
//! use core::cell::RefCell;
//! use minimqtt::network::application::mqtt::{MqttClient, NullTransport, QoS, SessionRegistry};
//!
//! let registry: SessionRegistry = SessionRegistry::new();
//! let log = RefCell::new(0);
//! let mut on_message = |_topic: &str, _payload: &str| *log.borrow_mut() += 1;
//!
//! let mut client = MqttClient::new(NullTransport::new(), &registry).unwrap();
//! client.on_message(&mut on_message);
//! client
//!     .begin_with_credentials("mqtt://192.168.1.10:1883", "device", "secret", 30)
//!     .unwrap();
//! client.connect(None).unwrap();
//! client.subscribe("commands/#", QoS::AtMostOnce).unwrap();
//!
//! // In the main loop:
//! client.poll(0).unwrap();
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod transport;
pub mod wire;


pub use client::{
    DEFAULT_CLIENT_ID, EventCallback, MAX_PAYLOAD_LEN, MessageCallback, MqttClient,
    PAYLOAD_BUFFER_SIZE, Payload, truncate_payload,
};
pub use config::{BrokerConfig, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_PORT, Settings};
pub use error::{Error, Field};
pub use registry::{InstanceId, RequestId, SessionRegistry};
pub use transport::{
    Credentials, DEFAULT_SESSION, InboundMessage, NullTransport, SessionId, Transport,
};
pub use wire::WireTransport;

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more network overhead and
/// client state management.
///
/// # Examples
///
/// ```rust
/// use minimqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(1u8), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(3u8).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    ///
    /// Messages are delivered according to the best effort of the underlying network.
    /// Message loss can occur.
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery.
    ///
    /// Messages are assured to arrive but duplicates can occur.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery.
    ///
    /// Messages are assured to arrive exactly once. This is the safest but slowest
    /// level.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(other),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for QoS {
    fn format(&self, f: defmt::Formatter) {
        match self {
            QoS::AtMostOnce => defmt::write!(f, "AtMostOnce"),
            QoS::AtLeastOnce => defmt::write!(f, "AtLeastOnce"),
            QoS::ExactlyOnce => defmt::write!(f, "ExactlyOnce"),
        }
    }
}
