//! Error types for the MQTT client facade

use core::fmt;

/// The bounded field that overflowed its buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Field {
    /// The broker URI.
    Uri,
    /// The host part of the broker URI.
    Host,
    /// The username credential.
    Username,
    /// The password credential.
    Password,
}

/// Errors reported by [`MqttClient`](super::MqttClient) and the broker configuration.
///
/// None of these are fatal. Callers decide whether to retry; the client never
/// reconnects on its own.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The operation requires a connected session.
    NotConnected,
    /// The transport refused or failed the operation.
    TransportRejected,
    /// `connect` was called before any `begin`.
    NotConfigured,
    /// The broker URI could not be parsed.
    InvalidUri,
    /// The JSON settings document could not be parsed.
    InvalidSettings,
    /// A value did not fit into its bounded buffer.
    CapacityExceeded(Field),
    /// The session registry has no free slot.
    RegistryFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotConnected => f.write_str("not connected"),
            Error::TransportRejected => f.write_str("transport rejected the operation"),
            Error::NotConfigured => f.write_str("broker not configured"),
            Error::InvalidUri => f.write_str("invalid broker uri"),
            Error::InvalidSettings => f.write_str("invalid settings"),
            Error::CapacityExceeded(field) => write!(f, "{:?} exceeds its capacity", field),
            Error::RegistryFull => f.write_str("session registry is full"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Field {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Field::Uri => defmt::write!(f, "Uri"),
            Field::Host => defmt::write!(f, "Host"),
            Field::Username => defmt::write!(f, "Username"),
            Field::Password => defmt::write!(f, "Password"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::TransportRejected => defmt::write!(f, "TransportRejected"),
            Error::NotConfigured => defmt::write!(f, "NotConfigured"),
            Error::InvalidUri => defmt::write!(f, "InvalidUri"),
            Error::InvalidSettings => defmt::write!(f, "InvalidSettings"),
            Error::CapacityExceeded(field) => defmt::write!(f, "CapacityExceeded({})", field),
            Error::RegistryFull => defmt::write!(f, "RegistryFull"),
        }
    }
}
