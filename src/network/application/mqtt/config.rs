//! Broker connection parameters.
//!
//! A [`BrokerConfig`] is built from a URI of the form
//! `[mqtt://|mqtts://]host[:port]` and keeps every string in a bounded,
//! owned buffer. Values that do not fit are rejected with
//! [`Error::CapacityExceeded`] rather than cut short.
//!
//! Devices that are provisioned with a JSON document can use [`Settings`]:
//!
//! ```rust
//! use minimqtt::network::application::mqtt::Settings;
//!
//! let json = br#"{"uri":"mqtt://broker.local:1884","username":"sensor","password":"s3cret"}"#;
//! let settings = Settings::from_json(json).unwrap();
//! let config = settings.to_config().unwrap();
//!
//! assert_eq!(config.host(), "broker.local");
//! assert_eq!(config.port(), 1884);
//! assert_eq!(config.username(), Some("sensor"));
//! assert_eq!(config.keep_alive_secs(), 60);
//! ```

use super::error::{Error, Field};
use heapless::String;
use serde::Deserialize;

/// Port used when the URI carries no `:port` suffix.
pub const DEFAULT_PORT: u16 = 1883;
/// Keepalive interval used unless one is configured.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;
/// Capacity of the stored broker URI, in bytes.
pub const URI_CAPACITY: usize = 128;
/// Capacity of the parsed host, in bytes.
pub const HOST_CAPACITY: usize = 64;
/// Capacity of the username and of the password, in bytes.
pub const CREDENTIAL_CAPACITY: usize = 64;

const MQTT_SCHEME: &str = "mqtt://";
const MQTTS_SCHEME: &str = "mqtts://";

/// Broker address, credentials and keepalive for one client.
///
/// # Examples
///
/// ```rust
/// use minimqtt::network::application::mqtt::BrokerConfig;
///
/// let config = BrokerConfig::parse("mqtts://broker.example.com:8883")
///     .unwrap()
///     .with_credentials("device-7", "hunter2")
///     .unwrap()
///     .with_keep_alive(30);
///
/// assert_eq!(config.host(), "broker.example.com");
/// assert_eq!(config.port(), 8883);
/// assert!(config.is_secure());
/// assert_eq!(config.keep_alive_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    uri: String<URI_CAPACITY>,
    host: String<HOST_CAPACITY>,
    port: u16,
    secure: bool,
    username: String<CREDENTIAL_CAPACITY>,
    password: String<CREDENTIAL_CAPACITY>,
    keep_alive_secs: u16,
}

impl BrokerConfig {
    /// Parse a broker URI.
    ///
    /// Accepts an optional `mqtt://` or `mqtts://` prefix. The host is the
    /// text before the first `:`, the port the text after it; without a
    /// colon the port is [`DEFAULT_PORT`]. The `mqtts://` scheme is recorded
    /// but does not change the default port.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidUri`] - unknown scheme, empty host, or a port that is
    ///   not a number in `1..=65535`
    /// * [`Error::CapacityExceeded`] - the URI or host does not fit its buffer
    pub fn parse(uri: &str) -> Result<Self, Error> {
        let stored = bounded(uri, Field::Uri)?;

        let (secure, rest) = if let Some(rest) = uri.strip_prefix(MQTT_SCHEME) {
            (false, rest)
        } else if let Some(rest) = uri.strip_prefix(MQTTS_SCHEME) {
            (true, rest)
        } else if uri.contains("://") {
            return Err(Error::InvalidUri);
        } else {
            (false, uri)
        };

        let (host, port) = match rest.split_once(':') {
            Some((host, port)) => (host, parse_port(port)?),
            None => (rest, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(Error::InvalidUri);
        }

        Ok(Self {
            uri: stored,
            host: bounded(host, Field::Host)?,
            port,
            secure,
            username: String::new(),
            password: String::new(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        })
    }

    /// Attach credentials. An empty username means an anonymous session.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Result<Self, Error> {
        self.username = bounded(username, Field::Username)?;
        self.password = bounded(password, Field::Password)?;
        Ok(self)
    }

    /// Set the keepalive interval in seconds. Zero disables keepalive.
    pub fn with_keep_alive(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// The URI as it was given.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The broker host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The broker port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the URI used the `mqtts://` scheme.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// The username, or `None` for an anonymous session.
    pub fn username(&self) -> Option<&str> {
        if self.username.is_empty() {
            None
        } else {
            Some(&self.username)
        }
    }

    /// The password. Only sent together with a username.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Keepalive interval in seconds.
    pub fn keep_alive_secs(&self) -> u16 {
        self.keep_alive_secs
    }
}

/// Broker settings as provisioned in a JSON document.
///
/// Only `uri` is required. Strings are borrowed from the input buffer, so
/// they must not contain JSON escape sequences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings<'a> {
    /// Broker URI, see [`BrokerConfig::parse`].
    #[serde(borrow)]
    pub uri: &'a str,
    /// Optional username.
    #[serde(default, borrow)]
    pub username: Option<&'a str>,
    /// Optional password.
    #[serde(default, borrow)]
    pub password: Option<&'a str>,
    /// Optional keepalive interval in seconds.
    #[serde(default)]
    pub keep_alive: Option<u16>,
}

impl<'a> Settings<'a> {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &'a [u8]) -> Result<Self, Error> {
        serde_json_core::from_slice::<Settings<'a>>(json)
            .map(|(settings, _)| settings)
            .map_err(|_| Error::InvalidSettings)
    }

    /// Turn the settings into a validated [`BrokerConfig`].
    pub fn to_config(&self) -> Result<BrokerConfig, Error> {
        let config = BrokerConfig::parse(self.uri)?
            .with_credentials(self.username.unwrap_or(""), self.password.unwrap_or(""))?;
        Ok(config.with_keep_alive(self.keep_alive.unwrap_or(DEFAULT_KEEP_ALIVE_SECS)))
    }
}

fn bounded<const N: usize>(value: &str, field: Field) -> Result<String<N>, Error> {
    String::try_from(value).map_err(|_| Error::CapacityExceeded(field))
}

fn parse_port(port: &str) -> Result<u16, Error> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::InvalidUri),
        Ok(port) => Ok(port),
    }
}
