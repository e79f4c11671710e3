//! A network abstraction layer for embedded systems
//!
//! These traits describe the byte-stream connections the MQTT wire transport
//! runs over. Implement them for your TCP stack (smoltcp, embassy-net, lwIP,
//! `std::net`) and hand a [`Connect`] implementation to
//! [`WireTransport`](crate::network::application::mqtt::WireTransport).

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application layer protocols built on top of these traits
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

/// Reading half of a connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    ///
    /// Returning `Ok(0)` means no data is currently available. A connection
    /// closed by the peer must be reported as an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Writing half of a connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// A connection that can be shut down.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `remote`, given as `host:port`
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}
