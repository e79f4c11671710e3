//! # minimqtt - Minimal MQTT client facade
//!
//! A small, callback-based MQTT 3.1.1 client for embedded devices such as
//! ESP32 and ESP8266 boards. The client stores the broker parameters, forwards
//! connect, publish, subscribe and unsubscribe requests to a pluggable
//! transport, and delivers inbound messages to a user callback. The crate
//! supports `no_std` environments and never allocates.
//!
//! ## Features
//!
//! - **Client facade**: [`MqttClient`](network::application::mqtt::MqttClient)
//!   with connect/disconnect callbacks and a single message callback
//! - **Transports**: an MQTT 3.1.1 wire implementation over any
//!   [`Connect`](network::Connect) stack, and a null transport for hosts
//! - **Session registry**: explicit ownership of a transport's message channel
//! - **Configuration**: `mqtt://` / `mqtts://` URIs and JSON provisioning
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! minimqtt = "0.1.0"
//! ```
//!
//! ### MQTT Client Example
//!
//! ```rust,no_run
//! use minimqtt::network::application::mqtt::{MqttClient, QoS, SessionRegistry, WireTransport};
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
//! # fn millis() -> u64 { 0 }
//!
//! let registry: SessionRegistry = SessionRegistry::new();
//! let mut on_message = |topic: &str, payload: &str| {
//!     // React to commands here.
//!     let _ = (topic, payload);
//! };
//!
//! let mut client = MqttClient::new(WireTransport::new(TcpStack), &registry).unwrap();
//! client.on_message(&mut on_message);
//! client.begin("mqtt://broker.local:1883").unwrap();
//!
//! if client.connect(Some("sensor-01")).is_ok() {
//!     client.subscribe("commands/#", QoS::AtMostOnce).unwrap();
//!     client.publish("sensors/temperature", b"23.5", false).unwrap();
//! }
//!
//! loop {
//!     if client.poll(millis()).is_err() {
//!         // Reconnect policy belongs to the application.
//!         let _ = client.connect(Some("sensor-01"));
//!     }
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Log through `defmt` and implement `defmt::Format` for public types
//! - `log`: Log through the `log` facade

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

// Must come first so the other modules see its macros.
mod fmt;

/// Network abstraction layer providing connection traits and protocol implementations.
///
/// This module contains the connection traits the MQTT wire transport runs
/// over, and the MQTT client itself under [`network::application::mqtt`].
pub mod network;

pub use network::application::mqtt;
