//! # Application Layer Network Protocols
//!
//! Application layer (OSI Layer 7) protocols built on the core network traits.
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client facade and transports for publish-subscribe messaging

/// MQTT client facade, transports and broker configuration.
pub mod mqtt;
