//! # Application Layer Network Protocols
//!
//! Application layer (OSI Layer 7) protocols built on the transport traits in
//! [`network`](crate::network).
//!
//! ## Design Principles
//!
//! - **Transport Agnostic**: Work with any type implementing [`Transport`](crate::network::Transport)
//! - **No-std Compatible**: No heap allocation
//! - **Resource Conscious**: One fixed-size buffer per session
//! - **Bounded Waits**: Every blocking wait is measured against a [`Clock`](crate::time::Clock)

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
