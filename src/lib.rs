//! # libmqtt - bounded-buffer MQTT client for constrained devices
//!
//! A Rust implementation of an MQTT 3.1.1 client engine for network-constrained
//! IoT devices. The engine owns one fixed-size frame buffer, speaks to the broker
//! through a small byte-stream [`Transport`](network::Transport) abstraction and
//! measures every wait against a [`Clock`](time::Clock), so it runs unchanged on
//! bare-metal targets and on hosted systems.
//!
//! ## Features
//!
//! ### Protocol engine
//! - **Packet codec**: fixed header, variable-length remaining length and
//!   length-prefixed strings, encoded and decoded inside a bounded buffer
//! - **Connection state machine**: CONNECT/CONNACK handshake with timeout and
//!   typed failure reasons
//! - **Keepalive**: PINGREQ/PINGRESP supervision with missed-pong detection
//! - **Messaging**: QoS 0 publish, subscribe/unsubscribe, inbound QoS 0/1
//!   dispatch with automatic PUBACK
//! - **Reconnection**: bounded retry loop that falls back to provisioning mode
//!
//! ### Device glue
//! - Control-channel directives (`data` pin writes, `station` re-provisioning)
//! - Wireless scan reports and credential parsing for the configuration portal
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libmqtt = "0.1.0"
//! ```
//!
//! ### Basic session example
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::{Broker, Options, QoS, Session};
//! # use libmqtt::network::{Close, Read, Transport, Write};
//! # use libmqtt::time::Clock;
//! # struct MockTransport;
//! # impl Read for MockTransport {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for MockTransport {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for MockTransport {
//! #     type Error = ();
//! #     fn close(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Transport for MockTransport {
//! #     type ConnectError = ();
//! #     fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::ConnectError> { Ok(()) }
//! #     fn is_connected(&mut self) -> bool { true }
//! # }
//! # struct MockClock(u64);
//! # impl Clock for MockClock {
//! #     fn now_ms(&self) -> u64 { self.0 }
//! #     fn delay_ms(&mut self, ms: u32) { self.0 += ms as u64; }
//! # }
//!
//! let options = Options::new("sensor_device_01", Broker::new("broker.local"));
//! let sink = |topic: &str, payload: &[u8]| {
//!     // handle inbound message
//!     let _ = (topic, payload);
//! };
//!
//! let mut session: Session<'_, _, _, _> =
//!     Session::new(MockTransport, MockClock(0), sink, options).unwrap();
//! // session.connect()?;
//! // session.subscribe("sensors/commands", QoS::AtLeastOnce)?;
//! // session.publish("sensors/temperature", b"23.5", false)?;
//! // loop { session.poll()?; }
//! ```
//!
//! ## Optional Features
//!
//! - `std`: TCP transport and wall clock built on the standard library
//! - `defmt`: `defmt::Format` impls and engine logging through `defmt`

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer providing the transport traits and the MQTT engine.
///
/// This module contains the byte-stream traits the engine is written against and
/// the MQTT 3.1.1 client built on top of them.
pub mod network;

/// Monotonic time source used for timeouts, keepalive and retry delays.
pub mod time;

/// Device-level glue around the MQTT engine.
///
/// Contains the platform hooks, the outer service tick, the control-channel
/// directives and the provisioning helpers.
pub mod device;
