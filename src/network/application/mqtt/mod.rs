//! MQTT 3.1.1 client engine for constrained devices.
//!
//! This module implements the client half of MQTT 3.1.1 within one fixed-size
//! frame buffer. It targets devices that keep a single broker session alive,
//! publish telemetry at QoS 0 and receive commands on one subscribe topic.
//!
//! # Protocol Overview
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! # Key Features
//!
//! - CONNECT/CONNACK handshake with will and credentials
//! - QoS 0 publish; inbound QoS 0 and QoS 1 with automatic PUBACK
//! - Keep-alive supervision with missed-pong detection
//! - Bounded reconnection with a provisioning fallback
//! - Streaming of publish payloads larger than the frame buffer
//!
//! # Usage
//!
//! The main entry point is the [`Session`], which provides methods for
//! connecting, publishing, subscribing and servicing inbound traffic.
//! [`Supervisor`] wraps a session with the reconnection policy.
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::{Broker, Credentials, Options, QoS, Session};
//! # use libmqtt::network::{Close, Read, Transport, Write};
//! # use libmqtt::time::Clock;
//! # struct Link;
//! # impl Read for Link {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl Write for Link {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Close for Link {
//! #     type Error = ();
//! #     fn close(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl Transport for Link {
//! #     type ConnectError = ();
//! #     fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::ConnectError> { Ok(()) }
//! #     fn is_connected(&mut self) -> bool { true }
//! # }
//! # struct Ticks(u64);
//! # impl Clock for Ticks {
//! #     fn now_ms(&self) -> u64 { self.0 }
//! #     fn delay_ms(&mut self, ms: u32) { self.0 += ms as u64; }
//! # }
//!
//! let mut options = Options::new("iot_device_123", Broker::new("192.168.1.10"));
//! options.keep_alive_seconds = 60;
//! options.credentials = Some(Credentials { username: "device", password: Some("secret") });
//!
//! let mut session: Session<'_, _, _, _> =
//!     Session::new(Link, Ticks(0), |_: &str, _: &[u8]| {}, options).unwrap();
//! // session.connect()?;
//! // session.subscribe("sensors/+", QoS::AtLeastOnce)?;
//! // session.publish("status", b"online", false)?;
//! ```

/// Wire format: packet types, remaining length and the frame buffer.
pub mod packet;

mod client;
mod error;
mod options;
mod reconnect;
mod state;

#[cfg(test)]
mod tests;

pub use client::{DEFAULT_BUFFER_SIZE, MessageSink, Session};
pub use error::Error;
pub use options::{
    Broker, Credentials, DEFAULT_KEEP_ALIVE_SECONDS, DEFAULT_PORT,
    DEFAULT_SOCKET_TIMEOUT_SECONDS, MAX_TOPIC_LEN, Options, PRESENCE_PAYLOAD,
    PUBLISH_TOPIC_PREFIX, QoS, SUBSCRIBE_TOPIC_PREFIX, Topics, Will,
};
pub use packet::{FrameBuffer, PayloadStream};
pub use reconnect::{
    DEFAULT_RECONNECT_BUDGET_SECONDS, DEFAULT_RETRY_DELAY_SECONDS, Outcome, ReconnectPolicy,
    Supervisor,
};
pub use state::{ReturnCode, State};
