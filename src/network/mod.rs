//! A network abstraction layer for embedded systems
//!
//! This module provides the byte-stream traits the MQTT engine is written
//! against. A transport only has to move bytes in order; framing, timeouts and
//! session state all live in the engine.
//!
//! Reads are non-blocking: [`Read::read`] returns `Ok(0)` when nothing is
//! available yet, and the engine layers its own deadline on top using a
//! [`Clock`](crate::time::Clock).

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application layer protocols built on the transport traits
pub mod application;

/// TCP transport over `std::net`
#[cfg(feature = "std")]
pub mod tcp;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Read, Transport, Write};
}

/// Non-blocking byte source.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read available bytes into `buf`, returning `Ok(0)` when none are pending
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte sink.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Connection teardown.
///
/// Unlike a one-shot socket, a transport is reopened after it is closed, so
/// `close` borrows instead of consuming.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// An ordered, reliable byte stream that can be (re)opened towards a broker.
pub trait Transport: Read + Write + Close {
    /// Error reported when opening the stream fails
    type ConnectError: core::fmt::Debug;

    /// Open the stream to `host:port`, replacing any previous connection
    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::ConnectError>;

    /// Whether the stream is currently open
    fn is_connected(&mut self) -> bool;
}
