//! Error types for the MQTT engine.

use super::state::ReturnCode;

/// Errors reported by the MQTT engine.
///
/// Transport-level failures (`Transport`, `Timeout`, `PeerUnresponsive`) are
/// recoverable through reconnection. Outbound sizing errors are caller errors
/// and are always raised before any byte reaches the transport.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Opening, reading from or writing to the transport failed.
    Transport,
    /// A handshake or byte-read deadline elapsed.
    Timeout,
    /// An inbound packet could not be parsed and was dropped.
    MalformedPacket,
    /// An encode step would have written past the end of the frame buffer.
    BufferOverflow,
    /// The publish topic plus payload does not fit in the frame buffer.
    PayloadTooLarge,
    /// The topic does not fit in the frame buffer or in a topic string.
    TopicTooLong,
    /// A QoS level other than 0 or 1 was requested.
    InvalidQos,
    /// The broker refused the session with the given return code.
    RejectedByPeer(ReturnCode),
    /// A keepalive ping went unanswered.
    PeerUnresponsive,
    /// The operation requires an established session.
    NotConnected,
}

impl Error {
    /// Whether the error is cured by tearing down and re-establishing the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport | Error::Timeout | Error::PeerUnresponsive | Error::NotConnected
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transport => defmt::write!(f, "Transport"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::MalformedPacket => defmt::write!(f, "MalformedPacket"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
            Error::PayloadTooLarge => defmt::write!(f, "PayloadTooLarge"),
            Error::TopicTooLong => defmt::write!(f, "TopicTooLong"),
            Error::InvalidQos => defmt::write!(f, "InvalidQos"),
            Error::RejectedByPeer(code) => defmt::write!(f, "RejectedByPeer({})", code),
            Error::PeerUnresponsive => defmt::write!(f, "PeerUnresponsive"),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
        }
    }
}
