//! Connection states and CONNACK return codes.

/// CONNACK return code as defined by MQTT 3.1.1.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReturnCode {
    /// Connection accepted.
    Accepted,
    /// The broker does not support the requested protocol level.
    UnacceptableProtocolVersion,
    /// The client identifier is not allowed by the broker.
    IdentifierRejected,
    /// The broker is up but the MQTT service is unavailable.
    ServerUnavailable,
    /// The user name or password is malformed or wrong.
    BadUsernameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A code outside the range defined by the protocol.
    Other(u8),
}

impl ReturnCode {
    /// The raw code as carried on the wire.
    pub fn code(self) -> u8 {
        match self {
            ReturnCode::Accepted => 0,
            ReturnCode::UnacceptableProtocolVersion => 1,
            ReturnCode::IdentifierRejected => 2,
            ReturnCode::ServerUnavailable => 3,
            ReturnCode::BadUsernameOrPassword => 4,
            ReturnCode::NotAuthorized => 5,
            ReturnCode::Other(code) => code,
        }
    }
}

impl From<u8> for ReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => ReturnCode::Accepted,
            1 => ReturnCode::UnacceptableProtocolVersion,
            2 => ReturnCode::IdentifierRejected,
            3 => ReturnCode::ServerUnavailable,
            4 => ReturnCode::BadUsernameOrPassword,
            5 => ReturnCode::NotAuthorized,
            other => ReturnCode::Other(other),
        }
    }
}

/// Status of a [`Session`](super::Session).
///
/// A session starts `Disconnected`, passes through `Connecting` during the
/// handshake and settles in `Connected` or in one of the failure states. Every
/// state except `Connecting` and `Connected` is terminal until the next
/// explicit connect.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// No session; initial state and the result of `disconnect`.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// CONNACK accepted; the session is live.
    Connected,
    /// The transport could not be opened or failed during the handshake.
    TransportConnectFailed,
    /// No CONNACK arrived before the socket timeout.
    HandshakeTimeout,
    /// The broker answered with a non-zero return code.
    RejectedByPeer(ReturnCode),
    /// The transport dropped or the keepalive ping went unanswered.
    ConnectionLost,
}

impl State {
    /// Whether the state ends the session until the next connect.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, State::Connecting | State::Connected)
    }

    /// Whether the state records a failure rather than an orderly disconnect.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            State::TransportConnectFailed
                | State::HandshakeTimeout
                | State::RejectedByPeer(_)
                | State::ConnectionLost
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ReturnCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=u8}", self.code())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for State {
    fn format(&self, f: defmt::Formatter) {
        match self {
            State::Disconnected => defmt::write!(f, "Disconnected"),
            State::Connecting => defmt::write!(f, "Connecting"),
            State::Connected => defmt::write!(f, "Connected"),
            State::TransportConnectFailed => defmt::write!(f, "TransportConnectFailed"),
            State::HandshakeTimeout => defmt::write!(f, "HandshakeTimeout"),
            State::RejectedByPeer(code) => defmt::write!(f, "RejectedByPeer({})", code),
            State::ConnectionLost => defmt::write!(f, "ConnectionLost"),
        }
    }
}
