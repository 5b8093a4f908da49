//! Session configuration.

use super::error::Error;
use core::fmt::Write as _;
use heapless::String;

/// Default MQTT port for unencrypted connections.
pub const DEFAULT_PORT: u16 = 1883;

/// Default keepalive interval advertised in CONNECT.
pub const DEFAULT_KEEP_ALIVE_SECONDS: u16 = 15;

/// Default deadline for the CONNACK and for each byte of an inbound packet.
pub const DEFAULT_SOCKET_TIMEOUT_SECONDS: u16 = 15;

/// Maximum length of a derived device topic.
pub const MAX_TOPIC_LEN: usize = 64;

/// Prefix of the topic a device publishes on.
pub const PUBLISH_TOPIC_PREFIX: &str = "outTopic/";

/// Prefix of the topic a device listens on.
pub const SUBSCRIBE_TOPIC_PREFIX: &str = "inTopic/";

/// Payload announced on the publish topic after every successful connect.
pub const PRESENCE_PAYLOAD: &[u8] = b"conn";

/// Quality of Service levels supported by the engine.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(2).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery.
    AtLeastOnce = 1,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            _ => Err(Error::InvalidQos),
        }
    }
}

/// Broker address.
#[derive(Debug, Clone, Copy)]
pub struct Broker<'a> {
    /// Hostname or dotted IP address.
    pub host: &'a str,
    /// TCP port.
    pub port: u16,
}

impl<'a> Broker<'a> {
    /// A broker on the default MQTT port.
    pub const fn new(host: &'a str) -> Self {
        Self {
            host,
            port: DEFAULT_PORT,
        }
    }
}

/// Last-will message registered with the broker during CONNECT.
#[derive(Debug, Clone, Copy)]
pub struct Will<'a> {
    /// Topic the broker publishes the will on.
    pub topic: &'a str,
    /// Will payload.
    pub message: &'a str,
    /// QoS of the will publish.
    pub qos: QoS,
    /// Whether the broker retains the will.
    pub retain: bool,
}

/// Broker credentials. A password is only sent together with a user name.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    /// User name.
    pub username: &'a str,
    /// Optional password.
    pub password: Option<&'a str>,
}

/// Configuration options for an MQTT session.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::{Broker, Options};
///
/// let mut options = Options::new("greenhouse-7", Broker::new("broker.local"));
/// options.keep_alive_seconds = 30;
///
/// assert_eq!(options.broker.port, 1883);
/// assert!(options.will.is_none());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    /// The client identifier, also used to derive the device topics.
    pub client_id: &'a str,

    /// Where to connect.
    pub broker: Broker<'a>,

    /// Keepalive interval in seconds. Zero disables pinging.
    pub keep_alive_seconds: u16,

    /// Deadline for the CONNACK and for each byte of an inbound packet.
    pub socket_timeout_seconds: u16,

    /// Optional user name and password.
    pub credentials: Option<Credentials<'a>>,

    /// Optional last-will message.
    pub will: Option<Will<'a>>,
}

impl<'a> Options<'a> {
    /// Options with default timing and no credentials or will.
    pub const fn new(client_id: &'a str, broker: Broker<'a>) -> Self {
        Self {
            client_id,
            broker,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
            socket_timeout_seconds: DEFAULT_SOCKET_TIMEOUT_SECONDS,
            credentials: None,
            will: None,
        }
    }

    pub(crate) fn keep_alive_ms(&self) -> u64 {
        self.keep_alive_seconds as u64 * 1000
    }

    pub(crate) fn socket_timeout_ms(&self) -> u64 {
        self.socket_timeout_seconds as u64 * 1000
    }
}

/// The publish/subscribe topic pair of a device.
///
/// Each device owns exactly one channel pair derived from its client
/// identifier; the pair is fixed once the session is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    publish: String<MAX_TOPIC_LEN>,
    subscribe: String<MAX_TOPIC_LEN>,
}

impl Topics {
    /// Derive `outTopic/<id>` and `inTopic/<id>`.
    ///
    /// # Errors
    ///
    /// [`Error::TopicTooLong`] if either topic exceeds [`MAX_TOPIC_LEN`].
    pub fn for_client(client_id: &str) -> Result<Self, Error> {
        let mut publish = String::new();
        write!(publish, "{}{}", PUBLISH_TOPIC_PREFIX, client_id)
            .map_err(|_| Error::TopicTooLong)?;
        let mut subscribe = String::new();
        write!(subscribe, "{}{}", SUBSCRIBE_TOPIC_PREFIX, client_id)
            .map_err(|_| Error::TopicTooLong)?;
        Ok(Self { publish, subscribe })
    }

    /// Topic the device publishes on.
    pub fn publish(&self) -> &str {
        &self.publish
    }

    /// Topic the device subscribes to.
    pub fn subscribe(&self) -> &str {
        &self.subscribe
    }
}
