//! Control channel.
//!
//! Commands arrive on the device's subscribe topic as a JSON array; only the
//! first object is interpreted and its `header` selects the directive:
//!
//! ```json
//! [{"header":"data","data":[{"pin":2,"value":1},{"pin":4,"value":0}]}]
//! [{"header":"station"}]
//! ```
//!
//! [`ControlSink`] is the [`MessageSink`] the device hands to its session. It
//! parses each message on arrival and queues the result; the device applies the
//! queue after the session poll returns.

use super::Error;
use crate::network::application::mqtt::MessageSink;
use heapless::{Deque, Vec};
use serde::Deserialize;

/// Maximum number of pin writes carried by one `data` directive.
pub const MAX_PIN_WRITES: usize = 8;

/// Maximum number of objects accepted in the top-level array.
pub const MAX_ENVELOPES: usize = 4;

/// Number of parsed directives waiting to be applied.
pub const DIRECTIVE_QUEUE_LEN: usize = 4;

/// A single output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PinWrite {
    /// Pin number.
    pub pin: u8,
    /// Level to drive.
    pub value: u8,
}

/// A parsed control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Drive each listed pin to its value, in order.
    Data(Vec<PinWrite, MAX_PIN_WRITES>),
    /// Drop back to provisioning mode.
    Station,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow)]
    header: &'a str,
    #[serde(default)]
    data: Vec<PinWrite, MAX_PIN_WRITES>,
}

/// Parse a control message.
///
/// # Errors
///
/// * [`Error::InvalidDocument`] - not a JSON array of objects, or empty
/// * [`Error::UnsupportedDirective`] - the first header is neither `data` nor
///   `station`
///
/// # Examples
///
/// ```rust
/// use libmqtt::device::control::{parse, Directive};
///
/// let directive = parse(br#"[{"header":"station"}]"#).unwrap();
/// assert_eq!(directive, Directive::Station);
/// ```
pub fn parse(payload: &[u8]) -> Result<Directive, Error> {
    let (envelopes, _): (Vec<Envelope<'_>, MAX_ENVELOPES>, _) =
        serde_json_core::from_slice(payload).map_err(|_| Error::InvalidDocument)?;
    let first = envelopes.into_iter().next().ok_or(Error::InvalidDocument)?;
    match first.header {
        "data" => Ok(Directive::Data(first.data)),
        "station" => Ok(Directive::Station),
        _ => Err(Error::UnsupportedDirective),
    }
}

/// Message sink that queues control directives.
#[derive(Debug, Default)]
pub struct ControlSink {
    pending: Deque<Directive, DIRECTIVE_QUEUE_LEN>,
    deliveries: u32,
}

impl ControlSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest directive not yet applied.
    pub fn next_directive(&mut self) -> Option<Directive> {
        self.pending.pop_front()
    }

    /// Number of messages delivered since the last call, valid or not.
    pub fn take_deliveries(&mut self) -> u32 {
        core::mem::take(&mut self.deliveries)
    }
}

impl MessageSink for ControlSink {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self.deliveries = self.deliveries.saturating_add(1);
        debug!("control: message on {} ({} bytes)", topic, payload.len());
        match parse(payload) {
            Ok(directive) => {
                if self.pending.push_back(directive).is_err() {
                    warn!("control: directive queue full, dropping");
                }
            }
            Err(_) => warn!("control: unparseable message dropped"),
        }
    }
}
