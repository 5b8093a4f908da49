//! MQTT 3.1.1 packet codec.
//!
//! Every packet is built and parsed inside one [`FrameBuffer`]. Outbound packets
//! are encoded body-first after a reserved header area of [`MAX_HEADER_LEN`]
//! bytes; once the body length is known, the type byte and the remaining length
//! are written right-aligned in front of it so the whole frame is contiguous.
//! Inbound packets are read one byte at a time, each byte bounded by a timeout.
//!
//! All writes go through bounds-checked cursor operations: an encode that would
//! run past the end of the buffer fails before touching it.

use super::error::Error;
use super::options::{Credentials, QoS, Will};
use super::state::ReturnCode;
use crate::network::Read;
use crate::time::Clock;

// MQTT Control Packet types - the high nibble of the fixed header
/// CONNECT packet type.
pub const CONNECT: u8 = 0x10;
/// CONNACK packet type.
pub const CONNACK: u8 = 0x20;
/// PUBLISH packet type.
pub const PUBLISH: u8 = 0x30;
/// PUBACK packet type.
pub const PUBACK: u8 = 0x40;
/// SUBSCRIBE packet type.
pub const SUBSCRIBE: u8 = 0x80;
/// SUBACK packet type.
pub const SUBACK: u8 = 0x90;
/// UNSUBSCRIBE packet type.
pub const UNSUBSCRIBE: u8 = 0xA0;
/// UNSUBACK packet type.
pub const UNSUBACK: u8 = 0xB0;
/// PINGREQ packet type.
pub const PINGREQ: u8 = 0xC0;
/// PINGRESP packet type.
pub const PINGRESP: u8 = 0xD0;
/// DISCONNECT packet type.
pub const DISCONNECT: u8 = 0xE0;

/// Mask selecting the packet type from the fixed header.
pub const TYPE_MASK: u8 = 0xF0;
/// Mask selecting the QoS bits from the fixed header.
pub const QOS_MASK: u8 = 0x06;
/// QoS bits for at-least-once delivery.
pub const QOS1: u8 = 0x02;
/// Retain flag of a PUBLISH.
pub const RETAIN: u8 = 0x01;

/// Largest value the remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;
/// Maximum number of bytes in the remaining-length field.
pub const MAX_LENGTH_BYTES: usize = 4;
/// Type byte plus the longest remaining-length field.
pub const MAX_HEADER_LEN: usize = 1 + MAX_LENGTH_BYTES;

/// How long a byte read sleeps between polls of an idle transport.
pub const POLL_INTERVAL_MS: u32 = 1;

// Protocol constants defined by MQTT 3.1.1 specification
const PROTOCOL_NAME: &[u8] = b"MQTT";
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

// Connect flags
const CLEAN_SESSION: u8 = 0x02;
const WILL_FLAG: u8 = 0x04;
const WILL_RETAIN: u8 = 0x20;
const PASSWORD_FLAG: u8 = 0x40;
const USERNAME_FLAG: u8 = 0x80;

/// Encode `len` as an MQTT remaining length into `out`.
///
/// Each byte carries seven bits of the value, least significant group first,
/// with the high bit set when another byte follows. The encoding is always
/// minimal.
///
/// # Returns
///
/// The number of bytes written (1 to 4).
///
/// # Errors
///
/// [`Error::BufferOverflow`] if `len` exceeds [`MAX_REMAINING_LENGTH`].
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::packet::encode_remaining_length;
///
/// let mut out = [0u8; 4];
/// assert_eq!(encode_remaining_length(321, &mut out), Ok(2));
/// assert_eq!(&out[..2], &[0xC1, 0x02]);
/// ```
pub fn encode_remaining_length(
    mut len: usize,
    out: &mut [u8; MAX_LENGTH_BYTES],
) -> Result<usize, Error> {
    if len > MAX_REMAINING_LENGTH {
        return Err(Error::BufferOverflow);
    }
    let mut count = 0;
    loop {
        let mut digit = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            digit |= 0x80;
        }
        out[count] = digit;
        count += 1;
        if len == 0 {
            return Ok(count);
        }
    }
}

/// Decode a remaining length from a byte source.
///
/// Pulls at most [`MAX_LENGTH_BYTES`] bytes from `next_byte`. Errors from the
/// source are passed through unchanged.
///
/// # Returns
///
/// The decoded value and the number of bytes consumed.
///
/// # Errors
///
/// [`Error::MalformedPacket`] if the fourth byte still has its continuation bit
/// set; no fifth byte is ever requested.
pub fn decode_remaining_length<F>(mut next_byte: F) -> Result<(usize, usize), Error>
where
    F: FnMut() -> Result<u8, Error>,
{
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for count in 1..=MAX_LENGTH_BYTES {
        let digit = next_byte()?;
        value += (digit & 0x7F) as usize * multiplier;
        if digit & 0x80 == 0 {
            return Ok((value, count));
        }
        multiplier *= 128;
    }
    Err(Error::MalformedPacket)
}

/// Read one byte, polling the transport until `timeout_ms` elapses.
///
/// # Errors
///
/// * [`Error::Timeout`] - no byte arrived in time
/// * [`Error::Transport`] - the transport reported a read failure
pub fn read_byte<T, K>(transport: &mut T, clock: &mut K, timeout_ms: u64) -> Result<u8, Error>
where
    T: Read + ?Sized,
    K: Clock + ?Sized,
{
    let started = clock.now_ms();
    loop {
        if let Some(byte) = try_read_byte(transport)? {
            return Ok(byte);
        }
        if clock.elapsed_since(started) >= timeout_ms {
            return Err(Error::Timeout);
        }
        clock.delay_ms(POLL_INTERVAL_MS);
    }
}

/// Read one byte if the transport has one pending.
pub fn try_read_byte<T: Read + ?Sized>(transport: &mut T) -> Result<Option<u8>, Error> {
    let mut byte = [0u8; 1];
    match transport.read(&mut byte) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(byte[0])),
        Err(_) => Err(Error::Transport),
    }
}

/// Receiver for PUBLISH payload bytes that are passed through while reading.
///
/// Bytes are delivered as they arrive, before the packet is complete, so a
/// payload larger than the frame buffer can still be consumed.
pub trait PayloadStream {
    /// Accept the next payload byte.
    fn write_byte(&mut self, byte: u8);
}

/// Location of a decoded packet inside the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    header: u8,
    length_bytes: usize,
    remaining_length: usize,
}

impl Frame {
    /// The type and flags byte.
    pub fn header(&self) -> u8 {
        self.header
    }

    /// The packet type (high nibble of the header).
    pub fn packet_type(&self) -> u8 {
        self.header & TYPE_MASK
    }

    /// Decoded remaining length.
    pub fn remaining_length(&self) -> usize {
        self.remaining_length
    }
}

/// Result of reading one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// The whole packet is in the buffer.
    Complete(Frame),
    /// A PUBLISH too large for the buffer whose payload went to a
    /// [`PayloadStream`]. Header, topic and message id are buffered; see
    /// [`FrameBuffer::streamed_publish`].
    Streamed(Frame),
    /// The packet was consumed from the transport but did not fit; its bytes
    /// must not be interpreted.
    Ignored(Frame),
}

/// A typed view of a buffered packet. Valid for one read/process cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    header: u8,
    body: &'a [u8],
}

/// A parsed inbound PUBLISH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    /// Topic the message was published on.
    pub topic: &'a str,
    /// Application payload, without the message identifier.
    pub payload: &'a [u8],
    /// Message identifier, present for QoS 1.
    pub message_id: Option<u16>,
    /// Retain flag.
    pub retained: bool,
}

impl<'a> Packet<'a> {
    /// Build a view over an already framed body.
    pub fn new(header: u8, body: &'a [u8]) -> Self {
        Self { header, body }
    }

    /// The type and flags byte.
    pub fn header(&self) -> u8 {
        self.header
    }

    /// The packet type (high nibble of the header).
    pub fn packet_type(&self) -> u8 {
        self.header & TYPE_MASK
    }

    /// The flag nibble.
    pub fn flags(&self) -> u8 {
        self.header & 0x0F
    }

    /// Bytes following the fixed header.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Interpret the packet as a CONNACK.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedPacket`] unless the packet is a CONNACK with exactly
    /// two body bytes.
    pub fn connack_code(&self) -> Result<ReturnCode, Error> {
        match (self.packet_type(), self.body) {
            (CONNACK, [_, code]) => Ok(ReturnCode::from(*code)),
            _ => Err(Error::MalformedPacket),
        }
    }

    /// Interpret the packet as a PUBLISH.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedPacket`] if the packet is not a PUBLISH, the topic runs
    /// past the body, the topic is not UTF-8, the QoS 1 message identifier is
    /// missing, or the QoS bits request exactly-once delivery.
    pub fn publish(&self) -> Result<Publish<'a>, Error> {
        if self.packet_type() != PUBLISH {
            return Err(Error::MalformedPacket);
        }
        let prefix = self.body.get(..2).ok_or(Error::MalformedPacket)?;
        let topic_len = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;
        let mut offset = 2 + topic_len;
        let topic = self.body.get(2..offset).ok_or(Error::MalformedPacket)?;
        let topic = core::str::from_utf8(topic).map_err(|_| Error::MalformedPacket)?;

        let message_id = match self.header & QOS_MASK {
            0 => None,
            QOS1 => {
                let id = self
                    .body
                    .get(offset..offset + 2)
                    .ok_or(Error::MalformedPacket)?;
                offset += 2;
                Some(u16::from_be_bytes([id[0], id[1]]))
            }
            _ => return Err(Error::MalformedPacket),
        };

        Ok(Publish {
            topic,
            payload: self.body.get(offset..).ok_or(Error::MalformedPacket)?,
            message_id,
            retained: self.header & RETAIN != 0,
        })
    }
}

/// The single bounded buffer a session encodes into and decodes from.
///
/// `N` is the capacity in bytes, fixed at compile time.
#[derive(Debug)]
pub struct FrameBuffer<const N: usize> {
    bytes: [u8; N],
    cursor: usize,
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameBuffer<N> {
    /// An empty buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            cursor: MAX_HEADER_LEN,
        }
    }

    /// Capacity in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Start a new outbound body after the reserved header area.
    pub fn begin(&mut self) {
        self.cursor = MAX_HEADER_LEN;
    }

    /// Bytes encoded since [`begin`](Self::begin).
    pub fn body_len(&self) -> usize {
        self.cursor.saturating_sub(MAX_HEADER_LEN)
    }

    /// Append one byte.
    pub fn encode_u8(&mut self, value: u8) -> Result<(), Error> {
        self.encode_bytes(&[value])
    }

    /// Append a big-endian `u16`.
    pub fn encode_u16(&mut self, value: u16) -> Result<(), Error> {
        self.encode_bytes(&value.to_be_bytes())
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// [`Error::BufferOverflow`] if the bytes do not fit; nothing is written.
    pub fn encode_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        let end = self
            .cursor
            .checked_add(data.len())
            .ok_or(Error::BufferOverflow)?;
        let slot = self
            .bytes
            .get_mut(self.cursor..end)
            .ok_or(Error::BufferOverflow)?;
        slot.copy_from_slice(data);
        self.cursor = end;
        Ok(())
    }

    /// Append a 2-byte big-endian length prefix followed by the UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// [`Error::BufferOverflow`] if the prefixed string does not fit or is
    /// longer than `u16::MAX`; nothing is written.
    pub fn encode_string(&mut self, value: &str) -> Result<(), Error> {
        let len = u16::try_from(value.len()).map_err(|_| Error::BufferOverflow)?;
        if self.cursor + 2 + value.len() > N {
            return Err(Error::BufferOverflow);
        }
        self.encode_u16(len)?;
        self.encode_bytes(value.as_bytes())
    }

    /// Write the fixed header in front of the encoded body.
    ///
    /// # Returns
    ///
    /// The complete frame, ready to be written to the transport.
    pub fn encode_header(&mut self, header: u8) -> Result<&[u8], Error> {
        let mut digits = [0u8; MAX_LENGTH_BYTES];
        let count = encode_remaining_length(self.body_len(), &mut digits)?;
        let start = MAX_HEADER_LEN - 1 - count;
        let head = self
            .bytes
            .get_mut(start..MAX_HEADER_LEN)
            .ok_or(Error::BufferOverflow)?;
        head[0] = header;
        head[1..].copy_from_slice(&digits[..count]);
        self.bytes
            .get(start..self.cursor)
            .ok_or(Error::BufferOverflow)
    }

    /// Encode a CONNECT packet.
    pub fn encode_connect(
        &mut self,
        client_id: &str,
        keep_alive_seconds: u16,
        will: Option<&Will<'_>>,
        credentials: Option<&Credentials<'_>>,
    ) -> Result<&[u8], Error> {
        self.begin();
        // --- Variable Header ---
        self.encode_u16(PROTOCOL_NAME.len() as u16)?;
        self.encode_bytes(PROTOCOL_NAME)?;
        self.encode_u8(PROTOCOL_LEVEL)?;
        self.encode_u8(connect_flags(will, credentials))?;
        self.encode_u16(keep_alive_seconds)?;

        // --- Payload ---
        self.encode_string(client_id)?;
        if let Some(will) = will {
            self.encode_string(will.topic)?;
            self.encode_string(will.message)?;
        }
        if let Some(credentials) = credentials {
            self.encode_string(credentials.username)?;
            if let Some(password) = credentials.password {
                self.encode_string(password)?;
            }
        }
        self.encode_header(CONNECT)
    }

    /// Encode a QoS 0 PUBLISH.
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] if header, topic and payload exceed the
    /// capacity. The check runs before anything is written.
    pub fn encode_publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<&[u8], Error> {
        let required = MAX_HEADER_LEN
            .saturating_add(2)
            .saturating_add(topic.len())
            .saturating_add(payload.len());
        if required > N {
            return Err(Error::PayloadTooLarge);
        }
        self.begin();
        self.encode_string(topic)?;
        self.encode_bytes(payload)?;
        let header = if retained { PUBLISH | RETAIN } else { PUBLISH };
        self.encode_header(header)
    }

    /// Encode a SUBSCRIBE for a single topic.
    ///
    /// # Errors
    ///
    /// [`Error::TopicTooLong`] if the packet would exceed the capacity.
    pub fn encode_subscribe(
        &mut self,
        message_id: u16,
        topic: &str,
        qos: QoS,
    ) -> Result<&[u8], Error> {
        self.check_topic(topic, 1)?;
        self.begin();
        self.encode_u16(message_id)?;
        self.encode_string(topic)?;
        self.encode_u8(qos as u8)?;
        self.encode_header(SUBSCRIBE | QOS1)
    }

    /// Encode an UNSUBSCRIBE for a single topic.
    ///
    /// # Errors
    ///
    /// [`Error::TopicTooLong`] if the packet would exceed the capacity.
    pub fn encode_unsubscribe(&mut self, message_id: u16, topic: &str) -> Result<&[u8], Error> {
        self.check_topic(topic, 0)?;
        self.begin();
        self.encode_u16(message_id)?;
        self.encode_string(topic)?;
        self.encode_header(UNSUBSCRIBE | QOS1)
    }

    /// Encode a PUBACK echoing `message_id`.
    pub fn encode_puback(&mut self, message_id: u16) -> Result<&[u8], Error> {
        self.begin();
        self.encode_u16(message_id)?;
        self.encode_header(PUBACK)
    }

    /// Encode a packet without a body (PINGREQ, PINGRESP, DISCONNECT).
    pub fn encode_control(&mut self, packet_type: u8) -> Result<&[u8], Error> {
        self.begin();
        self.encode_header(packet_type)
    }

    fn check_topic(&self, topic: &str, trailer: usize) -> Result<(), Error> {
        let required = MAX_HEADER_LEN
            .saturating_add(2 + 2 + trailer)
            .saturating_add(topic.len());
        if required > N || topic.len() > u16::MAX as usize {
            return Err(Error::TopicTooLong);
        }
        Ok(())
    }

    /// Read the rest of a packet whose first byte was `header`.
    ///
    /// The remaining length and the body are read byte by byte, each byte
    /// bounded by `timeout_ms`. For a PUBLISH the topic length is decoded on
    /// the way so that payload bytes can be handed to `stream` as they arrive.
    /// A packet larger than the buffer is still consumed in full, keeping the
    /// transport aligned on the next packet. An oversized PUBLISH read with a
    /// `stream` is reported as [`Decoded::Streamed`], anything else as
    /// [`Decoded::Ignored`].
    ///
    /// # Errors
    ///
    /// * [`Error::Timeout`] - a byte did not arrive in time; the packet is lost
    /// * [`Error::MalformedPacket`] - the remaining length needs a fifth byte
    /// * [`Error::Transport`] - the transport failed
    pub fn read_packet<T, K>(
        &mut self,
        header: u8,
        transport: &mut T,
        clock: &mut K,
        timeout_ms: u64,
        mut stream: Option<&mut dyn PayloadStream>,
    ) -> Result<Decoded, Error>
    where
        T: Read + ?Sized,
        K: Clock + ?Sized,
    {
        let is_publish = header & TYPE_MASK == PUBLISH;
        let mut len = 0usize;
        store(&mut self.bytes, &mut len, header);

        let bytes = &mut self.bytes;
        let (remaining_length, length_bytes) = decode_remaining_length(|| {
            let digit = read_byte(transport, clock, timeout_ms)?;
            store(bytes, &mut len, digit);
            Ok(digit)
        })?;

        let mut start = 0;
        let mut skip = 0;
        if is_publish && remaining_length >= 2 {
            let high = read_byte(transport, clock, timeout_ms)?;
            store(&mut self.bytes, &mut len, high);
            let low = read_byte(transport, clock, timeout_ms)?;
            store(&mut self.bytes, &mut len, low);
            skip = u16::from_be_bytes([high, low]) as usize;
            if header & QOS_MASK == QOS1 {
                skip += 2;
            }
            start = 2;
        }

        for index in start..remaining_length {
            let byte = read_byte(transport, clock, timeout_ms)?;
            if is_publish && index >= skip + 2 {
                if let Some(stream) = stream.as_mut() {
                    stream.write_byte(byte);
                }
            }
            store(&mut self.bytes, &mut len, byte);
        }

        let frame = Frame {
            header,
            length_bytes,
            remaining_length,
        };
        if len <= N {
            Ok(Decoded::Complete(frame))
        } else if is_publish && stream.is_some() {
            Ok(Decoded::Streamed(frame))
        } else {
            Ok(Decoded::Ignored(frame))
        }
    }

    /// View a [`Decoded::Streamed`] publish.
    ///
    /// The payload already went to the stream, so the returned payload is
    /// empty.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedPacket`] if the topic or message id did not fit the
    /// buffer or is invalid.
    pub fn streamed_publish(&self, frame: &Frame) -> Result<Publish<'_>, Error> {
        let start = 1 + frame.length_bytes;
        let end = (start + frame.remaining_length).min(N);
        let body = self.bytes.get(start..end).ok_or(Error::MalformedPacket)?;
        let publish = Packet::new(frame.header, body).publish()?;
        Ok(Publish {
            payload: &[],
            ..publish
        })
    }

    /// View a packet decoded by [`read_packet`](Self::read_packet).
    ///
    /// # Errors
    ///
    /// [`Error::BufferOverflow`] if the frame does not lie inside the buffer,
    /// which is the case for every [`Decoded::Ignored`] frame.
    pub fn packet(&self, frame: &Frame) -> Result<Packet<'_>, Error> {
        let start = 1 + frame.length_bytes;
        let end = start + frame.remaining_length;
        let body = self.bytes.get(start..end).ok_or(Error::BufferOverflow)?;
        Ok(Packet::new(frame.header, body))
    }
}

fn store(bytes: &mut [u8], len: &mut usize, byte: u8) {
    if let Some(slot) = bytes.get_mut(*len) {
        *slot = byte;
    }
    *len += 1;
}

fn connect_flags(will: Option<&Will<'_>>, credentials: Option<&Credentials<'_>>) -> u8 {
    let mut flags = match will {
        Some(will) => {
            let mut flags = CLEAN_SESSION | WILL_FLAG | ((will.qos as u8) << 3);
            if will.retain {
                flags |= WILL_RETAIN;
            }
            flags
        }
        None => CLEAN_SESSION,
    };
    if let Some(credentials) = credentials {
        flags |= USERNAME_FLAG;
        if credentials.password.is_some() {
            flags |= PASSWORD_FLAG;
        }
    }
    flags
}
