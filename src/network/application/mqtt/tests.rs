use super::packet::*;
use super::*;
use crate::network::Read;
use crate::time::Clock;

struct Script {
    bytes: &'static [u8],
    pos: usize,
}

impl Script {
    fn new(bytes: &'static [u8]) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl Read for Script {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.pos >= self.bytes.len() || buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.bytes[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

struct Ticks(u64);

impl Clock for Ticks {
    fn now_ms(&self) -> u64 {
        self.0
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0 += ms as u64;
    }
}

struct Collect(std::vec::Vec<u8>);

impl PayloadStream for Collect {
    fn write_byte(&mut self, byte: u8) {
        self.0.push(byte);
    }
}

fn decode(bytes: &[u8]) -> Result<(usize, usize), Error> {
    let mut iter = bytes.iter();
    decode_remaining_length(|| iter.next().copied().ok_or(Error::Timeout))
}

#[test]
fn test_remaining_length_boundaries() {
    let cases: [(usize, &[u8]); 8] = [
        (0, &[0x00]),
        (127, &[0x7F]),
        (128, &[0x80, 0x01]),
        (16_383, &[0xFF, 0x7F]),
        (16_384, &[0x80, 0x80, 0x01]),
        (2_097_151, &[0xFF, 0xFF, 0x7F]),
        (2_097_152, &[0x80, 0x80, 0x80, 0x01]),
        (MAX_REMAINING_LENGTH, &[0xFF, 0xFF, 0xFF, 0x7F]),
    ];
    for (value, expected) in cases {
        let mut out = [0u8; MAX_LENGTH_BYTES];
        let count = encode_remaining_length(value, &mut out).unwrap();
        assert_eq!(&out[..count], expected, "encoding {}", value);
        assert_eq!(decode(expected), Ok((value, expected.len())));
    }
}

#[test]
fn test_remaining_length_too_large() {
    let mut out = [0u8; MAX_LENGTH_BYTES];
    assert_eq!(
        encode_remaining_length(MAX_REMAINING_LENGTH + 1, &mut out),
        Err(Error::BufferOverflow)
    );
}

#[test]
fn test_remaining_length_rejects_fifth_byte() {
    let mut pulled = 0;
    let result = decode_remaining_length(|| {
        pulled += 1;
        Ok(0xFF)
    });
    assert_eq!(result, Err(Error::MalformedPacket));
    assert_eq!(pulled, MAX_LENGTH_BYTES);
}

#[test]
fn test_connect_minimal() {
    let mut buffer = FrameBuffer::<64>::new();
    let frame = buffer.encode_connect("dev", 15, None, None).unwrap();
    assert_eq!(
        frame,
        &[
            0x10, 15, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0F, 0x00, 0x03,
            b'd', b'e', b'v'
        ]
    );
}

#[test]
fn test_connect_flags_with_will_and_credentials() {
    let will = Will {
        topic: "w",
        message: "bye",
        qos: QoS::AtLeastOnce,
        retain: true,
    };
    let credentials = Credentials {
        username: "u",
        password: Some("p"),
    };
    let mut buffer = FrameBuffer::<64>::new();
    let frame = buffer
        .encode_connect("id", 60, Some(&will), Some(&credentials))
        .unwrap();
    // clean | will | qos 1 | will retain | password | user name
    assert_eq!(frame[9], 0x02 | 0x04 | 0x08 | 0x20 | 0x40 | 0x80);
    assert_eq!(&frame[10..12], &[0x00, 60]);
    assert_eq!(
        &frame[12..],
        &[0, 2, b'i', b'd', 0, 1, b'w', 0, 3, b'b', b'y', b'e', 0, 1, b'u', 0, 1, b'p']
    );
}

#[test]
fn test_connect_username_without_password() {
    let credentials = Credentials {
        username: "user",
        password: None,
    };
    let mut buffer = FrameBuffer::<64>::new();
    let frame = buffer
        .encode_connect("id", 0, None, Some(&credentials))
        .unwrap();
    assert_eq!(frame[9], 0x82);
}

#[test]
fn test_connect_does_not_fit() {
    let mut buffer = FrameBuffer::<16>::new();
    assert_eq!(
        buffer.encode_connect("a-rather-long-client-id", 15, None, None),
        Err(Error::BufferOverflow)
    );
}

#[test]
fn test_publish_frame() {
    let mut buffer = FrameBuffer::<64>::new();
    let frame = buffer.encode_publish("a/b", b"hi", false).unwrap();
    assert_eq!(frame, &[0x30, 7, 0x00, 0x03, b'a', b'/', b'b', b'h', b'i']);

    let frame = buffer.encode_publish("a/b", b"hi", true).unwrap();
    assert_eq!(frame[0], 0x31);
}

#[test]
fn test_publish_size_limit() {
    // 5 header bytes + 2 length bytes + 3 topic bytes leave 6 payload bytes.
    let mut buffer = FrameBuffer::<16>::new();
    assert!(buffer.encode_publish("a/b", &[0u8; 6], false).is_ok());
    assert_eq!(
        buffer.encode_publish("a/b", &[0u8; 7], false),
        Err(Error::PayloadTooLarge)
    );
}

#[test]
fn test_publish_large_body_uses_two_length_bytes() {
    let mut buffer = FrameBuffer::<256>::new();
    let payload = [0xAAu8; 200];
    let frame = buffer.encode_publish("t", &payload, false).unwrap();
    assert_eq!(&frame[..3], &[0x30, 0xCB, 0x01]);
    assert_eq!(frame.len(), 3 + 203);
}

#[test]
fn test_subscribe_and_unsubscribe_frames() {
    let mut buffer = FrameBuffer::<64>::new();
    let frame = buffer.encode_subscribe(2, "in", QoS::AtMostOnce).unwrap();
    assert_eq!(frame, &[0x82, 7, 0x00, 0x02, 0x00, 0x02, b'i', b'n', 0x00]);

    let frame = buffer.encode_unsubscribe(3, "in").unwrap();
    assert_eq!(frame, &[0xA2, 6, 0x00, 0x03, 0x00, 0x02, b'i', b'n']);
}

#[test]
fn test_subscribe_topic_too_long() {
    let mut buffer = FrameBuffer::<16>::new();
    // 5 + 2 + 2 + 6 + 1 = 16 fits exactly
    assert!(buffer.encode_subscribe(1, "abcdef", QoS::AtMostOnce).is_ok());
    assert_eq!(
        buffer.encode_subscribe(1, "abcdefg", QoS::AtMostOnce),
        Err(Error::TopicTooLong)
    );
}

#[test]
fn test_control_frames() {
    let mut buffer = FrameBuffer::<8>::new();
    assert_eq!(buffer.encode_control(PINGREQ).unwrap(), &[0xC0, 0x00]);
    assert_eq!(buffer.encode_control(DISCONNECT).unwrap(), &[0xE0, 0x00]);
    assert_eq!(buffer.encode_puback(7).unwrap(), &[0x40, 0x02, 0x00, 0x07]);
}

#[test]
fn test_encode_bytes_checks_bounds() {
    let mut buffer = FrameBuffer::<8>::new();
    buffer.begin();
    assert!(buffer.encode_bytes(&[1, 2, 3]).is_ok());
    assert_eq!(buffer.encode_bytes(&[4]), Err(Error::BufferOverflow));
    assert_eq!(buffer.body_len(), 3);
}

#[test]
fn test_read_connack() {
    let mut buffer = FrameBuffer::<16>::new();
    let mut link = Script::new(&[0x02, 0x00, 0x05]);
    let mut clock = Ticks(0);
    let decoded = buffer
        .read_packet(CONNACK, &mut link, &mut clock, 100, None)
        .unwrap();
    let Decoded::Complete(frame) = decoded else {
        panic!("expected a complete frame");
    };
    let packet = buffer.packet(&frame).unwrap();
    assert_eq!(packet.connack_code(), Ok(ReturnCode::NotAuthorized));
}

#[test]
fn test_connack_with_wrong_length_is_malformed() {
    let packet = Packet::new(CONNACK, &[0x00, 0x00, 0x00]);
    assert_eq!(packet.connack_code(), Err(Error::MalformedPacket));
    let packet = Packet::new(SUBACK, &[0x00, 0x00]);
    assert_eq!(packet.connack_code(), Err(Error::MalformedPacket));
}

#[test]
fn test_read_qos1_publish() {
    let mut buffer = FrameBuffer::<32>::new();
    let mut link = Script::new(&[9, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07, b'o', b'k']);
    let mut clock = Ticks(0);
    let mut stream = Collect(std::vec::Vec::new());
    let decoded = buffer
        .read_packet(
            PUBLISH | QOS1,
            &mut link,
            &mut clock,
            100,
            Some(&mut stream),
        )
        .unwrap();
    let Decoded::Complete(frame) = decoded else {
        panic!("expected a complete frame");
    };
    let publish = buffer.packet(&frame).unwrap().publish().unwrap();
    assert_eq!(publish.topic, "a/b");
    assert_eq!(publish.payload, b"ok");
    assert_eq!(publish.message_id, Some(7));
    assert!(!publish.retained);
    assert_eq!(stream.0, b"ok");
}

static OVERSIZED: [u8; 23] = [
    21, 0x00, 0x01, b't', b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'a', b'b',
    b'c', b'd', b'e', b'f', b'g', b'h', 0xC0,
];

#[test]
fn test_oversized_publish_is_streamed() {
    let mut buffer = FrameBuffer::<8>::new();
    let mut link = Script::new(&OVERSIZED);
    let mut clock = Ticks(0);
    let mut stream = Collect(std::vec::Vec::new());
    let decoded = buffer
        .read_packet(PUBLISH, &mut link, &mut clock, 100, Some(&mut stream))
        .unwrap();
    let Decoded::Streamed(frame) = decoded else {
        panic!("expected a streamed publish");
    };
    assert_eq!(frame.remaining_length(), 21);
    assert!(buffer.packet(&frame).is_err());
    let publish = buffer.streamed_publish(&frame).unwrap();
    assert_eq!(publish.topic, "t");
    assert_eq!(publish.message_id, None);
    assert!(publish.payload.is_empty());
    assert_eq!(stream.0, b"0123456789abcdefgh");
    // The next packet starts right after the streamed one.
    assert_eq!(try_read_byte(&mut link), Ok(Some(0xC0)));
}

#[test]
fn test_oversized_publish_without_stream_is_ignored() {
    let mut buffer = FrameBuffer::<8>::new();
    let mut link = Script::new(&OVERSIZED);
    let mut clock = Ticks(0);
    let decoded = buffer
        .read_packet(PUBLISH, &mut link, &mut clock, 100, None)
        .unwrap();
    let Decoded::Ignored(frame) = decoded else {
        panic!("expected the packet to be ignored");
    };
    assert_eq!(frame.remaining_length(), 21);
    assert_eq!(try_read_byte(&mut link), Ok(Some(0xC0)));
}

#[test]
fn test_streamed_publish_with_truncated_topic_is_malformed() {
    static WIRE: [u8; 13] = [
        11, 0x00, 0x09, b'l', b'o', b'n', b'g', b'/', b't', b'o', b'p', b'i', b'c',
    ];
    let mut buffer = FrameBuffer::<8>::new();
    let mut link = Script::new(&WIRE);
    let mut clock = Ticks(0);
    let mut stream = Collect(std::vec::Vec::new());
    let decoded = buffer
        .read_packet(PUBLISH, &mut link, &mut clock, 100, Some(&mut stream))
        .unwrap();
    let Decoded::Streamed(frame) = decoded else {
        panic!("expected a streamed publish");
    };
    assert_eq!(buffer.streamed_publish(&frame), Err(Error::MalformedPacket));
}

#[test]
fn test_read_byte_times_out() {
    let mut link = Script::new(&[]);
    let mut clock = Ticks(1_000);
    assert_eq!(read_byte(&mut link, &mut clock, 50), Err(Error::Timeout));
    assert_eq!(clock.0, 1_050);
}

#[test]
fn test_truncated_packet_times_out() {
    let mut buffer = FrameBuffer::<16>::new();
    let mut link = Script::new(&[0x02, 0x00]);
    let mut clock = Ticks(0);
    assert_eq!(
        buffer.read_packet(CONNACK, &mut link, &mut clock, 10, None),
        Err(Error::Timeout)
    );
}

#[test]
fn test_qos2_publish_is_malformed() {
    let body = [0x00, 0x01, b't', 0x00, 0x01, b'x'];
    let packet = Packet::new(PUBLISH | 0x04, &body);
    assert_eq!(packet.publish(), Err(Error::MalformedPacket));
}

#[test]
fn test_publish_topic_past_body_is_malformed() {
    let body = [0x00, 0x09, b't'];
    let packet = Packet::new(PUBLISH, &body);
    assert_eq!(packet.publish(), Err(Error::MalformedPacket));
}

#[test]
fn test_topics_for_client() {
    let topics = Topics::for_client("node-1").unwrap();
    assert_eq!(topics.publish(), "outTopic/node-1");
    assert_eq!(topics.subscribe(), "inTopic/node-1");

    let long = "x".repeat(MAX_TOPIC_LEN);
    assert_eq!(Topics::for_client(&long), Err(Error::TopicTooLong));
}

#[test]
fn test_return_codes() {
    for code in 0..=5u8 {
        assert_eq!(ReturnCode::from(code).code(), code);
    }
    assert_eq!(ReturnCode::from(0x80), ReturnCode::Other(0x80));
    assert!(State::RejectedByPeer(ReturnCode::IdentifierRejected).is_failure());
    assert!(!State::Disconnected.is_failure());
    assert!(State::Disconnected.is_terminal());
    assert!(!State::Connected.is_terminal());
}

#[test]
fn test_reconnect_policy_from_budget() {
    assert_eq!(ReconnectPolicy::default().max_retries, 4);
    assert_eq!(ReconnectPolicy::default().retry_delay_ms, 5_000);
    assert_eq!(ReconnectPolicy::from_budget(3, 5).max_retries, 1);
    assert_eq!(ReconnectPolicy::from_budget(10, 0).max_retries, 1);
}
