use criterion::{BatchSize, Criterion, Throughput};
use libmqtt::network::application::mqtt::{Broker, Options, Session};
use libmqtt::network::error::Error;
use libmqtt::network::{Close, Read, Transport, Write};
use libmqtt::time::Clock;
use std::collections::VecDeque;

const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// In-memory transport: writes are discarded, reads drain a scripted queue.
#[derive(Default)]
struct Loopback {
    rx: VecDeque<u8>,
    open: bool,
    sent: usize,
}

impl Read for Loopback {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match (buf.first_mut(), self.rx.pop_front()) {
            (Some(slot), Some(byte)) => {
                *slot = byte;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

impl Write for Loopback {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.sent += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for Loopback {
    type Error = Error;
    fn close(&mut self) -> Result<(), Self::Error> {
        self.open = false;
        Ok(())
    }
}

impl Transport for Loopback {
    type ConnectError = Error;
    fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::ConnectError> {
        self.open = true;
        self.rx.extend(CONNACK);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.open
    }
}

#[derive(Default)]
struct Counter(u64);

impl Clock for Counter {
    fn now_ms(&self) -> u64 {
        self.0
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0 += ms as u64;
    }
}

type BenchSession = Session<'static, Loopback, Counter, fn(&str, &[u8])>;

fn discard(_topic: &str, _payload: &[u8]) {}

fn setup_session() -> BenchSession {
    let options = Options::new("libmqtt-bench", Broker::new("loopback"));
    let mut session = Session::new(
        Loopback::default(),
        Counter::default(),
        discard as fn(&str, &[u8]),
        options,
    )
    .expect("Failed to build session");
    session.connect().expect("Failed to connect");
    session
}

fn inbound_publish(payload: &[u8], message_id: Option<u16>) -> Vec<u8> {
    let topic = b"inTopic/libmqtt-bench";
    let mut body = Vec::new();
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic);
    if let Some(id) = message_id {
        body.extend_from_slice(&id.to_be_bytes());
    }
    body.extend_from_slice(payload);
    let header = if message_id.is_some() { 0x32 } else { 0x30 };
    let mut frame = vec![header, body.len() as u8];
    frame.extend(body);
    frame
}

pub fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = b"hello from publish";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish", |b| {
        let mut session = setup_session();
        b.iter(|| {
            session
                .publish("outTopic/libmqtt-bench", payload, false)
                .expect("Failed to publish");
        })
    });
    group.finish();
}

fn bench_poll(c: &mut Criterion, name: &str, message_id: Option<u16>) {
    let mut group = c.benchmark_group(name);
    let payload = br#"[{"header":"data","data":[{"pin":2,"value":1}]}]"#;
    let frame = inbound_publish(payload, message_id);
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function(name, |b| {
        b.iter_batched_ref(
            || {
                let mut session = setup_session();
                for _ in 0..50 {
                    session.transport_mut().rx.extend(frame.iter().copied());
                }
                session
            },
            |session| {
                for _ in 0..50 {
                    session.poll().expect("Failed to poll");
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_poll_qos0(c: &mut Criterion) {
    bench_poll(c, "poll_qos0", None);
}

pub fn bench_poll_qos1(c: &mut Criterion) {
    bench_poll(c, "poll_qos1", Some(1));
}
