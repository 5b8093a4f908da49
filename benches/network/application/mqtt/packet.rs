use criterion::{Criterion, Throughput};
use std::hint::black_box;
use libmqtt::network::application::mqtt::packet::{
    FrameBuffer, MAX_LENGTH_BYTES, decode_remaining_length, encode_remaining_length,
};
use libmqtt::network::application::mqtt::Error;

pub fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");
    for value in [64usize, 16_000, 2_000_000, 268_435_455] {
        group.bench_function(format!("round_trip_{}", value), |b| {
            b.iter(|| {
                let mut out = [0u8; MAX_LENGTH_BYTES];
                let count = encode_remaining_length(black_box(value), &mut out)
                    .expect("Failed to encode");
                let mut bytes = out[..count].iter();
                decode_remaining_length(|| bytes.next().copied().ok_or(Error::Timeout))
                    .expect("Failed to decode")
            })
        });
    }
    group.finish();
}

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    let payload = [0x42u8; 200];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("encode_publish_200", |b| {
        let mut buffer = FrameBuffer::<256>::new();
        b.iter(|| {
            buffer
                .encode_publish(black_box("outTopic/bench-device"), &payload, false)
                .expect("Failed to encode")
                .len()
        })
    });
    group.finish();
}
