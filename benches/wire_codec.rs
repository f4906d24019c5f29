//! Benchmarks for the wire codec and control laws
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use telemetry_pipeline::scripting::{builtins, ScriptLaw};
use telemetry_pipeline::wire::{decode, encode, WireMessage};
use telemetry_pipeline::{ActuatorState, ControlLaw};

fn sample_message(seqnum: u32) -> WireMessage {
    WireMessage::actuator_state(
        seqnum,
        ActuatorState {
            sample: -128,
            command: 128,
        },
    )
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_codec");
    group.throughput(Throughput::Elements(1));

    let msg = sample_message(42);
    group.bench_function("encode", |b| b.iter(|| encode(black_box(&msg))));

    let buf = encode(&msg);
    group.bench_function("decode", |b| b.iter(|| decode(black_box(&buf))));

    let bad = [0u8; 11];
    group.bench_function("decode_bad_magic", |b| b.iter(|| decode(black_box(&bad))));

    group.finish();
}

fn bench_sine_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("sine_stream");

    for size in [1usize, 64, 256].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), size, |b, &size| {
            b.iter(|| {
                for seq in 1..=size as u32 {
                    black_box(encode(&sample_message(seq)));
                }
            })
        });
    }

    group.finish();
}

fn bench_control_laws(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_law");

    let invert = ControlLaw::Invert;
    group.bench_function("invert", |b| b.iter(|| invert.apply(black_box(-1234))));

    for (name, source) in builtins::all() {
        if let Ok(law) = ScriptLaw::compile(source) {
            group.bench_function(name, |b| b.iter(|| law.eval(black_box(-1234))));
        }
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_sine_stream, bench_control_laws);
criterion_main!(benches);
