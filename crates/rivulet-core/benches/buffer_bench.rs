//! Criterion benchmarks for the buffer hot paths used every engine cycle.
//!
//! - **Mix**: `add_weighted` into a shared accumulator (N:1 sink mixing)
//! - **Assign**: fan-out of a shared input into chain buffers
//! - **Resample**: streaming rate conversion at common ratios
//! - **Encode**: interleaved 16-bit PCM conversion
//!
//! Run with: `cargo bench -p rivulet-core`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rivulet_core::{AudioBuffer, Endianness, SampleFormat};

const SAMPLE_RATE: u32 = 48_000;
const BUFFER_SIZES: &[usize] = &[64, 256, 1024, 4096];

fn noise(channels: usize, len: usize) -> AudioBuffer {
    let mut seed = 0x2545_f491_u32;
    let data = (0..channels)
        .map(|_| {
            (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 17;
                    seed ^= seed << 5;
                    (seed as f32 / u32::MAX as f32) * 2.0 - 1.0
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_channels(data, SAMPLE_RATE)
}

fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer/mix");
    for &size in BUFFER_SIZES {
        let sources: Vec<_> = (0..4).map(|_| noise(2, size)).collect();
        let mut acc = AudioBuffer::with_capacity(2, size, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::new("add_weighted_x4", size), &size, |b, _| {
            b.iter(|| {
                acc.resize(0);
                for src in &sources {
                    acc.add_weighted(black_box(src), sources.len());
                }
                black_box(acc.len())
            });
        });
    }
    group.finish();
}

fn bench_assign(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer/assign");
    for &size in BUFFER_SIZES {
        let src = noise(2, size);
        let mut dst = AudioBuffer::with_capacity(2, size, SAMPLE_RATE);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| dst.assign(black_box(&src)));
        });
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer/resample");
    for (from, to) in [(44_100_u32, 48_000_u32), (48_000, 22_050)] {
        let src = noise(2, 1024);
        let mut buf = AudioBuffer::with_capacity(2, 2048, from);
        group.bench_function(format!("{from}_to_{to}"), |b| {
            b.iter(|| {
                buf.assign(&src);
                buf.set_sample_rate(from);
                buf.resample_to(to);
                black_box(buf.len())
            });
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let src = noise(2, 1024);
    let mut out = Vec::new();
    c.bench_function("buffer/encode_s16_le_1024", |b| {
        b.iter(|| {
            src.encode_to(&mut out, SampleFormat::S16(Endianness::Little))
                .unwrap();
            black_box(out.len())
        });
    });
}

criterion_group!(benches, bench_mix, bench_assign, bench_resample, bench_encode);
criterion_main!(benches);
