//! Criterion micro-benchmarks for the episode log codec and task hashing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use terrasense_bench::dense_profile;
use terrasense_core::{TimeQuery, Timestamp};
use terrasense_loader::{LoaderConfig, SamplingPolicy, TaskLoader};
use terrasense_replay::codec::{decode_frame, encode_frame};
use terrasense_replay::{task_hash, Frame, FrameSelection};

fn make_frame(n: usize) -> Frame {
    Frame {
        epoch: 7,
        selections: (0..n)
            .map(|i| FrameSelection {
                candidate: i as u64,
                score: 1.0 / (i + 1) as f64,
            })
            .collect(),
        context_size: 1_000,
        task_hash: 0xDEAD_BEEF,
    }
}

/// Benchmark: encode a frame with 64 selections.
fn bench_encode_frame(c: &mut Criterion) {
    let frame = make_frame(64);
    let mut buf = Vec::with_capacity(2048);

    c.bench_function("encode_frame_64", |b| {
        b.iter(|| {
            buf.clear();
            encode_frame(&mut buf, &frame).unwrap();
            black_box(buf.len())
        });
    });
}

/// Benchmark: decode a frame with 64 selections.
fn bench_decode_frame(c: &mut Criterion) {
    let mut buf = Vec::new();
    encode_frame(&mut buf, &make_frame(64)).unwrap();

    c.bench_function("decode_frame_64", |b| {
        b.iter(|| black_box(decode_frame(&mut buf.as_slice()).unwrap()));
    });
}

/// Benchmark: hash a task holding every station and a full grid slice.
fn bench_task_hash(c: &mut Criterion) {
    let p = dense_profile(2_000, 50, 50, 1);
    let loader = TaskLoader::new(
        p.registry.clone(),
        p.index.clone(),
        p.params.clone(),
        LoaderConfig::default(),
    )
    .unwrap();
    let task = loader
        .build_task(
            TimeQuery::At(Timestamp(0)),
            &[
                (p.stations, SamplingPolicy::All),
                (p.grid, SamplingPolicy::All),
            ],
            &[(p.stations, SamplingPolicy::GridStride(10))],
        )
        .unwrap();

    c.bench_function("task_hash_4500_points", |b| {
        b.iter(|| black_box(task_hash(&task)));
    });
}

criterion_group!(
    benches,
    bench_encode_frame,
    bench_decode_frame,
    bench_task_hash
);
criterion_main!(benches);
