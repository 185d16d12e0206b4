//! Criterion benchmarks for acquisition episodes.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use terrasense_acquire::{
    run_episodes_par, AcquisitionEngine, AcquisitionFunction, EpisodeConfig, EpisodeSpec,
};
use terrasense_bench::{dense_profile, scatter_coords, BenchProfile};
use terrasense_core::{TimeQuery, Timestamp};
use terrasense_loader::{Amount, LoaderConfig, SamplingPolicy, TaskLoader};
use terrasense_model::{AdapterConfig, ModelAdapter};
use terrasense_test_utils::MeanOfContextBackend;

fn spec(p: &BenchProfile, acquisition: AcquisitionFunction) -> EpisodeSpec {
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
            &[(
                p.stations,
                SamplingPolicy::Random {
                    amount: Amount::Count(200),
                    seed: 5,
                },
            )],
            &[(p.stations, SamplingPolicy::Fixed(scatter_coords(32, 17)))],
        )
        .unwrap();
    EpisodeSpec {
        task,
        candidates: scatter_coords(64, 23),
        acquisition,
        config: EpisodeConfig {
            placement_source: p.stations,
            batch_size: 4,
            max_epochs: Some(4),
            ..EpisodeConfig::default()
        },
    }
}

fn adapter(p: &BenchProfile) -> ModelAdapter<MeanOfContextBackend> {
    ModelAdapter::new(
        MeanOfContextBackend::default(),
        AdapterConfig {
            context_sources: vec![p.stations],
            target_sources: vec![p.stations],
            context_floor: 0,
        },
        &p.registry,
        p.params.clone(),
    )
    .unwrap()
}

/// Benchmark: four epochs of batch-4 selection over 64 candidates.
fn bench_episode(c: &mut Criterion) {
    let p = dense_profile(1_000, 10, 10, 1);
    let adapter = adapter(&p);
    let spec = spec(&p, AcquisitionFunction::VarianceReduction);

    c.bench_function("episode_64_candidates_4_epochs", |b| {
        b.iter(|| {
            let mut engine =
                AcquisitionEngine::new(&adapter, &p.registry, &p.index, spec.clone()).unwrap();
            engine.run().unwrap();
            black_box(engine.into_log())
        });
    });
}

/// Benchmark: one episode per acquisition function, run concurrently.
fn bench_episodes_par(c: &mut Criterion) {
    let p = dense_profile(1_000, 10, 10, 1);
    let adapter = adapter(&p);
    let specs: Vec<EpisodeSpec> = [
        AcquisitionFunction::VarianceReduction,
        AcquisitionFunction::StddevReduction,
        AcquisitionFunction::MutualInformation,
    ]
    .into_iter()
    .map(|a| spec(&p, a))
    .collect();

    c.bench_function("episodes_par_3_functions", |b| {
        b.iter(|| black_box(run_episodes_par(&adapter, &p.registry, &p.index, specs.clone())));
    });
}

criterion_group!(benches, bench_episode, bench_episodes_par);
criterion_main!(benches);
