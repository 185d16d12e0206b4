//! Cross-crate properties exercised through the facade.

use std::sync::Arc;

use proptest::prelude::*;
use smallvec::smallvec;
use terrasense::prelude::*;
use terrasense::replay::{record_episode, replay_and_compare, BuildMetadata, ReplayReader};
use terrasense_test_utils::fixtures::{self, World};
use terrasense_test_utils::{MeanOfContextBackend, ScriptedVarianceBackend};

// ── Helpers ─────────────────────────────────────────────────────────

fn loader(world: &World) -> TaskLoader {
    TaskLoader::new(
        Arc::clone(&world.registry),
        Arc::clone(&world.index),
        Arc::clone(&world.params),
        LoaderConfig::default(),
    )
    .unwrap()
}

fn adapter<B: Backend>(world: &World, backend: B) -> ModelAdapter<B> {
    ModelAdapter::new(
        backend,
        AdapterConfig {
            context_sources: vec![world.stations, world.era],
            target_sources: vec![world.stations],
            context_floor: 0,
        },
        &world.registry,
        Arc::clone(&world.params),
    )
    .unwrap()
}

fn both_sources(world: &World, seed: u64) -> Task {
    loader(world)
        .build_task(
            TimeQuery::At(Timestamp(0)),
            &[
                (world.stations, SamplingPolicy::All),
                (
                    world.era,
                    SamplingPolicy::Random {
                        amount: Amount::Count(6),
                        seed,
                    },
                ),
            ],
            &[(world.stations, SamplingPolicy::All)],
        )
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn identical_requests_build_identical_tasks() {
    let world = fixtures::station_world();
    let a = both_sources(&world, 42);
    let b = both_sources(&world, 42);
    assert_eq!(a, b);
    assert_eq!(
        terrasense::replay::task_hash(&a),
        terrasense::replay::task_hash(&b)
    );
    assert_eq!(a.context()[1].observed_count(), 6);
}

#[test]
fn dropout_extremes() {
    let world = fixtures::station_world();
    let task = both_sources(&world, 1);
    let masker = MaskingSimulator::new(0);

    let none = masker
        .apply_mask(&task, &MaskPolicy::RandomDropout { rate: 0.0, seed: 3 })
        .unwrap();
    assert_eq!(none, task);

    let all = masker
        .apply_mask(&task, &MaskPolicy::RandomDropout { rate: 1.0, seed: 3 })
        .unwrap();
    assert_eq!(all.context_count(), 0);
    assert_eq!(all.targets(), task.targets());
}

#[test]
fn masked_task_still_predicts() {
    let world = fixtures::station_world();
    let task = both_sources(&world, 1);
    let masked = MaskingSimulator::new(2)
        .apply_mask(
            &task,
            &MaskPolicy::SourceDropout {
                sources: vec![world.stations, world.era],
            },
        )
        .unwrap();
    assert_eq!(masked.context_count(), 2);

    let dist = adapter(&world, MeanOfContextBackend::default())
        .predict(&masked)
        .unwrap();
    assert_eq!(dist.len(), task.target_count());
    for t in dist.targets() {
        for i in 0..t.len() {
            assert!((t.marginals.variance(i) - 1.0 / 3.0).abs() < 1e-12);
        }
    }
}

#[test]
fn normalization_survives_json() {
    let world = fixtures::station_world();
    let mut buf = Vec::new();
    world.params.save(&mut buf).unwrap();
    let loaded = NormalizationParams::load(buf.as_slice()).unwrap();
    assert_eq!(&loaded, world.params.as_ref());
}

#[test]
fn recorded_placement_episode_replays() {
    let world = fixtures::station_world();
    let candidates: Vec<Coord> = vec![
        smallvec![51.0, -5.0],
        smallvec![52.0, -4.0],
        smallvec![55.0, 1.0],
    ];
    let script = candidates
        .iter()
        .zip([0.5, 0.9, 0.9])
        .map(|(c, r)| (world.index.normalize(world.stations, c).unwrap(), r))
        .collect();
    let adapter = adapter(&world, ScriptedVarianceBackend::new(script));
    let spec = EpisodeSpec {
        task: fixtures::single_target_task(0.0),
        candidates,
        acquisition: AcquisitionFunction::VarianceReduction,
        config: EpisodeConfig {
            placement_source: world.stations,
            ..EpisodeConfig::default()
        },
    };

    let mut first =
        AcquisitionEngine::new(&adapter, &world.registry, &world.index, spec.clone()).unwrap();
    let log = record_episode(&mut first, &BuildMetadata::current(), Vec::new()).unwrap();
    assert_eq!(first.log().selected(), vec![1, 2, 0]);

    let mut second =
        AcquisitionEngine::new(&adapter, &world.registry, &world.index, spec).unwrap();
    let reader = ReplayReader::open(log.as_slice()).unwrap();
    assert_eq!(replay_and_compare(reader, &mut second).unwrap(), None);
    assert_eq!(second.log(), first.log());
}

proptest! {
    #[test]
    fn station_coordinates_roundtrip(lat in 50.0f64..=56.0, lon in -6.0f64..=2.0) {
        let world = fixtures::station_world();
        let raw: Coord = smallvec![lat, lon];
        let n = world.index.normalize(world.stations, &raw).unwrap();
        let back = world.index.denormalize(world.stations, &n).unwrap();
        prop_assert!((back[0] - lat).abs() < 1e-9);
        prop_assert!((back[1] - lon).abs() < 1e-9);
    }

    #[test]
    fn grid_coordinates_roundtrip(row in 0.0f64..=2.0, col in 0.0f64..=3.0) {
        let world = fixtures::station_world();
        let raw: Coord = smallvec![row, col];
        let n = world.index.normalize(world.era, &raw).unwrap();
        let back = world.index.denormalize(world.era, &n).unwrap();
        prop_assert!((back[0] - row).abs() < 1e-9);
        prop_assert!((back[1] - col).abs() < 1e-9);
    }
}
