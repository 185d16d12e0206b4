//! Placement episodes against a scripted-variance model.

use smallvec::smallvec;
use terrasense_acquire::{
    run_episodes_par, AcquireError, AcquisitionEngine, AcquisitionFunction, ConfigError,
    EpisodeConfig, EpisodeSpec, Phase, TerminationReason,
};
use terrasense_core::{Coord, SourceRole, TaskError};
use terrasense_model::{AdapterConfig, ModelAdapter};
use terrasense_test_utils::fixtures::{self, World};
use terrasense_test_utils::ScriptedVarianceBackend;

// ── Helpers ─────────────────────────────────────────────────────────

/// Candidates A, B, C in native station coordinates.
fn candidates() -> Vec<Coord> {
    vec![
        smallvec![51.0, -5.0],
        smallvec![52.0, -4.0],
        smallvec![55.0, 1.0],
    ]
}

/// A model where placing A, B or C shrinks every target variance by
/// 50%, 90% and 90% respectively.
fn adapter(world: &World) -> ModelAdapter<ScriptedVarianceBackend> {
    let reductions = candidates()
        .iter()
        .zip([0.5, 0.9, 0.9])
        .map(|(c, r)| (world.index.normalize(world.stations, c).unwrap(), r))
        .collect();
    ModelAdapter::new(
        ScriptedVarianceBackend::new(reductions),
        AdapterConfig {
            context_sources: vec![world.stations],
            target_sources: vec![world.stations],
            context_floor: 0,
        },
        &world.registry,
        world.params.clone(),
    )
    .unwrap()
}

fn spec(world: &World, candidates: Vec<Coord>, config: EpisodeConfig) -> EpisodeSpec {
    EpisodeSpec {
        task: fixtures::single_target_task(0.0),
        candidates,
        acquisition: AcquisitionFunction::VarianceReduction,
        config: EpisodeConfig {
            placement_source: world.stations,
            ..config
        },
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn picks_b_then_rescores_a_and_c() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), EpisodeConfig::default()),
    )
    .unwrap();
    let log = engine.run().unwrap().clone();

    assert_eq!(log.initial_variance, Some(1.0));
    assert_eq!(log.selected(), vec![1, 2, 0]);
    assert_eq!(log.termination, Some(TerminationReason::PoolExhausted));

    let first = &log.score_tables[0];
    assert_eq!(first.scores.len(), 3);
    assert!((first.score_of(0).unwrap() - 0.5).abs() < 1e-12);
    assert!((first.score_of(1).unwrap() - 0.9).abs() < 1e-12);

    let second = &log.score_tables[1];
    assert_eq!(
        second.scores.iter().map(|&(i, _)| i).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert!((second.score_of(0).unwrap() - 0.05).abs() < 1e-12);
    assert!((second.score_of(2).unwrap() - 0.09).abs() < 1e-12);

    let r = &log.records[1];
    assert_eq!(r.epoch, 2);
    assert_eq!(r.context_size, 2);
    assert_eq!(r.coord.as_slice(), &[55.0, 1.0]);
    assert!((r.mean_variance - 0.01).abs() < 1e-12);
}

#[test]
fn empty_pool_terminates_without_error() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, vec![], EpisodeConfig::default()),
    )
    .unwrap();
    assert_eq!(engine.step().unwrap(), Phase::Scoring);
    assert_eq!(
        engine.step().unwrap(),
        Phase::Terminal(TerminationReason::PoolExhausted)
    );
    assert!(engine.log().is_empty());
    assert!(engine.log().score_tables.is_empty());
    // Terminal is absorbing.
    assert!(engine.step().unwrap().is_terminal());
}

#[test]
fn each_step_is_one_transition() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), EpisodeConfig::default()),
    )
    .unwrap();
    assert_eq!(engine.phase(), Phase::Initialized);
    assert_eq!(engine.step().unwrap(), Phase::Scoring);
    assert_eq!(engine.step().unwrap(), Phase::Selected);
    assert_eq!(engine.pending()[0].candidate, 1);
    assert_eq!(engine.task().context_count(), 0);
    assert_eq!(engine.step().unwrap(), Phase::Updated);
    assert_eq!(engine.task().context_count(), 1);
    assert_eq!(engine.pool().remaining(), &[0, 2]);
    assert!(engine.log().is_empty());
    assert_eq!(engine.step().unwrap(), Phase::Scoring);
    assert_eq!(engine.log().records.len(), 1);
    assert_eq!(engine.epoch(), 1);
}

#[test]
fn placement_budget_stops_episode() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let config = EpisodeConfig {
        max_placements: Some(1),
        ..EpisodeConfig::default()
    };
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), config),
    )
    .unwrap();
    let log = engine.run().unwrap();
    assert_eq!(log.selected(), vec![1]);
    assert_eq!(log.termination, Some(TerminationReason::PlacementBudget));
}

#[test]
fn epoch_budget_stops_episode() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let config = EpisodeConfig {
        max_epochs: Some(2),
        ..EpisodeConfig::default()
    };
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), config),
    )
    .unwrap();
    let log = engine.run().unwrap();
    assert_eq!(log.selected(), vec![1, 2]);
    assert_eq!(log.termination, Some(TerminationReason::EpochBudget));
}

#[test]
fn weak_candidates_stop_below_threshold() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let config = EpisodeConfig {
        min_improvement: 0.2,
        ..EpisodeConfig::default()
    };
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), config),
    )
    .unwrap();
    let log = engine.run().unwrap();
    assert_eq!(log.selected(), vec![1]);
    match log.termination {
        Some(TerminationReason::BelowThreshold { best }) => assert!((best - 0.09).abs() < 1e-12),
        other => panic!("unexpected termination {other:?}"),
    }
}

#[test]
fn batch_selection_places_top_k_together() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let config = EpisodeConfig {
        batch_size: 2,
        ..EpisodeConfig::default()
    };
    let mut engine = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), config),
    )
    .unwrap();
    let log = engine.run().unwrap();
    assert_eq!(log.selected(), vec![1, 2, 0]);
    assert_eq!(log.records[0].epoch, 1);
    assert_eq!(log.records[1].epoch, 1);
    assert_eq!(log.records[1].context_size, 2);
    assert_eq!(log.records[2].epoch, 2);
}

#[test]
fn resumed_episode_matches_uninterrupted_run() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let make = || {
        AcquisitionEngine::new(
            &adapter,
            &world.registry,
            &world.index,
            spec(&world, candidates(), EpisodeConfig::default()),
        )
        .unwrap()
    };

    let mut full = make();
    let expected = full.run().unwrap().clone();

    let mut partial = make();
    for _ in 0..3 {
        partial.step().unwrap();
    }
    let checkpoint = partial.checkpoint();
    assert_eq!(checkpoint.phase(), Phase::Updated);
    drop(partial);

    let mut resumed = AcquisitionEngine::resume(&adapter, checkpoint).unwrap();
    assert_eq!(resumed.run().unwrap(), &expected);
}

#[test]
fn parallel_episodes_match_sequential() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let specs: Vec<EpisodeSpec> = [
        AcquisitionFunction::VarianceReduction,
        AcquisitionFunction::StddevReduction,
        AcquisitionFunction::MutualInformation,
    ]
    .into_iter()
    .map(|acquisition| EpisodeSpec {
        acquisition,
        ..spec(&world, candidates(), EpisodeConfig::default())
    })
    .collect();

    let sequential: Vec<_> = specs
        .iter()
        .cloned()
        .map(|s| {
            let mut e = AcquisitionEngine::new(&adapter, &world.registry, &world.index, s).unwrap();
            e.run().unwrap();
            e.into_log()
        })
        .collect();
    let parallel: Vec<_> = run_episodes_par(&adapter, &world.registry, &world.index, specs)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(parallel, sequential);
    assert!(parallel.iter().all(|log| log.selected() == vec![1, 2, 0]));
}

#[test]
fn candidate_outside_domain_is_rejected() {
    let world = fixtures::station_world();
    let adapter = adapter(&world);
    let result = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, vec![smallvec![70.0, 0.0]], EpisodeConfig::default()),
    );
    assert!(matches!(
        result,
        Err(AcquireError::Task(TaskError::CoordinateRange(_)))
    ));
}

#[test]
fn placement_source_must_be_context_and_target() {
    let world = fixtures::station_world();
    let adapter = ModelAdapter::new(
        ScriptedVarianceBackend::new(vec![]),
        AdapterConfig {
            context_sources: vec![world.era],
            target_sources: vec![world.stations],
            context_floor: 0,
        },
        &world.registry,
        world.params.clone(),
    )
    .unwrap();
    let result = AcquisitionEngine::new(
        &adapter,
        &world.registry,
        &world.index,
        spec(&world, candidates(), EpisodeConfig::default()),
    );
    assert!(matches!(
        result,
        Err(AcquireError::Config(ConfigError::PlacementRejected {
            role: SourceRole::Context,
            ..
        }))
    ));
}
