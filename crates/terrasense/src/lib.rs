//! terrasense: multi-source environmental tasks, probabilistic prediction
//! and active sensor placement.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all terrasense sub-crates. For most users, adding `terrasense` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use terrasense::prelude::*;
//!
//! // A model that knows nothing: zero mean, unit variance everywhere.
//! struct Prior;
//! impl Backend for Prior {
//!     fn name(&self) -> &str { "prior" }
//!     fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
//!         Ok((0..batch.batch())
//!             .map(|b| {
//!                 let n = batch.target_count(b);
//!                 BackendOutput::Gaussian { mean: vec![0.0; n], variance: vec![1.0; n] }
//!             })
//!             .collect())
//!     }
//!     fn train_step(&mut self, _: &TensorBatch, _: f64) -> Result<f64, ModelError> {
//!         Ok(0.0)
//!     }
//! }
//!
//! // One station source with two temperature readings.
//! let schema = SourceSchema {
//!     name: "stations".into(),
//!     variable: "t2m".into(),
//!     reference: CoordinateReference::Geographic,
//!     resolution: Resolution::Irregular,
//!     missing: MissingValue::Nan,
//!     domain: Domain::new_2d([50.0, -6.0], [56.0, 2.0]),
//! };
//! let records = vec![
//!     PointRecord::new([51.0, -5.0], Timestamp(0), 12.0),
//!     PointRecord::new([55.0, 1.0], Timestamp(0), 8.0),
//! ];
//! let mut builder = SourceRegistry::builder();
//! let stations = builder
//!     .register(ObservationSource::new(schema, SourceData::Points(records)).unwrap())
//!     .unwrap();
//! let registry = Arc::new(builder.build().unwrap());
//!
//! // Shared frame and normalization.
//! let bounds = SpatialIndex::fit_bounds(&registry).unwrap();
//! let t2m = VariableTransform::new(TransformKind::MeanStd, 5.0, 10.0).unwrap();
//! let params = Arc::new(
//!     NormalizationParams::builder(bounds.clone()).transform("t2m", t2m).build().unwrap(),
//! );
//! let index = Arc::new(SpatialIndex::new(&registry, bounds, TimeAxis::default()).unwrap());
//!
//! // Build a task, predict, and convert back to degrees.
//! let loader = TaskLoader::new(
//!     registry.clone(), index.clone(), params.clone(), LoaderConfig::default(),
//! ).unwrap();
//! let task = loader
//!     .build_task(
//!         TimeQuery::At(Timestamp(0)),
//!         &[(stations, SamplingPolicy::All)],
//!         &[(stations, SamplingPolicy::Fixed(vec![smallvec::smallvec![53.0, -2.0]]))],
//!     )
//!     .unwrap();
//! let adapter = ModelAdapter::new(
//!     Prior,
//!     AdapterConfig {
//!         context_sources: vec![stations],
//!         target_sources: vec![stations],
//!         context_floor: 0,
//!     },
//!     &registry,
//!     params.clone(),
//! )
//! .unwrap();
//! let dist = adapter.predict(&task).unwrap();
//! let aggregator = Aggregator::new(params, index, AggregatorConfig::default()).unwrap();
//! let physical = aggregator.to_physical(&dist).unwrap();
//! let point = &physical.sets[0].points[0];
//! assert_eq!(point.mean, 10.0);
//! assert_eq!(point.variance, 25.0);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `terrasense-core` | IDs, sources, registry, tasks, normalization, distributions |
//! | [`space`] | `terrasense-space` | Shared frame, coordinate references, time axis |
//! | [`loader`] | `terrasense-loader` | Sampling policies, task building, masking |
//! | [`model`] | `terrasense-model` | Backend trait, tensor batches, adapter, trainer |
//! | [`predict`] | `terrasense-predict` | Physical-unit predictions and overlap merging |
//! | [`acquire`] | `terrasense-acquire` | Acquisition functions and placement episodes |
//! | [`replay`] | `terrasense-replay` | Episode recording and replay verification |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs, sources, and tasks (`terrasense-core`).
///
/// Contains [`types::SourceRegistry`], [`types::Task`],
/// [`types::NormalizationParams`] and [`types::PredictiveDistribution`].
pub use terrasense_core as types;

/// Shared spatial frame (`terrasense-space`).
///
/// [`space::SpatialIndex`] maps each source's native coordinates into
/// the normalized frame and back.
pub use terrasense_space as space;

/// Task building (`terrasense-loader`).
///
/// [`loader::TaskLoader`] turns per-source [`loader::SamplingPolicy`]s
/// into tasks; [`loader::MaskingSimulator`] hides context for
/// robustness experiments.
pub use terrasense_loader as loader;

/// Model integration (`terrasense-model`).
///
/// Implement [`model::Backend`] and wrap it in a
/// [`model::ModelAdapter`]; train it with [`model::Trainer`].
pub use terrasense_model as model;

/// Prediction post-processing (`terrasense-predict`).
///
/// [`predict::Aggregator`] converts predictive distributions into
/// physical units and merges overlapping estimates.
pub use terrasense_predict as predict;

/// Active sensor placement (`terrasense-acquire`).
///
/// [`acquire::AcquisitionEngine`] runs one placement episode;
/// [`acquire::run_episodes_par`] runs many.
pub use terrasense_acquire as acquire;

/// Episode recording and replay (`terrasense-replay`).
///
/// Record an episode with [`replay::record_episode`] and verify a re-run
/// with [`replay::replay_and_compare`].
pub use terrasense_replay as replay;

/// Common imports for typical terrasense usage.
///
/// ```rust
/// use terrasense::prelude::*;
/// ```
///
/// This imports the types needed to register sources, build tasks, run a
/// model, and place sensors.
pub mod prelude {
    // Core types
    pub use terrasense_core::{
        Coord, CoordinateReference, Domain, GridAxes, GriddedArray, MissingValue,
        NormalizationParams, ObservationSource, PointRecord, PredictiveDistribution, Resolution,
        SourceData, SourceId, SourceRegistry, SourceSchema, Task, TimeQuery, Timestamp,
        TransformKind, VariableTransform,
    };

    // Errors
    pub use terrasense_core::{ModelError, NormError, RegistryError, TaskError};

    // Space
    pub use terrasense_space::{SpatialIndex, TimeAxis};

    // Loader
    pub use terrasense_loader::{
        Amount, LoaderConfig, MaskPolicy, MaskingSimulator, SamplingPolicy, TaskLoader,
        TaskRequest,
    };

    // Model
    pub use terrasense_model::{
        AdapterConfig, Backend, BackendOutput, ModelAdapter, TensorBatch, TrainConfig, Trainer,
    };

    // Prediction
    pub use terrasense_predict::{Aggregator, AggregatorConfig, MergePolicy, PhysicalPrediction};

    // Acquisition
    pub use terrasense_acquire::{
        AcquisitionEngine, AcquisitionFunction, EpisodeConfig, EpisodeLog, EpisodeSpec, Phase,
    };
}
