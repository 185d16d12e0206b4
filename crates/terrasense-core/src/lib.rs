//! Core types and errors for the terrasense observation pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the data model shared by every stage of the pipeline: source ids and
//! schemas, the [`Task`] passed to a model, the [`PredictiveDistribution`]
//! it returns, the persisted [`NormalizationParams`], and the error
//! taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod distribution;
pub mod error;
pub mod id;
pub mod norm;
pub mod registry;
pub mod source;
pub mod task;

pub use distribution::{Marginals, PredictiveDistribution, TargetDistribution};
pub use error::{
    CoordinateRangeError, EmptyPoolError, EmptyTargetError, IncompatibleSourceError, ModelError,
    NormError, RegistryError, SourceRole, TaskError,
};
pub use id::{Coord, SourceId, Timestamp};
pub use norm::{
    NormalizationBuilder, NormalizationParams, ReferenceBounds, TransformKind, VariableTransform,
};
pub use registry::{RegistryBuilder, SourceRegistry};
pub use source::{
    CoordinateReference, Domain, GridAxes, GriddedArray, MissingValue, ObservationSource,
    PointRecord, Resolution, SourceData, SourceSchema, SPATIAL_NDIM,
};
pub use task::{ContextSet, Layout, TargetSet, Task, TimeQuery};
