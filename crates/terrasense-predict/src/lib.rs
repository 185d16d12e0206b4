//! Turning normalized model output back into physical units.
//!
//! An [`Aggregator`] holds the same normalization parameters and spatial
//! index the loader used, so [`Aggregator::to_physical`] is the exact
//! inverse of task construction: coordinates return to each source's
//! native reference, means and variances to the variable's physical
//! units. When several target sets predict the same variable at the same
//! location, [`Aggregator::merge_overlapping`] combines them under the
//! aggregator's [`MergePolicy`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod aggregator;
pub mod config;
pub mod error;

pub use aggregator::{
    Aggregator, MergedEstimate, PhysicalPoint, PhysicalPrediction, PhysicalTargetSet,
};
pub use config::{AggregatorConfig, ConfigError, MergePolicy};
pub use error::AggregateError;
