//! Model adapter for terrasense.
//!
//! The convolutional neural process itself is an opaque [`Backend`]: a
//! trainable function from a padded [`TensorBatch`] to per-target
//! predictive marginals. [`ModelAdapter`] owns the conversion between
//! variable-cardinality [`Task`](terrasense_core::Task)s and that padded
//! form, checks the backend's output shape against the task, and pairs
//! the result with the normalization parameters. [`Trainer`] runs the
//! epoch loop over a task list.
//!
//! Padding never leaks out of this crate: callers only see tasks and
//! [`PredictiveDistribution`](terrasense_core::PredictiveDistribution)s.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod backend;
pub mod config;
pub mod tensor;
pub mod trainer;

pub use adapter::ModelAdapter;
pub use backend::{Backend, BackendOutput};
pub use config::{AdapterConfig, ConfigError, TrainConfig};
pub use tensor::TensorBatch;
pub use trainer::{EpochReport, Trainer, TrainingReport};
