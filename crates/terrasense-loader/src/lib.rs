//! Task construction and context masking.
//!
//! The [`TaskLoader`] slices every registered source at a requested time,
//! applies a [`SamplingPolicy`] per source, and normalizes coordinates,
//! values and time offsets into a [`Task`](terrasense_core::Task). The
//! [`MaskingSimulator`] then hides context observations to emulate
//! sensor outages during training and evaluation.
//!
//! Both are stateless beyond the immutable registry, spatial index and
//! normalization parameters they hold behind `Arc`s, so one loader can
//! serve many threads; [`TaskLoader::build_tasks_par`] does exactly that.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod loader;
pub mod mask;
pub mod policy;

pub use config::{ConfigError, LoaderConfig};
pub use loader::{TaskLoader, TaskRequest};
pub use mask::{MaskError, MaskPolicy, MaskingSimulator};
pub use policy::{Amount, SamplingPolicy};
