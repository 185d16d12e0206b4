//! Error types for the terrasense pipeline.
//!
//! The four named conditions of the pipeline are plain structs so each
//! component boundary can return exactly the failure it detects:
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`CoordinateRangeError`] | spatial index | surfaced, never retried |
//! | [`EmptyTargetError`] | task loader | surfaced, never retried |
//! | [`IncompatibleSourceError`] | model adapter | fatal to the call |
//! | [`EmptyPoolError`] | candidate pool | ends the episode normally |
//!
//! Subsystem enums ([`TaskError`], [`ModelError`], ...) wrap them
//! together with the remaining validation failures of each stage.

use std::error::Error;
use std::fmt;

use crate::id::{Coord, SourceId, Timestamp};

// ── Named errors ────────────────────────────────────────────────

/// A raw coordinate lies outside its source's declared valid domain.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateRangeError {
    /// Source whose domain was violated.
    pub source: SourceId,
    /// The offending raw coordinate.
    pub coord: Coord,
    /// Human-readable description of the valid domain.
    pub bounds: String,
}

impl fmt::Display for CoordinateRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "coordinate {:?} outside domain of source {}: {}",
            self.coord.as_slice(),
            self.source,
            self.bounds
        )
    }
}

impl Error for CoordinateRangeError {}

/// A task request produced no target locations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmptyTargetError {
    /// Reference time of the rejected request.
    pub time: Timestamp,
}

impl fmt::Display for EmptyTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task at {} has no target points", self.time)
    }
}

impl Error for EmptyTargetError {}

/// Whether a source feeds the context or the target side of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceRole {
    /// Observations the model conditions on.
    Context,
    /// Locations the model predicts at.
    Target,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => write!(f, "context"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// A task references a source the model adapter was not configured for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncompatibleSourceError {
    /// The unexpected source.
    pub source: SourceId,
    /// Which side of the task referenced it.
    pub role: SourceRole,
}

impl fmt::Display for IncompatibleSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source {} is not a configured {} source of this model",
            self.source, self.role
        )
    }
}

impl Error for IncompatibleSourceError {}

/// Scoring was entered with no candidates left in the pool.
///
/// The acquisition engine treats this as the natural end of an episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmptyPoolError {
    /// Epoch at which the pool ran dry.
    pub epoch: u32,
}

impl fmt::Display for EmptyPoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate pool empty at epoch {}", self.epoch)
    }
}

impl Error for EmptyPoolError {}

// ── RegistryError ───────────────────────────────────────────────

/// Errors from registering observation sources.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    /// A source with this name is already registered.
    DuplicateSource {
        /// The duplicated name.
        name: String,
    },
    /// The source's data is inconsistent with its schema.
    InvalidData {
        /// Name of the offending source.
        name: String,
        /// What is wrong.
        reason: String,
    },
    /// The registry holds no sources.
    Empty,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSource { name } => write!(f, "source '{name}' already registered"),
            Self::InvalidData { name, reason } => {
                write!(f, "source '{name}' has invalid data: {reason}")
            }
            Self::Empty => write!(f, "no sources registered"),
        }
    }
}

impl Error for RegistryError {}

// ── NormError ───────────────────────────────────────────────────

/// Errors from building, loading, or applying normalization parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum NormError {
    /// No transform is registered for the variable.
    UnknownVariable {
        /// The missing variable name.
        name: String,
    },
    /// A transform parameter is unusable (zero scale, NaN, ...).
    InvalidParameter {
        /// Variable (or `"coords"`) the parameter belongs to.
        variable: String,
        /// What is wrong.
        reason: String,
    },
    /// The persisted record has an unsupported format version.
    UnsupportedVersion {
        /// Version found in the record.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
    /// The persisted record could not be read or written.
    Serialization {
        /// Underlying serializer message.
        reason: String,
    },
}

impl fmt::Display for NormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVariable { name } => {
                write!(f, "no normalization parameters for variable '{name}'")
            }
            Self::InvalidParameter { variable, reason } => {
                write!(f, "invalid normalization for '{variable}': {reason}")
            }
            Self::UnsupportedVersion { found, expected } => write!(
                f,
                "unsupported normalization record version {found} (expected {expected})"
            ),
            Self::Serialization { reason } => write!(f, "normalization record: {reason}"),
        }
    }
}

impl Error for NormError {}

// ── TaskError ───────────────────────────────────────────────────

/// Errors from constructing a [`Task`](crate::Task).
#[derive(Clone, Debug, PartialEq)]
pub enum TaskError {
    /// A requested or stored coordinate was outside its source domain.
    CoordinateRange(CoordinateRangeError),
    /// The target policies selected zero points.
    EmptyTarget(EmptyTargetError),
    /// A policy names a source that is not registered.
    UnknownSource {
        /// The unknown source.
        source: SourceId,
    },
    /// A sampling policy is malformed (`GridStride(0)`, bad fraction, ...).
    InvalidPolicy {
        /// Source the policy was attached to.
        source: SourceId,
        /// What is wrong.
        reason: String,
    },
    /// Values could not be normalized.
    Norm(NormError),
    /// Parallel arrays inside a context or target set disagree in length.
    Malformed {
        /// Description of the inconsistency.
        reason: String,
    },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoordinateRange(e) => write!(f, "{e}"),
            Self::EmptyTarget(e) => write!(f, "{e}"),
            Self::UnknownSource { source } => write!(f, "source {source} is not registered"),
            Self::InvalidPolicy { source, reason } => {
                write!(f, "invalid sampling policy for source {source}: {reason}")
            }
            Self::Norm(e) => write!(f, "{e}"),
            Self::Malformed { reason } => write!(f, "malformed task: {reason}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CoordinateRange(e) => Some(e),
            Self::EmptyTarget(e) => Some(e),
            Self::Norm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoordinateRangeError> for TaskError {
    fn from(e: CoordinateRangeError) -> Self {
        Self::CoordinateRange(e)
    }
}

impl From<EmptyTargetError> for TaskError {
    fn from(e: EmptyTargetError) -> Self {
        Self::EmptyTarget(e)
    }
}

impl From<NormError> for TaskError {
    fn from(e: NormError) -> Self {
        Self::Norm(e)
    }
}

// ── ModelError ──────────────────────────────────────────────────

/// Errors from the model adapter and the wrapped backend.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    /// The task references a source the adapter does not know.
    IncompatibleSource(IncompatibleSourceError),
    /// The backend returned a different number of predictions than
    /// there are target locations.
    ShapeMismatch {
        /// Index of the target set within the task.
        target_set: usize,
        /// Number of target locations in the task.
        expected: usize,
        /// Number of predictions returned.
        found: usize,
    },
    /// The backend returned a negative or non-finite variance.
    InvalidVariance {
        /// Index of the target set within the task.
        target_set: usize,
        /// Index of the target within the set.
        index: usize,
    },
    /// The wrapped trainable function failed.
    Backend {
        /// Backend-provided description.
        reason: String,
    },
    /// A training step produced a NaN or infinite loss.
    NonFiniteLoss {
        /// Epoch of the failing step (0-based).
        epoch: usize,
        /// Batch of the failing step (0-based).
        batch: usize,
    },
    /// `fit` was called without any tasks.
    NoTasks,
    /// Adapter or training configuration was rejected.
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompatibleSource(e) => write!(f, "{e}"),
            Self::ShapeMismatch {
                target_set,
                expected,
                found,
            } => write!(
                f,
                "target set {target_set}: expected {expected} predictions, backend returned {found}"
            ),
            Self::InvalidVariance { target_set, index } => write!(
                f,
                "target set {target_set}: invalid variance at target {index}"
            ),
            Self::Backend { reason } => write!(f, "backend failed: {reason}"),
            Self::NonFiniteLoss { epoch, batch } => {
                write!(f, "non-finite loss at epoch {epoch}, batch {batch}")
            }
            Self::NoTasks => write!(f, "no tasks to train on"),
            Self::InvalidConfig { reason } => write!(f, "invalid model configuration: {reason}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IncompatibleSource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IncompatibleSourceError> for ModelError {
    fn from(e: IncompatibleSourceError) -> Self {
        Self::IncompatibleSource(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn coordinate_range_display_names_source_and_bounds() {
        let e = CoordinateRangeError {
            source: SourceId(2),
            coord: smallvec![91.0, 0.0],
            bounds: "[-90, 90] x [-180, 180]".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("source 2"));
        assert!(msg.contains("[-90, 90]"));
    }

    #[test]
    fn task_error_chains_source() {
        let e = TaskError::from(EmptyTargetError { time: Timestamp(5) });
        assert!(e.source().is_some());
        assert_eq!(e.to_string(), "task at t=5 has no target points");
    }

    #[test]
    fn model_error_wraps_incompatible_source() {
        let e: ModelError = IncompatibleSourceError {
            source: SourceId(7),
            role: SourceRole::Target,
        }
        .into();
        assert!(e.to_string().contains("target source"));
        assert!(matches!(e, ModelError::IncompatibleSource(_)));
    }
}
