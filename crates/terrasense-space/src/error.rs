//! Error types for spatial index operations.

use std::fmt;

use terrasense_core::{CoordinateRangeError, SourceId, TaskError};

/// Errors arising from index construction or coordinate mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum SpaceError {
    /// A raw coordinate is outside its source's declared domain.
    CoordinateRange(CoordinateRangeError),
    /// The source is not part of this index.
    UnknownSource {
        /// The unknown source.
        source: SourceId,
    },
    /// A source's coordinate reference cannot be inverted.
    InvalidReference {
        /// The offending source.
        source: SourceId,
        /// What is wrong.
        reason: String,
    },
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoordinateRange(e) => write!(f, "{e}"),
            Self::UnknownSource { source } => write!(f, "source {source} is not indexed"),
            Self::InvalidReference { source, reason } => {
                write!(f, "invalid coordinate reference for source {source}: {reason}")
            }
        }
    }
}

impl std::error::Error for SpaceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CoordinateRange(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoordinateRangeError> for SpaceError {
    fn from(e: CoordinateRangeError) -> Self {
        Self::CoordinateRange(e)
    }
}

impl From<SpaceError> for TaskError {
    fn from(e: SpaceError) -> Self {
        match e {
            SpaceError::CoordinateRange(e) => TaskError::CoordinateRange(e),
            SpaceError::UnknownSource { source } => TaskError::UnknownSource { source },
            SpaceError::InvalidReference { source, reason } => TaskError::Malformed {
                reason: format!("source {source}: {reason}"),
            },
        }
    }
}
