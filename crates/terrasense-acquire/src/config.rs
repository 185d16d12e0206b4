//! Episode configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use terrasense_core::{SourceId, SourceRole};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected when an episode is set up.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `batch_size` is zero.
    ZeroBatchSize,
    /// `score_tolerance` is negative or not finite.
    InvalidTolerance {
        /// The invalid value.
        value: f64,
    },
    /// `min_improvement` is NaN.
    InvalidThreshold {
        /// The invalid value.
        value: f64,
    },
    /// The placement source is not registered.
    UnknownSource {
        /// The unknown source.
        source: SourceId,
    },
    /// The model was not built to use the placement source in `role`.
    PlacementRejected {
        /// The placement source.
        source: SourceId,
        /// Role the adapter does not accept it in.
        role: SourceRole,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBatchSize => write!(f, "batch_size must be at least 1"),
            Self::InvalidTolerance { value } => {
                write!(f, "score_tolerance must be finite and non-negative, got {value}")
            }
            Self::InvalidThreshold { value } => {
                write!(f, "min_improvement must be a number, got {value}")
            }
            Self::UnknownSource { source } => {
                write!(f, "placement source {source} is not registered")
            }
            Self::PlacementRejected { source, role } => {
                write!(f, "model does not accept placement source {source} as {role}")
            }
        }
    }
}

impl Error for ConfigError {}

// ── EpisodeConfig ──────────────────────────────────────────────────

/// Settings of one placement episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Source new sensors are added to. It must be both a context and a
    /// target source of the model.
    pub placement_source: SourceId,
    /// Candidates selected per epoch. Default: 1.
    pub batch_size: usize,
    /// Stop after this many placements. `None` = until the pool is empty.
    #[serde(default)]
    pub max_placements: Option<usize>,
    /// Stop when the best score falls below this. Default: 0.0.
    pub min_improvement: f64,
    /// Scores within this distance of the best tie; ties go to the
    /// lowest pool index. Default: 1e-12.
    pub score_tolerance: f64,
    /// Caller's epoch budget. `None` = unbounded.
    #[serde(default)]
    pub max_epochs: Option<u32>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            placement_source: SourceId(0),
            batch_size: 1,
            max_placements: None,
            min_improvement: 0.0,
            score_tolerance: 1e-12,
            max_epochs: None,
        }
    }
}

impl EpisodeConfig {
    /// Validate the numeric settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.score_tolerance.is_finite() || self.score_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance {
                value: self.score_tolerance,
            });
        }
        if self.min_improvement.is_nan() {
            return Err(ConfigError::InvalidThreshold {
                value: self.min_improvement,
            });
        }
        Ok(())
    }
}
