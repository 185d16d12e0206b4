//! Adapter and training configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use terrasense_core::{ModelError, SourceId, SourceRegistry};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`AdapterConfig::validate()`] and
/// [`TrainConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The adapter has no target sources.
    NoTargetSources,
    /// A configured source is not registered.
    UnknownSource {
        /// The unknown source.
        source: SourceId,
    },
    /// `epochs` is zero.
    NoEpochs,
    /// `batch_size` is `Some(0)`.
    ZeroBatchSize,
    /// Learning rate is NaN, infinite, zero or negative.
    InvalidLearningRate {
        /// The invalid value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTargetSources => write!(f, "adapter needs at least one target source"),
            Self::UnknownSource { source } => {
                write!(f, "configured source {source} is not registered")
            }
            Self::NoEpochs => write!(f, "epochs must be at least 1"),
            Self::ZeroBatchSize => write!(f, "batch_size must be at least 1"),
            Self::InvalidLearningRate { value } => {
                write!(f, "learning_rate must be finite and positive, got {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for ModelError {
    fn from(e: ConfigError) -> Self {
        ModelError::InvalidConfig {
            reason: e.to_string(),
        }
    }
}

// ── AdapterConfig ──────────────────────────────────────────────────

/// Which sources a model was built for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Sources the model may condition on.
    pub context_sources: Vec<SourceId>,
    /// Sources the model may predict.
    pub target_sources: Vec<SourceId>,
    /// Minimum number of observed context points the model expects.
    /// Honoured by the masking simulator. Default: 0.
    #[serde(default)]
    pub context_floor: usize,
}

impl AdapterConfig {
    /// Check the sources exist.
    pub fn validate(&self, registry: &SourceRegistry) -> Result<(), ConfigError> {
        if self.target_sources.is_empty() {
            return Err(ConfigError::NoTargetSources);
        }
        for &source in self.context_sources.iter().chain(&self.target_sources) {
            if registry.get(source).is_none() {
                return Err(ConfigError::UnknownSource { source });
            }
        }
        Ok(())
    }
}

// ── TrainConfig ────────────────────────────────────────────────────

/// Hyperparameters of the training loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Passes over the task list. Default: 10.
    pub epochs: usize,
    /// Tasks per optimizer step; the remainder of each epoch is dropped.
    /// `None` = one task per step. Default: `None`.
    pub batch_size: Option<usize>,
    /// Learning rate passed to every step. Default: 5e-5.
    pub learning_rate: f64,
    /// Shuffle seed. Default: 0.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: None,
            learning_rate: 5e-5,
            seed: 0,
        }
    }
}

impl TrainConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::NoEpochs);
        }
        if self.batch_size == Some(0) {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::InvalidLearningRate {
                value: self.learning_rate,
            });
        }
        Ok(())
    }
}
