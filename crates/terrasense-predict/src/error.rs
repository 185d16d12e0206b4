//! Error type for aggregation.

use std::error::Error;
use std::fmt;

use terrasense_core::NormError;
use terrasense_space::SpaceError;

use crate::config::ConfigError;

/// Errors from converting or merging predictions.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateError {
    /// A predicted variable has no normalization entry.
    Norm(NormError),
    /// A target source is not covered by the spatial index.
    Space(SpaceError),
    /// The aggregator configuration is invalid.
    Config(ConfigError),
    /// Index, parameters and distribution do not share one normalization.
    Inconsistent {
        /// Description of the mismatch.
        reason: String,
    },
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Norm(e) => write!(f, "cannot unnormalize prediction: {e}"),
            Self::Space(e) => write!(f, "cannot map prediction coordinates: {e}"),
            Self::Config(e) => write!(f, "invalid aggregator configuration: {e}"),
            Self::Inconsistent { reason } => write!(f, "inconsistent normalization: {reason}"),
        }
    }
}

impl Error for AggregateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Norm(e) => Some(e),
            Self::Space(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Inconsistent { .. } => None,
        }
    }
}

impl From<NormError> for AggregateError {
    fn from(e: NormError) -> Self {
        Self::Norm(e)
    }
}

impl From<SpaceError> for AggregateError {
    fn from(e: SpaceError) -> Self {
        Self::Space(e)
    }
}

impl From<ConfigError> for AggregateError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
