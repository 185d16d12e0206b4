//! Error type for acquisition episodes.

use std::error::Error;
use std::fmt;

use terrasense_core::{ModelError, TaskError};
use terrasense_space::SpaceError;

use crate::config::ConfigError;

/// Errors that abort an episode.
///
/// An empty candidate pool is not among them: it ends the episode
/// normally in [`Phase::Terminal`](crate::Phase::Terminal).
#[derive(Clone, Debug, PartialEq)]
pub enum AcquireError {
    /// The model adapter rejected a task or its backend failed.
    Model(ModelError),
    /// A hypothetical task could not be built, or a candidate lies
    /// outside the placement source's domain.
    Task(TaskError),
    /// The episode is misconfigured.
    Config(ConfigError),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(e) => write!(f, "model: {e}"),
            Self::Task(e) => write!(f, "task: {e}"),
            Self::Config(e) => write!(f, "episode config: {e}"),
        }
    }
}

impl Error for AcquireError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(e) => Some(e),
            Self::Task(e) => Some(e),
            Self::Config(e) => Some(e),
        }
    }
}

impl From<ModelError> for AcquireError {
    fn from(e: ModelError) -> Self {
        Self::Model(e)
    }
}

impl From<TaskError> for AcquireError {
    fn from(e: TaskError) -> Self {
        Self::Task(e)
    }
}

impl From<SpaceError> for AcquireError {
    fn from(e: SpaceError) -> Self {
        Self::Task(e.into())
    }
}

impl From<ConfigError> for AcquireError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
