//! Loader configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use terrasense_core::{SourceId, SourceRegistry};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`LoaderConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A per-source tolerance names a source that is not registered.
    UnknownSource {
        /// The unknown source.
        source: SourceId,
    },
    /// The registry, index and normalization parameters disagree.
    Inconsistent {
        /// Description of the mismatch.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSource { source } => {
                write!(f, "time tolerance given for unregistered source {source}")
            }
            Self::Inconsistent { reason } => write!(f, "inconsistent loader inputs: {reason}"),
        }
    }
}

impl Error for ConfigError {}

// ── LoaderConfig ───────────────────────────────────────────────────

/// How far from the requested time a source may still contribute.
///
/// A source with no timestamp within its tolerance contributes an empty
/// context set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Tolerance in seconds for sources without an override. Default: 0
    /// (exact match only).
    pub default_tolerance_secs: u64,
    /// Per-source overrides.
    #[serde(default)]
    pub tolerance_secs: IndexMap<SourceId, u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_tolerance_secs: 0,
            tolerance_secs: IndexMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Same tolerance for every source.
    pub fn with_tolerance(secs: u64) -> Self {
        Self {
            default_tolerance_secs: secs,
            ..Self::default()
        }
    }

    /// Tolerance for `source`.
    pub fn tolerance(&self, source: SourceId) -> u64 {
        self.tolerance_secs
            .get(&source)
            .copied()
            .unwrap_or(self.default_tolerance_secs)
    }

    /// Check every override refers to a registered source.
    pub fn validate(&self, registry: &SourceRegistry) -> Result<(), ConfigError> {
        for &source in self.tolerance_secs.keys() {
            if registry.get(source).is_none() {
                return Err(ConfigError::UnknownSource { source });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrasense_test_utils::fixtures;

    #[test]
    fn override_takes_precedence() {
        let mut c = LoaderConfig::with_tolerance(60);
        c.tolerance_secs.insert(SourceId(1), 3600);
        assert_eq!(c.tolerance(SourceId(0)), 60);
        assert_eq!(c.tolerance(SourceId(1)), 3600);
    }

    #[test]
    fn unknown_override_rejected() {
        let world = fixtures::station_world();
        let mut c = LoaderConfig::default();
        c.tolerance_secs.insert(SourceId(42), 1);
        assert_eq!(
            c.validate(&world.registry),
            Err(ConfigError::UnknownSource {
                source: SourceId(42)
            })
        );
    }

    #[test]
    fn json_round_trip() {
        let mut c = LoaderConfig::with_tolerance(900);
        c.tolerance_secs.insert(SourceId(0), 10);
        let json = serde_json::to_string(&c).unwrap();
        let back: LoaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
