//! Aggregator configuration.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`AggregatorConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A quantile level is outside `[0, 1]` or NaN.
    InvalidQuantile {
        /// The offending level.
        level: f64,
    },
    /// Quantile levels are not strictly increasing.
    UnsortedQuantiles,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantile { level } => {
                write!(f, "quantile level must lie in [0, 1], got {level}")
            }
            Self::UnsortedQuantiles => write!(f, "quantile levels must be strictly increasing"),
        }
    }
}

impl Error for ConfigError {}

// ── MergePolicy ────────────────────────────────────────────────────

/// How co-located estimates of one variable are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Precision-weighted mean: `var = 1 / Σ(1/vᵢ)`, `mean = var · Σ(mᵢ/vᵢ)`.
    ///
    /// Members with zero variance dominate: the result is the mean of
    /// their means with variance 0.
    #[default]
    InverseVariance,
    /// Plain average of the means; variance of the average of
    /// independent estimates, `Σvᵢ / n²`.
    EqualWeight,
}

impl MergePolicy {
    /// Combine `(mean, variance)` pairs. `None` for an empty slice.
    pub fn merge(self, members: &[(f64, f64)]) -> Option<(f64, f64)> {
        if members.is_empty() {
            return None;
        }
        let n = members.len() as f64;
        match self {
            Self::EqualWeight => {
                let mean = members.iter().map(|(m, _)| m).sum::<f64>() / n;
                let var = members.iter().map(|(_, v)| v).sum::<f64>() / (n * n);
                Some((mean, var))
            }
            Self::InverseVariance => {
                let exact: Vec<f64> = members
                    .iter()
                    .filter(|(_, v)| *v == 0.0)
                    .map(|(m, _)| *m)
                    .collect();
                if !exact.is_empty() {
                    return Some((exact.iter().sum::<f64>() / exact.len() as f64, 0.0));
                }
                let precision: f64 = members.iter().map(|(_, v)| 1.0 / v).sum();
                let var = 1.0 / precision;
                let mean = var * members.iter().map(|(m, v)| m / v).sum::<f64>();
                Some((mean, var))
            }
        }
    }
}

// ── AggregatorConfig ───────────────────────────────────────────────

/// Construction-time settings of an [`Aggregator`](crate::Aggregator).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Overlap merge rule. Default: [`MergePolicy::InverseVariance`].
    #[serde(default)]
    pub merge: MergePolicy,
    /// Levels reported for sample-based predictions, strictly
    /// increasing in `[0, 1]`. Default: `[0.05, 0.5, 0.95]`.
    pub quantile_levels: Vec<f64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            merge: MergePolicy::InverseVariance,
            quantile_levels: vec![0.05, 0.5, 0.95],
        }
    }
}

impl AggregatorConfig {
    /// Validate all invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(&level) = self
            .quantile_levels
            .iter()
            .find(|l| !(0.0..=1.0).contains(*l))
        {
            return Err(ConfigError::InvalidQuantile { level });
        }
        if self.quantile_levels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::UnsortedQuantiles);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_variance_weights_by_precision() {
        let (m, v) = MergePolicy::InverseVariance
            .merge(&[(10.0, 1.0), (20.0, 4.0)])
            .unwrap();
        assert!((v - 0.8).abs() < 1e-12);
        assert!((m - 12.0).abs() < 1e-12);
    }

    #[test]
    fn zero_variance_members_dominate() {
        let merged = MergePolicy::InverseVariance
            .merge(&[(10.0, 0.0), (50.0, 1.0), (14.0, 0.0)])
            .unwrap();
        assert_eq!(merged, (12.0, 0.0));
    }

    #[test]
    fn equal_weight_averages() {
        let (m, v) = MergePolicy::EqualWeight
            .merge(&[(10.0, 1.0), (20.0, 3.0)])
            .unwrap();
        assert_eq!(m, 15.0);
        assert_eq!(v, 1.0);
    }

    #[test]
    fn single_member_is_unchanged() {
        for policy in [MergePolicy::InverseVariance, MergePolicy::EqualWeight] {
            assert_eq!(policy.merge(&[(3.0, 2.0)]), Some((3.0, 2.0)));
        }
        assert_eq!(MergePolicy::EqualWeight.merge(&[]), None);
    }

    #[test]
    fn quantile_levels_validated() {
        let mut c = AggregatorConfig::default();
        assert!(c.validate().is_ok());
        c.quantile_levels = vec![0.5, 1.5];
        assert_eq!(c.validate(), Err(ConfigError::InvalidQuantile { level: 1.5 }));
        c.quantile_levels = vec![0.5, 0.5];
        assert_eq!(c.validate(), Err(ConfigError::UnsortedQuantiles));
        c.quantile_levels = vec![f64::NAN];
        assert!(matches!(c.validate(), Err(ConfigError::InvalidQuantile { .. })));
    }

    #[test]
    fn merge_defaults_when_absent_from_json() {
        let c: AggregatorConfig = serde_json::from_str(r#"{"quantile_levels": [0.1, 0.9]}"#).unwrap();
        assert_eq!(c.merge, MergePolicy::InverseVariance);
    }
}
