//! Acquisition functions: how much a hypothetical sensor is worth.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Variance floor inside the log-ratio of [`AcquisitionFunction::MutualInformation`].
const LOG_EPS: f64 = 1e-12;

/// Scores a candidate from target variances without and with it.
///
/// All variants are monotone in variance reduction: a candidate that
/// shrinks every target variance more scores higher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionFunction {
    /// Mean drop in target variance.
    #[default]
    VarianceReduction,
    /// Mean drop in target standard deviation.
    StddevReduction,
    /// Gaussian mutual-information proxy, `½·mean(ln(v_base / v_aug))`.
    MutualInformation,
}

impl AcquisitionFunction {
    /// Stable name, used in episode logs and replay headers.
    pub fn name(self) -> &'static str {
        match self {
            Self::VarianceReduction => "variance_reduction",
            Self::StddevReduction => "stddev_reduction",
            Self::MutualInformation => "mutual_information",
        }
    }

    /// Inverse of [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::VarianceReduction,
            Self::StddevReduction,
            Self::MutualInformation,
        ]
        .into_iter()
        .find(|f| f.name() == name)
    }

    /// Score from index-aligned baseline and augmented target variances.
    ///
    /// Returns 0 for empty input.
    pub fn score(self, baseline: &[f64], augmented: &[f64]) -> f64 {
        let n = baseline.len().min(augmented.len());
        if n == 0 {
            return 0.0;
        }
        let pairs = baseline.iter().zip(augmented);
        let total: f64 = match self {
            Self::VarianceReduction => pairs.map(|(b, a)| b - a).sum(),
            Self::StddevReduction => pairs.map(|(b, a)| b.max(0.0).sqrt() - a.max(0.0).sqrt()).sum(),
            Self::MutualInformation => pairs
                .map(|(b, a)| ((b + LOG_EPS) / (a + LOG_EPS)).ln())
                .sum::<f64>()
                * 0.5,
        };
        total / n as f64
    }
}

impl fmt::Display for AcquisitionFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [AcquisitionFunction; 3] = [
        AcquisitionFunction::VarianceReduction,
        AcquisitionFunction::StddevReduction,
        AcquisitionFunction::MutualInformation,
    ];

    #[test]
    fn variance_reduction_is_mean_drop() {
        let s = AcquisitionFunction::VarianceReduction.score(&[1.0, 0.5], &[0.5, 0.5]);
        assert_eq!(s, 0.25);
    }

    #[test]
    fn stddev_reduction() {
        let s = AcquisitionFunction::StddevReduction.score(&[4.0], &[1.0]);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn mutual_information_halves_log_ratio() {
        let s = AcquisitionFunction::MutualInformation.score(&[1.0], &[0.25]);
        assert!((s - 0.5 * 4.0f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn names_round_trip() {
        for f in ALL {
            assert_eq!(AcquisitionFunction::from_name(f.name()), Some(f));
        }
        assert_eq!(AcquisitionFunction::from_name("entropy"), None);
    }

    #[test]
    fn empty_input_scores_zero() {
        for f in ALL {
            assert_eq!(f.score(&[], &[]), 0.0);
        }
    }

    proptest! {
        #[test]
        fn larger_reduction_scores_higher(
            base in 0.01f64..10.0,
            small in 0.0f64..0.5,
            extra in 0.01f64..0.5,
        ) {
            let weak = base * (1.0 - small);
            let strong = base * (1.0 - small - extra).max(0.0);
            for f in ALL {
                prop_assert!(f.score(&[base], &[strong]) > f.score(&[base], &[weak]));
            }
        }
    }
}
