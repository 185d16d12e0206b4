//! Per-source sampling policies.

use serde::{Deserialize, Serialize};
use terrasense_core::{Coord, SourceId, TaskError};

/// How many points a [`SamplingPolicy::Random`] draw keeps.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    /// At most this many points.
    Count(usize),
    /// This fraction of the available points, rounded to nearest.
    Fraction(f64),
}

impl Amount {
    /// Number of points to keep out of `available`.
    pub fn resolve(&self, available: usize) -> usize {
        match *self {
            Self::Count(n) => n.min(available),
            Self::Fraction(f) => ((available as f64) * f).round() as usize,
        }
    }
}

/// Which observations of a source enter a context or target set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SamplingPolicy {
    /// Every observation in the time slice.
    All,
    /// A seeded uniform subset without replacement.
    Random {
        /// Subset size.
        amount: Amount,
        /// RNG seed, mixed with the source id.
        seed: u64,
    },
    /// Every `k`-th cell along each grid axis, or every `k`-th record of
    /// a point source in canonical order.
    GridStride(usize),
    /// Explicit raw locations in the source's native frame.
    Fixed(Vec<Coord>),
}

impl SamplingPolicy {
    /// Reject malformed parameters before any data is touched.
    pub fn validate(&self, source: SourceId) -> Result<(), TaskError> {
        let invalid = |reason: String| Err(TaskError::InvalidPolicy { source, reason });
        match self {
            Self::GridStride(0) => invalid("grid stride must be at least 1".into()),
            Self::Random {
                amount: Amount::Fraction(f),
                ..
            } if !(0.0..=1.0).contains(f) => {
                invalid(format!("random fraction must be in [0, 1], got {f}"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_zero_is_invalid() {
        let err = SamplingPolicy::GridStride(0)
            .validate(SourceId(3))
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::InvalidPolicy {
                source: SourceId(3),
                ..
            }
        ));
    }

    #[test]
    fn fraction_bounds() {
        let p = |f| SamplingPolicy::Random {
            amount: Amount::Fraction(f),
            seed: 0,
        };
        assert!(p(0.5).validate(SourceId(0)).is_ok());
        assert!(p(1.5).validate(SourceId(0)).is_err());
        assert!(p(f64::NAN).validate(SourceId(0)).is_err());
    }

    #[test]
    fn amount_resolution() {
        assert_eq!(Amount::Count(10).resolve(4), 4);
        assert_eq!(Amount::Count(2).resolve(4), 2);
        assert_eq!(Amount::Fraction(0.5).resolve(5), 3);
        assert_eq!(Amount::Fraction(0.0).resolve(5), 0);
    }
}
