//! Predictive distributions returned by a model for a task's targets.

use std::sync::Arc;

use crate::error::ModelError;
use crate::id::{Coord, SourceId};
use crate::norm::NormalizationParams;
use crate::task::Task;

/// Per-target marginal predictions in normalized space.
#[derive(Clone, Debug, PartialEq)]
pub enum Marginals {
    /// Independent Gaussians.
    Gaussian {
        /// Mean per target.
        mean: Vec<f64>,
        /// Variance per target.
        variance: Vec<f64>,
    },
    /// An ensemble: `draws[s][i]` is sample `s` at target `i`.
    Samples {
        /// Sample draws.
        draws: Vec<Vec<f64>>,
    },
}

impl Marginals {
    /// Number of targets covered, or `None` if the arrays disagree.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Gaussian { mean, variance } => {
                (mean.len() == variance.len()).then_some(mean.len())
            }
            Self::Samples { draws } => {
                let n = draws.first().map_or(0, Vec::len);
                draws.iter().all(|d| d.len() == n).then_some(n)
            }
        }
    }

    /// Returns `true` if no targets are covered.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Mean at target `i`.
    pub fn mean(&self, i: usize) -> f64 {
        match self {
            Self::Gaussian { mean, .. } => mean[i],
            Self::Samples { draws } => {
                draws.iter().map(|d| d[i]).sum::<f64>() / draws.len() as f64
            }
        }
    }

    /// Variance at target `i` (population variance for samples).
    pub fn variance(&self, i: usize) -> f64 {
        match self {
            Self::Gaussian { variance, .. } => variance[i],
            Self::Samples { draws } => {
                let m = self.mean(i);
                draws.iter().map(|d| (d[i] - m).powi(2)).sum::<f64>() / draws.len() as f64
            }
        }
    }
}

/// Predictions for one target set.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDistribution {
    /// Target source.
    pub source: SourceId,
    /// Target variable.
    pub variable: String,
    /// Normalized target locations, in task order.
    pub coords: Vec<Coord>,
    /// Marginals, index-aligned with `coords`.
    pub marginals: Marginals,
}

impl TargetDistribution {
    /// Number of targets.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns `true` if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Mean of the per-target variances (0 for an empty set).
    pub fn mean_variance(&self) -> f64 {
        if self.coords.is_empty() {
            return 0.0;
        }
        (0..self.len()).map(|i| self.marginals.variance(i)).sum::<f64>() / self.len() as f64
    }
}

/// Model output for every target set of a task.
///
/// # Invariants
///
/// `targets[k]` corresponds to `task.targets()[k]` and has exactly as
/// many entries, in the same order.
#[derive(Clone, Debug)]
pub struct PredictiveDistribution {
    targets: Vec<TargetDistribution>,
    params: Arc<NormalizationParams>,
}

impl PredictiveDistribution {
    /// Pair backend marginals with the task they were computed for.
    ///
    /// # Errors
    ///
    /// [`ModelError::ShapeMismatch`] if the marginals do not line up with
    /// the task's target sets, [`ModelError::InvalidVariance`] for
    /// negative or non-finite Gaussian variances.
    pub fn new(
        task: &Task,
        marginals: Vec<Marginals>,
        params: Arc<NormalizationParams>,
    ) -> Result<Self, ModelError> {
        if marginals.len() != task.targets().len() {
            return Err(ModelError::ShapeMismatch {
                target_set: marginals.len().min(task.targets().len()),
                expected: task.targets().len(),
                found: marginals.len(),
            });
        }
        let mut targets = Vec::with_capacity(marginals.len());
        for (k, (set, m)) in task.targets().iter().zip(marginals).enumerate() {
            let found = m.len().unwrap_or(usize::MAX);
            if found != set.len() {
                return Err(ModelError::ShapeMismatch {
                    target_set: k,
                    expected: set.len(),
                    found,
                });
            }
            if let Marginals::Gaussian { variance, .. } = &m {
                if let Some(index) = variance.iter().position(|v| !v.is_finite() || *v < 0.0) {
                    return Err(ModelError::InvalidVariance {
                        target_set: k,
                        index,
                    });
                }
            }
            targets.push(TargetDistribution {
                source: set.source(),
                variable: set.variable().to_string(),
                coords: set.coords().to_vec(),
                marginals: m,
            });
        }
        Ok(Self { targets, params })
    }

    /// Per-target-set predictions.
    pub fn targets(&self) -> &[TargetDistribution] {
        &self.targets
    }

    /// Normalization parameters needed to return to physical units.
    pub fn params(&self) -> &Arc<NormalizationParams> {
        &self.params
    }

    /// Total number of targets.
    pub fn len(&self) -> usize {
        self.targets.iter().map(TargetDistribution::len).sum()
    }

    /// Returns `true` if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
