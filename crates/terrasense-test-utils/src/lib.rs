//! Test utilities and mock backends for terrasense development.
//!
//! Provides deterministic [`Backend`] implementations standing in for a
//! trained neural process, and [`fixtures`] with a small two-source
//! world (a station network and a reanalysis grid).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use terrasense_core::{Coord, ModelError};
use terrasense_model::{Backend, BackendOutput, TensorBatch};

/// Observed context slots of task `b` as `(coord, value)`.
fn observed_context(batch: &TensorBatch, b: usize) -> impl Iterator<Item = (&[f64], f64)> + '_ {
    let dim = batch.coord_dim();
    batch.context_range(b).filter_map(move |slot| {
        batch.context_mask()[slot].then(|| {
            (
                &batch.context_coords()[slot * dim..(slot + 1) * dim],
                batch.context_values()[slot],
            )
        })
    })
}

/// Predicts the mean of the observed context values at every target.
///
/// Variance is `prior_variance / (1 + n)` for `n` observed context
/// points. With no context the mean is 0 (the normalized climatology).
#[derive(Clone, Debug)]
pub struct MeanOfContextBackend {
    pub prior_variance: f64,
}

impl Default for MeanOfContextBackend {
    fn default() -> Self {
        Self {
            prior_variance: 1.0,
        }
    }
}

impl Backend for MeanOfContextBackend {
    fn name(&self) -> &str {
        "mean_of_context"
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        Ok((0..batch.batch())
            .map(|b| {
                let (sum, n) = observed_context(batch, b).fold((0.0, 0usize), |(s, n), (_, v)| {
                    (s + v, n + 1)
                });
                let mean = if n == 0 { 0.0 } else { sum / n as f64 };
                let targets = batch.target_count(b);
                BackendOutput::Gaussian {
                    mean: vec![mean; targets],
                    variance: vec![self.prior_variance / (1 + n) as f64; targets],
                }
            })
            .collect())
    }

    fn train_step(&mut self, _batch: &TensorBatch, _learning_rate: f64) -> Result<f64, ModelError> {
        Ok(0.0)
    }
}

/// A perfect interpolator at observed locations.
///
/// A target sharing its normalized location (within `1e-9`) with an
/// observed context point gets that point's value and zero variance.
/// Any other target gets mean 0 and `fallback_variance`.
#[derive(Clone, Debug)]
pub struct EchoContextBackend {
    pub fallback_variance: f64,
}

impl Default for EchoContextBackend {
    fn default() -> Self {
        Self {
            fallback_variance: 1.0,
        }
    }
}

impl Backend for EchoContextBackend {
    fn name(&self) -> &str {
        "echo_context"
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        let dim = batch.coord_dim();
        Ok((0..batch.batch())
            .map(|b| {
                let first = batch.target_range(b).start;
                let (mean, variance) = (first..first + batch.target_count(b))
                    .map(|slot| {
                        let target = &batch.target_coords()[slot * dim..(slot + 1) * dim];
                        observed_context(batch, b)
                            .find(|(c, _)| c.iter().zip(target).all(|(x, y)| (x - y).abs() < 1e-9))
                            .map_or((0.0, self.fallback_variance), |(_, v)| (v, 0.0))
                    })
                    .unzip();
                BackendOutput::Gaussian { mean, variance }
            })
            .collect())
    }

    fn train_step(&mut self, _batch: &TensorBatch, _learning_rate: f64) -> Result<f64, ModelError> {
        Ok(0.0)
    }
}

/// Echoes each target's first normalized coordinate as its mean.
///
/// `truncated(n)` drops the last `n` predictions of every task to
/// provoke shape mismatches.
#[derive(Clone, Debug)]
pub struct IdentityBackend {
    variance: f64,
    truncate: usize,
    steps: usize,
}

impl IdentityBackend {
    pub fn new(variance: f64) -> Self {
        Self {
            variance,
            truncate: 0,
            steps: 0,
        }
    }

    pub fn truncated(mut self, n: usize) -> Self {
        self.truncate = n;
        self
    }

    /// Number of `train_step` calls so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Backend for IdentityBackend {
    fn name(&self) -> &str {
        "identity"
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        let dim = batch.coord_dim();
        Ok((0..batch.batch())
            .map(|b| {
                let n = batch.target_count(b).saturating_sub(self.truncate);
                let first = batch.target_range(b).start;
                let mean: Vec<f64> = (first..first + n)
                    .map(|slot| batch.target_coords()[slot * dim])
                    .collect();
                BackendOutput::Gaussian {
                    variance: vec![self.variance; mean.len()],
                    mean,
                }
            })
            .collect())
    }

    fn train_step(&mut self, _batch: &TensorBatch, _learning_rate: f64) -> Result<f64, ModelError> {
        self.steps += 1;
        Ok(0.0)
    }
}

/// Variance shrinks multiplicatively for every scripted location present
/// in the context.
///
/// Every target gets variance `base_variance * Π(1 - r)` over the
/// scripted `(location, r)` pairs observed in the task's context, and
/// mean 0. Locations match within `1e-9` in the normalized frame.
#[derive(Clone, Debug)]
pub struct ScriptedVarianceBackend {
    pub base_variance: f64,
    pub reductions: Vec<(Coord, f64)>,
}

impl ScriptedVarianceBackend {
    pub fn new(reductions: Vec<(Coord, f64)>) -> Self {
        Self {
            base_variance: 1.0,
            reductions,
        }
    }
}

impl Backend for ScriptedVarianceBackend {
    fn name(&self) -> &str {
        "scripted_variance"
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        Ok((0..batch.batch())
            .map(|b| {
                let mut variance = self.base_variance;
                for (loc, r) in &self.reductions {
                    let present = observed_context(batch, b).any(|(c, _)| {
                        c.iter().zip(loc.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
                    });
                    if present {
                        variance *= 1.0 - r;
                    }
                }
                let n = batch.target_count(b);
                BackendOutput::Gaussian {
                    mean: vec![0.0; n],
                    variance: vec![variance; n],
                }
            })
            .collect())
    }

    fn train_step(&mut self, _batch: &TensorBatch, _learning_rate: f64) -> Result<f64, ModelError> {
        Ok(0.0)
    }
}

/// Returns scripted losses and records what each step saw.
///
/// Once the script runs out the last loss repeats.
#[derive(Clone, Debug)]
pub struct LossScriptBackend {
    script: Vec<f64>,
    cursor: usize,
    batch_sizes: Vec<usize>,
    first_truths: Vec<f64>,
}

impl LossScriptBackend {
    pub fn constant(loss: f64) -> Self {
        Self::scripted(vec![loss])
    }

    pub fn scripted(script: Vec<f64>) -> Self {
        Self {
            script,
            cursor: 0,
            batch_sizes: Vec::new(),
            first_truths: Vec::new(),
        }
    }

    /// Tasks per step, in step order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.clone()
    }

    /// Truth of the first target of every task seen, in step order.
    pub fn first_truths(&self) -> Vec<f64> {
        self.first_truths.clone()
    }
}

impl Backend for LossScriptBackend {
    fn name(&self) -> &str {
        "loss_script"
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        Ok((0..batch.batch())
            .map(|b| {
                let n = batch.target_count(b);
                BackendOutput::Gaussian {
                    mean: vec![0.0; n],
                    variance: vec![1.0; n],
                }
            })
            .collect())
    }

    fn train_step(&mut self, batch: &TensorBatch, _learning_rate: f64) -> Result<f64, ModelError> {
        self.batch_sizes.push(batch.batch());
        for b in 0..batch.batch() {
            self.first_truths
                .push(batch.target_truth()[batch.target_range(b).start]);
        }
        let loss = self
            .script
            .get(self.cursor)
            .or(self.script.last())
            .copied()
            .ok_or_else(|| ModelError::Backend {
                reason: "empty loss script".into(),
            })?;
        self.cursor += 1;
        Ok(loss)
    }
}
