//! The [`Backend`] trait: the opaque trainable function.

use terrasense_core::ModelError;

use crate::tensor::TensorBatch;

/// Predictions for one task of a batch, flat over the task's targets.
///
/// Entry `j` is the `j`-th location of the concatenation of the task's
/// target sets; padding slots are not included.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendOutput {
    /// Independent Gaussian marginals.
    Gaussian {
        /// Normalized mean per target.
        mean: Vec<f64>,
        /// Normalized variance per target.
        variance: Vec<f64>,
    },
    /// Ensemble draws: `draws[s][j]` is sample `s` at target `j`.
    Samples {
        /// Sample draws.
        draws: Vec<Vec<f64>>,
    },
}

impl BackendOutput {
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
}

/// A trainable function from padded task batches to predictive marginals.
///
/// # Contract
///
/// - `predict()` returns exactly one [`BackendOutput`] per task in the
///   batch, each covering exactly [`TensorBatch::target_count`] targets
///   in slot order. The adapter rejects anything else.
/// - `predict()` MUST be deterministic for fixed weights.
/// - `train_step()` updates the weights in place and returns the batch
///   loss.
///
/// # Examples
///
/// A backend that predicts zero mean and unit variance everywhere:
///
/// ```
/// use terrasense_core::ModelError;
/// use terrasense_model::{Backend, BackendOutput, TensorBatch};
///
/// struct Prior;
///
/// impl Backend for Prior {
///     fn name(&self) -> &str { "prior" }
///
///     fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
///         Ok((0..batch.batch())
///             .map(|b| {
///                 let n = batch.target_count(b);
///                 BackendOutput::Gaussian { mean: vec![0.0; n], variance: vec![1.0; n] }
///             })
///             .collect())
///     }
///
///     fn train_step(&mut self, _: &TensorBatch, _: f64) -> Result<f64, ModelError> {
///         Ok(0.0)
///     }
/// }
///
/// assert_eq!(Prior.name(), "prior");
/// ```
pub trait Backend: Send {
    /// Human-readable name for logs and episode headers.
    fn name(&self) -> &str;

    /// Predict every task of `batch`.
    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError>;

    /// One optimizer step on `batch`; returns the loss.
    fn train_step(&mut self, batch: &TensorBatch, learning_rate: f64) -> Result<f64, ModelError>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn predict(&self, batch: &TensorBatch) -> Result<Vec<BackendOutput>, ModelError> {
        (**self).predict(batch)
    }

    fn train_step(&mut self, batch: &TensorBatch, learning_rate: f64) -> Result<f64, ModelError> {
        (**self).train_step(batch, learning_rate)
    }
}
