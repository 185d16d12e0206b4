//! The epoch loop.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use terrasense_core::{ModelError, Task};

use crate::backend::Backend;
use crate::config::TrainConfig;
use crate::tensor::TensorBatch;

/// Losses of one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct EpochReport {
    /// Epoch number (0-based).
    pub epoch: usize,
    /// Loss of every optimizer step, in step order.
    pub losses: Vec<f64>,
}

impl EpochReport {
    /// Mean step loss, or `None` if the epoch ran no steps.
    pub fn mean_loss(&self) -> Option<f64> {
        (!self.losses.is_empty())
            .then(|| self.losses.iter().sum::<f64>() / self.losses.len() as f64)
    }
}

/// Result of a training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    /// One report per epoch.
    pub epochs: Vec<EpochReport>,
}

impl TrainingReport {
    /// Mean loss of the last epoch that ran any steps.
    pub fn final_loss(&self) -> Option<f64> {
        self.epochs.iter().rev().find_map(EpochReport::mean_loss)
    }
}

/// Runs epochs of seeded-shuffle minibatch training.
///
/// Each epoch shuffles the task order with a ChaCha8 stream seeded once
/// from [`TrainConfig::seed`], splits it into batches of
/// [`TrainConfig::batch_size`] tasks (dropping the remainder),
/// concatenates each batch into one [`TensorBatch`] and calls
/// [`Backend::train_step`].
#[derive(Clone, Debug)]
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    /// Create a trainer with validated hyperparameters.
    pub fn new(config: TrainConfig) -> Result<Self, ModelError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Hyperparameters.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train `backend` on `tasks`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::NoTasks`] if `tasks` is empty.
    /// - [`ModelError::NonFiniteLoss`] as soon as a step reports a NaN or
    ///   infinite loss; the weights are left as that step left them.
    /// - Any error the backend returns.
    pub fn run<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        tasks: &[Task],
    ) -> Result<TrainingReport, ModelError> {
        if tasks.is_empty() {
            return Err(ModelError::NoTasks);
        }
        let batch_size = self.config.batch_size.unwrap_or(1);
        if batch_size > tasks.len() {
            warn!(
                batch_size,
                tasks = tasks.len(),
                "batch size exceeds task count; no steps will run"
            );
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..tasks.len()).collect();
        let mut report = TrainingReport::default();

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut losses = Vec::with_capacity(tasks.len() / batch_size);
            for (batch, chunk) in order.chunks_exact(batch_size).enumerate() {
                let members: Vec<&Task> = chunk.iter().map(|&i| &tasks[i]).collect();
                let tensors = TensorBatch::from_tasks(&members);
                let loss = backend.train_step(&tensors, self.config.learning_rate)?;
                if !loss.is_finite() {
                    return Err(ModelError::NonFiniteLoss { epoch, batch });
                }
                losses.push(loss);
            }
            let epoch_report = EpochReport { epoch, losses };
            info!(
                backend = backend.name(),
                epoch,
                steps = epoch_report.losses.len(),
                mean_loss = epoch_report.mean_loss().unwrap_or(f64::NAN),
                "epoch complete"
            );
            report.epochs.push(epoch_report);
        }
        Ok(report)
    }
}
