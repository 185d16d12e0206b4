//! The [`ModelAdapter`]: tasks in, predictive distributions out.

use std::sync::Arc;

use indexmap::IndexSet;
use rayon::prelude::*;
use tracing::debug;

use terrasense_core::{
    IncompatibleSourceError, Marginals, ModelError, NormalizationParams, PredictiveDistribution,
    SourceId, SourceRegistry, SourceRole, Task,
};

use crate::backend::{Backend, BackendOutput};
use crate::config::{AdapterConfig, TrainConfig};
use crate::tensor::TensorBatch;
use crate::trainer::{Trainer, TrainingReport};

/// Wraps a [`Backend`] behind the task-level interface.
///
/// The adapter knows which sources its model was built for and rejects
/// tasks referencing any other with
/// [`IncompatibleSourceError`]. Output order always matches
/// `task.targets()` index for index.
pub struct ModelAdapter<B> {
    backend: B,
    context_sources: IndexSet<SourceId>,
    target_sources: IndexSet<SourceId>,
    context_floor: usize,
    params: Arc<NormalizationParams>,
}

impl<B: Backend> ModelAdapter<B> {
    /// Wrap `backend`.
    pub fn new(
        backend: B,
        config: AdapterConfig,
        registry: &SourceRegistry,
        params: Arc<NormalizationParams>,
    ) -> Result<Self, ModelError> {
        config.validate(registry)?;
        Ok(Self {
            backend,
            context_sources: config.context_sources.into_iter().collect(),
            target_sources: config.target_sources.into_iter().collect(),
            context_floor: config.context_floor,
            params,
        })
    }

    /// Wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Normalization parameters paired with every prediction.
    pub fn params(&self) -> &Arc<NormalizationParams> {
        &self.params
    }

    /// Minimum number of observed context points the model expects.
    pub fn context_floor(&self) -> usize {
        self.context_floor
    }

    /// Returns `true` if `source` may appear in a task's context.
    pub fn accepts_context(&self, source: SourceId) -> bool {
        self.context_sources.contains(&source)
    }

    /// Returns `true` if `source` may appear as a prediction target.
    pub fn accepts_target(&self, source: SourceId) -> bool {
        self.target_sources.contains(&source)
    }

    /// Check every source of `task` is one this model was built for.
    ///
    /// Empty context sets count: a task naming an unconfigured source is
    /// rejected even when that source contributed nothing.
    pub fn check(&self, task: &Task) -> Result<(), IncompatibleSourceError> {
        if let Some(set) = task
            .context()
            .iter()
            .find(|c| !self.context_sources.contains(&c.source()))
        {
            return Err(IncompatibleSourceError {
                source: set.source(),
                role: SourceRole::Context,
            });
        }
        if let Some(set) = task
            .targets()
            .iter()
            .find(|t| !self.target_sources.contains(&t.source()))
        {
            return Err(IncompatibleSourceError {
                source: set.source(),
                role: SourceRole::Target,
            });
        }
        Ok(())
    }

    /// Predict every target of `task`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::IncompatibleSource`] for unconfigured sources.
    /// - [`ModelError::ShapeMismatch`] / [`ModelError::InvalidVariance`]
    ///   if the backend output does not fit the task.
    pub fn predict(&self, task: &Task) -> Result<PredictiveDistribution, ModelError> {
        self.check(task)?;
        let batch = TensorBatch::from_tasks(&[task]);
        let mut outputs = self.backend.predict(&batch)?;
        if outputs.len() != 1 {
            return Err(ModelError::Backend {
                reason: format!(
                    "{} returned {} outputs for a batch of 1",
                    self.backend.name(),
                    outputs.len()
                ),
            });
        }
        let output = outputs.swap_remove(0);
        let marginals = split_output(task, output)?;
        let dist = PredictiveDistribution::new(task, marginals, Arc::clone(&self.params))?;
        debug!(
            backend = self.backend.name(),
            context = task.context_count(),
            targets = dist.len(),
            "predicted task"
        );
        Ok(dist)
    }

    /// Train the wrapped backend on `tasks`.
    pub fn fit(
        &mut self,
        tasks: &[Task],
        hyperparameters: &TrainConfig,
    ) -> Result<TrainingReport, ModelError> {
        let trainer = Trainer::new(hyperparameters.clone())?;
        for task in tasks {
            self.check(task)?;
        }
        trainer.run(&mut self.backend, tasks)
    }
}

impl<B: Backend + Sync> ModelAdapter<B> {
    /// Predict many independent tasks concurrently. Results keep input
    /// order.
    pub fn predict_batch(&self, tasks: &[Task]) -> Vec<Result<PredictiveDistribution, ModelError>> {
        tasks.par_iter().map(|t| self.predict(t)).collect()
    }
}

/// Cut a flat per-task output into one [`Marginals`] per target set.
fn split_output(task: &Task, output: BackendOutput) -> Result<Vec<Marginals>, ModelError> {
    let sets = task.targets();
    let expected = task.target_count();
    let found = output.len().unwrap_or(usize::MAX);
    if found != expected {
        // Report the first target set the output fails to cover exactly.
        let mut start = 0;
        let mut target_set = sets.len().saturating_sub(1);
        for (k, set) in sets.iter().enumerate() {
            if found < start + set.len() {
                target_set = k;
                break;
            }
            start += set.len();
        }
        return Err(ModelError::ShapeMismatch {
            target_set,
            expected,
            found,
        });
    }

    let mut out = Vec::with_capacity(sets.len());
    let mut start = 0;
    for set in sets {
        let range = start..start + set.len();
        out.push(match &output {
            BackendOutput::Gaussian { mean, variance } => Marginals::Gaussian {
                mean: mean[range.clone()].to_vec(),
                variance: variance[range].to_vec(),
            },
            BackendOutput::Samples { draws } => Marginals::Samples {
                draws: draws.iter().map(|d| d[range.clone()].to_vec()).collect(),
            },
        });
        start += set.len();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use terrasense_core::{SourceId, TargetSet, TimeQuery, Timestamp};

    fn task(sizes: &[usize]) -> Task {
        let sets = sizes
            .iter()
            .map(|&n| {
                TargetSet::new(
                    SourceId(0),
                    "t2m",
                    (0..n).map(|i| smallvec![i as f64, 0.0]).collect(),
                    None,
                )
                .unwrap()
            })
            .collect();
        Task::new(TimeQuery::At(Timestamp(0)), vec![], sets).unwrap()
    }

    #[test]
    fn split_keeps_slot_order() {
        let out = BackendOutput::Gaussian {
            mean: vec![0.0, 1.0, 2.0],
            variance: vec![1.0; 3],
        };
        let m = split_output(&task(&[1, 2]), out).unwrap();
        assert_eq!(m[0].mean(0), 0.0);
        assert_eq!(m[1].mean(0), 1.0);
        assert_eq!(m[1].mean(1), 2.0);
    }

    #[test]
    fn split_samples() {
        let out = BackendOutput::Samples {
            draws: vec![vec![0.0, 2.0], vec![2.0, 4.0]],
        };
        let m = split_output(&task(&[1, 1]), out).unwrap();
        assert_eq!(m[1].mean(0), 3.0);
        assert_eq!(m[0].variance(0), 1.0);
    }

    #[test]
    fn ragged_output_is_shape_mismatch() {
        let out = BackendOutput::Gaussian {
            mean: vec![0.0; 3],
            variance: vec![1.0; 2],
        };
        assert!(matches!(
            split_output(&task(&[3]), out),
            Err(ModelError::ShapeMismatch { target_set: 0, .. })
        ));
    }
}
