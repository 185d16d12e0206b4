//! Padded tensor batches handed to a [`Backend`](crate::Backend).
//!
//! Every task in a batch is padded to the largest context and target
//! cardinality in the batch. All arrays are flat and row-major:
//!
//! | Array | Shape |
//! |-------|-------|
//! | `context_coords` | `[batch, max_context, coord_dim]` |
//! | `context_values`, `context_offsets`, `context_sources`, `context_mask` | `[batch, max_context]` |
//! | `target_coords` | `[batch, max_target, coord_dim]` |
//! | `target_sources`, `target_mask`, `target_truth`, `target_truth_mask` | `[batch, max_target]` |
//!
//! Context slots keep the task's per-set validity bit in `context_mask`,
//! so a masked grid cell and a padding slot look the same to the backend.

use terrasense_core::{Task, SPATIAL_NDIM};

/// A padded, masked batch of tasks.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorBatch {
    batch: usize,
    max_context: usize,
    max_target: usize,
    coord_dim: usize,
    context_coords: Vec<f64>,
    context_values: Vec<f64>,
    context_offsets: Vec<f64>,
    context_sources: Vec<u32>,
    context_mask: Vec<bool>,
    target_coords: Vec<f64>,
    target_sources: Vec<u32>,
    target_mask: Vec<bool>,
    target_truth: Vec<f64>,
    target_truth_mask: Vec<bool>,
    target_counts: Vec<usize>,
}

impl TensorBatch {
    /// Concatenate `tasks` into one padded batch.
    ///
    /// Context sets are laid out in task order, then slot order; target
    /// sets likewise, so target `j` of task `b` is the `j`-th location in
    /// the concatenation of that task's target sets.
    pub fn from_tasks(tasks: &[&Task]) -> Self {
        let batch = tasks.len();
        let coord_dim = SPATIAL_NDIM;
        let max_context = tasks
            .iter()
            .map(|t| t.context().iter().map(|c| c.len()).sum::<usize>())
            .max()
            .unwrap_or(0);
        let max_target = tasks.iter().map(|t| t.target_count()).max().unwrap_or(0);

        let mut out = Self {
            batch,
            max_context,
            max_target,
            coord_dim,
            context_coords: vec![0.0; batch * max_context * coord_dim],
            context_values: vec![0.0; batch * max_context],
            context_offsets: vec![0.0; batch * max_context],
            context_sources: vec![0; batch * max_context],
            context_mask: vec![false; batch * max_context],
            target_coords: vec![0.0; batch * max_target * coord_dim],
            target_sources: vec![0; batch * max_target],
            target_mask: vec![false; batch * max_target],
            target_truth: vec![0.0; batch * max_target],
            target_truth_mask: vec![false; batch * max_target],
            target_counts: Vec::with_capacity(batch),
        };

        for (b, task) in tasks.iter().enumerate() {
            let mut slot = b * max_context;
            for set in task.context() {
                for i in 0..set.len() {
                    let c = &set.coords()[i];
                    let at = slot * coord_dim;
                    let n = c.len().min(coord_dim);
                    out.context_coords[at..at + n].copy_from_slice(&c[..n]);
                    let observed = set.mask()[i];
                    out.context_values[slot] = if observed { set.values()[i] } else { 0.0 };
                    out.context_offsets[slot] = set.time_offsets()[i];
                    out.context_sources[slot] = set.source().0;
                    out.context_mask[slot] = observed;
                    slot += 1;
                }
            }

            let mut slot = b * max_target;
            for set in task.targets() {
                for (i, c) in set.coords().iter().enumerate() {
                    let at = slot * coord_dim;
                    let n = c.len().min(coord_dim);
                    out.target_coords[at..at + n].copy_from_slice(&c[..n]);
                    out.target_sources[slot] = set.source().0;
                    out.target_mask[slot] = true;
                    if let Some(v) = set.truth().and_then(|t| t[i]) {
                        out.target_truth[slot] = v;
                        out.target_truth_mask[slot] = true;
                    }
                    slot += 1;
                }
            }
            out.target_counts.push(task.target_count());
        }
        out
    }

    /// Number of tasks.
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Padded context cardinality.
    pub fn max_context(&self) -> usize {
        self.max_context
    }

    /// Padded target cardinality.
    pub fn max_target(&self) -> usize {
        self.max_target
    }

    /// Spatial axes per coordinate.
    pub fn coord_dim(&self) -> usize {
        self.coord_dim
    }

    /// Unpadded target count of task `b`.
    pub fn target_count(&self, b: usize) -> usize {
        self.target_counts[b]
    }

    /// Context coordinates.
    pub fn context_coords(&self) -> &[f64] {
        &self.context_coords
    }

    /// Normalized context values (0 in masked and padding slots).
    pub fn context_values(&self) -> &[f64] {
        &self.context_values
    }

    /// Normalized context time offsets.
    pub fn context_offsets(&self) -> &[f64] {
        &self.context_offsets
    }

    /// Source id of each context slot.
    pub fn context_sources(&self) -> &[u32] {
        &self.context_sources
    }

    /// `true` for observed context slots.
    pub fn context_mask(&self) -> &[bool] {
        &self.context_mask
    }

    /// Target coordinates.
    pub fn target_coords(&self) -> &[f64] {
        &self.target_coords
    }

    /// Source id of each target slot.
    pub fn target_sources(&self) -> &[u32] {
        &self.target_sources
    }

    /// `true` for real (non-padding) target slots.
    pub fn target_mask(&self) -> &[bool] {
        &self.target_mask
    }

    /// Normalized truth (0 where unknown).
    pub fn target_truth(&self) -> &[f64] {
        &self.target_truth
    }

    /// `true` where the truth is known.
    pub fn target_truth_mask(&self) -> &[bool] {
        &self.target_truth_mask
    }

    /// Context slot range of task `b`.
    pub fn context_range(&self, b: usize) -> std::ops::Range<usize> {
        b * self.max_context..(b + 1) * self.max_context
    }

    /// Target slot range of task `b`.
    pub fn target_range(&self, b: usize) -> std::ops::Range<usize> {
        b * self.max_target..(b + 1) * self.max_target
    }
}
