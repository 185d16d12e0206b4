//! The [`Task`]: the model's unit of input.
//!
//! A task carries one [`ContextSet`] per context source and one or more
//! [`TargetSet`]s. Every coordinate is in the shared normalized frame and
//! every value is normalized. Context sets are variable-cardinality point
//! lists with a validity mask; padding to fixed-size tensors is left to
//! the model adapter.

use smallvec::SmallVec;

use crate::error::{EmptyTargetError, TaskError};
use crate::id::{Coord, SourceId, Timestamp};

/// When a task is anchored in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeQuery {
    /// A single instant; each source contributes its nearest stamp.
    At(Timestamp),
    /// A closed window; every stamp inside contributes.
    Window {
        /// Window start (inclusive).
        start: Timestamp,
        /// Window end (inclusive).
        end: Timestamp,
    },
}

impl TimeQuery {
    /// Reference time that context time offsets are measured from.
    pub fn reference(&self) -> Timestamp {
        match self {
            Self::At(t) => *t,
            Self::Window { end, .. } => *end,
        }
    }
}

/// Memory layout of a context set's points.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Unstructured point list.
    Scattered,
    /// Dense grid, row-major, outermost dimension first
    /// (`[slices, rows, cols]`).
    Gridded {
        /// Extent of each dimension.
        shape: SmallVec<[usize; 3]>,
    },
}

/// Context observations from a single source.
///
/// `coords`, `values`, `time_offsets` and `mask` are parallel arrays.
/// Only points with `mask[i] == true` are observed; masked points keep
/// their slot so gridded layouts stay rectangular.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextSet {
    source: SourceId,
    variable: String,
    layout: Layout,
    coords: Vec<Coord>,
    values: Vec<f64>,
    time_offsets: Vec<f64>,
    mask: Vec<bool>,
}

impl ContextSet {
    /// An empty scattered set (a source with no data in the time window).
    pub fn empty(source: SourceId, variable: impl Into<String>) -> Self {
        Self {
            source,
            variable: variable.into(),
            layout: Layout::Scattered,
            coords: Vec::new(),
            values: Vec::new(),
            time_offsets: Vec::new(),
            mask: Vec::new(),
        }
    }

    /// Build a set from parallel arrays.
    ///
    /// # Errors
    ///
    /// [`TaskError::Malformed`] if the arrays differ in length or a
    /// gridded shape does not cover exactly the number of points.
    pub fn new(
        source: SourceId,
        variable: impl Into<String>,
        layout: Layout,
        coords: Vec<Coord>,
        values: Vec<f64>,
        time_offsets: Vec<f64>,
        mask: Vec<bool>,
    ) -> Result<Self, TaskError> {
        let n = coords.len();
        if values.len() != n || time_offsets.len() != n || mask.len() != n {
            return Err(TaskError::Malformed {
                reason: format!(
                    "context set for source {source}: coords={n}, values={}, offsets={}, mask={}",
                    values.len(),
                    time_offsets.len(),
                    mask.len()
                ),
            });
        }
        if let Layout::Gridded { shape } = &layout {
            let cells: usize = shape.iter().product();
            if cells != n {
                return Err(TaskError::Malformed {
                    reason: format!(
                        "context set for source {source}: grid shape {:?} holds {cells} cells, got {n} points",
                        shape.as_slice()
                    ),
                });
            }
        }
        Ok(Self {
            source,
            variable: variable.into(),
            layout,
            coords,
            values,
            time_offsets,
            mask,
        })
    }

    /// Originating source.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Observed variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Point layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Normalized coordinates, one per slot.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// Normalized values, one per slot.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Normalized time offsets from the task reference time.
    pub fn time_offsets(&self) -> &[f64] {
        &self.time_offsets
    }

    /// Validity mask.
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Mutable validity mask. Only observation validity may change;
    /// coordinates and values are fixed at construction.
    pub fn mask_mut(&mut self) -> &mut [bool] {
        &mut self.mask
    }

    /// Number of slots (observed or masked).
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns `true` if the set has no slots.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of observed (unmasked) points.
    pub fn observed_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Observed points as `(coord, value)`.
    pub fn observed(&self) -> impl Iterator<Item = (&Coord, f64)> + '_ {
        self.coords
            .iter()
            .zip(self.values.iter())
            .zip(self.mask.iter())
            .filter(|&(_, &m)| m)
            .map(|((c, &v), _)| (c, v))
    }

    /// Append an observed point. A gridded set degrades to scattered.
    pub fn push(&mut self, coord: Coord, value: f64, time_offset: f64) {
        self.layout = Layout::Scattered;
        self.coords.push(coord);
        self.values.push(value);
        self.time_offsets.push(time_offset);
        self.mask.push(true);
    }
}

/// Query locations for one target source.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSet {
    source: SourceId,
    variable: String,
    coords: Vec<Coord>,
    truth: Option<Vec<Option<f64>>>,
}

impl TargetSet {
    /// Build a target set.
    ///
    /// `truth`, when present, holds one normalized value per location;
    /// `None` entries are locations without a matching observation.
    pub fn new(
        source: SourceId,
        variable: impl Into<String>,
        coords: Vec<Coord>,
        truth: Option<Vec<Option<f64>>>,
    ) -> Result<Self, TaskError> {
        if let Some(t) = &truth {
            if t.len() != coords.len() {
                return Err(TaskError::Malformed {
                    reason: format!(
                        "target set for source {source}: {} locations, {} truth values",
                        coords.len(),
                        t.len()
                    ),
                });
            }
        }
        Ok(Self {
            source,
            variable: variable.into(),
            coords,
            truth,
        })
    }

    /// Target source.
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Target variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Normalized query locations.
    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    /// Normalized truth values, if known.
    pub fn truth(&self) -> Option<&[Option<f64>]> {
        self.truth.as_deref()
    }

    /// Number of query locations.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns `true` if the set has no locations.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// One model input: context observations plus target query locations.
///
/// # Invariants
///
/// - At least one target location across all target sets.
/// - At most one context set per source; context sets are in source
///   registration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    time: TimeQuery,
    context: Vec<ContextSet>,
    targets: Vec<TargetSet>,
}

impl Task {
    /// Assemble a task, rejecting one without target points.
    pub fn new(
        time: TimeQuery,
        context: Vec<ContextSet>,
        targets: Vec<TargetSet>,
    ) -> Result<Self, TaskError> {
        if targets.iter().all(TargetSet::is_empty) {
            return Err(EmptyTargetError {
                time: time.reference(),
            }
            .into());
        }
        for (i, a) in context.iter().enumerate() {
            if context[..i].iter().any(|b| b.source == a.source) {
                return Err(TaskError::Malformed {
                    reason: format!("two context sets for source {}", a.source),
                });
            }
        }
        Ok(Self {
            time,
            context,
            targets,
        })
    }

    /// Time anchor.
    pub fn time(&self) -> TimeQuery {
        self.time
    }

    /// Context sets.
    pub fn context(&self) -> &[ContextSet] {
        &self.context
    }

    /// Mutable context sets (masking and placement only touch these).
    pub fn context_mut(&mut self) -> &mut [ContextSet] {
        &mut self.context
    }

    /// Target sets.
    pub fn targets(&self) -> &[TargetSet] {
        &self.targets
    }

    /// Total observed context points across sources.
    pub fn context_count(&self) -> usize {
        self.context.iter().map(ContextSet::observed_count).sum()
    }

    /// Total target locations across target sets.
    pub fn target_count(&self) -> usize {
        self.targets.iter().map(TargetSet::len).sum()
    }

    /// The same context with different targets.
    pub fn with_targets(&self, targets: Vec<TargetSet>) -> Result<Self, TaskError> {
        Self::new(self.time, self.context.clone(), targets)
    }

    /// Add an observed context point, creating the source's set if absent.
    ///
    /// A newly created set is appended after the existing ones.
    pub fn add_context_point(
        &mut self,
        source: SourceId,
        variable: &str,
        coord: Coord,
        value: f64,
    ) {
        let set = match self.context.iter().position(|c| c.source == source) {
            Some(i) => &mut self.context[i],
            None => {
                self.context.push(ContextSet::empty(source, variable));
                let last = self.context.len() - 1;
                &mut self.context[last]
            }
        };
        set.push(coord, value, 0.0);
    }
}
