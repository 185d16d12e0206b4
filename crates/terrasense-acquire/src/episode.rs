//! The episode log.

use serde::{Deserialize, Serialize};
use terrasense_core::Coord;

use crate::acquisition::AcquisitionFunction;
use crate::engine::TerminationReason;

/// One placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Epoch the candidate was selected in (1-based).
    pub epoch: u32,
    /// Original pool index of the candidate.
    pub candidate: usize,
    /// Candidate location in native coordinates.
    pub coord: Coord,
    /// Acquisition score at selection.
    pub score: f64,
    /// Observed context points after the update.
    pub context_size: usize,
    /// Mean target variance after the update.
    pub mean_variance: f64,
}

/// Scores of every remaining candidate in one epoch, ascending by pool
/// index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    /// Epoch (1-based).
    pub epoch: u32,
    /// `(pool index, score)` pairs.
    pub scores: Vec<(usize, f64)>,
}

impl ScoreTable {
    /// Score of candidate `index`, if it was scored this epoch.
    pub fn score_of(&self, index: usize) -> Option<f64> {
        self.scores
            .iter()
            .find_map(|&(i, s)| (i == index).then_some(s))
    }
}

/// Ordered record of an episode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeLog {
    /// Acquisition function used for scoring.
    pub acquisition: AcquisitionFunction,
    /// Mean target variance before any placement. `None` until the
    /// engine leaves `Initialized`.
    pub initial_variance: Option<f64>,
    /// Placements in selection order.
    pub records: Vec<EpisodeRecord>,
    /// Per-epoch candidate scores.
    pub score_tables: Vec<ScoreTable>,
    /// Why the episode ended. `None` while it is running.
    pub termination: Option<TerminationReason>,
}

impl EpisodeLog {
    pub(crate) fn new(acquisition: AcquisitionFunction) -> Self {
        Self {
            acquisition,
            initial_variance: None,
            records: Vec::new(),
            score_tables: Vec::new(),
            termination: None,
        }
    }

    /// Pool indices in selection order.
    pub fn selected(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.candidate).collect()
    }

    /// Mean target variance after the last placement, or the initial
    /// variance if nothing was placed.
    pub fn final_variance(&self) -> Option<f64> {
        self.records
            .last()
            .map(|r| r.mean_variance)
            .or(self.initial_variance)
    }

    /// Returns `true` if no candidate was placed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
