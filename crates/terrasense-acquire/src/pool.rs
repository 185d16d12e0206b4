//! The candidate pool.

use serde::{Deserialize, Serialize};
use terrasense_core::{Coord, EmptyPoolError};

/// Candidate sensor locations, in native coordinates of the placement
/// source.
///
/// Candidates keep their original index for the whole episode;
/// [`remaining()`](Self::remaining) is always ascending.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidatePool {
    all: Vec<Coord>,
    remaining: Vec<usize>,
}

impl CandidatePool {
    /// A pool holding every candidate.
    pub fn new(candidates: Vec<Coord>) -> Self {
        let remaining = (0..candidates.len()).collect();
        Self {
            all: candidates,
            remaining,
        }
    }

    /// Number of candidates not yet placed.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Returns `true` if every candidate has been placed.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Number of candidates the pool started with.
    pub fn capacity(&self) -> usize {
        self.all.len()
    }

    /// Original indices of the unplaced candidates, ascending.
    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    /// Candidate `index` (original numbering), placed or not.
    pub fn candidate(&self, index: usize) -> Option<&Coord> {
        self.all.get(index)
    }

    /// Remove candidates by original index. Unknown or already removed
    /// indices are ignored.
    pub fn remove(&mut self, indices: &[usize]) {
        self.remaining.retain(|i| !indices.contains(i));
    }

    /// Return every candidate to the pool.
    pub fn reset(&mut self) {
        self.remaining = (0..self.all.len()).collect();
    }

    /// Fail with [`EmptyPoolError`] if nothing is left to place.
    pub fn ensure_nonempty(&self, epoch: u32) -> Result<(), EmptyPoolError> {
        if self.remaining.is_empty() {
            Err(EmptyPoolError { epoch })
        } else {
            Ok(())
        }
    }
}
