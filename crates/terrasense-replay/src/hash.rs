//! Hashing utilities for task and configuration comparison.
//!
//! Uses FNV-1a for fast, deterministic hashing of episode state. These
//! hashes are not cryptographically secure; they only detect that two
//! runs diverged.

use terrasense_acquire::{AcquisitionFunction, EpisodeConfig};
use terrasense_core::{Coord, Layout, Task, TimeQuery};

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Incremental FNV-1a state.
#[derive(Clone, Copy, Debug)]
struct Fnv(u64);

impl Fnv {
    fn new() -> Self {
        Self(FNV_OFFSET)
    }

    #[inline]
    fn byte(mut self, b: u8) -> Self {
        self.0 = (self.0 ^ b as u64).wrapping_mul(FNV_PRIME);
        self
    }

    fn bytes(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |h, &b| h.byte(b))
    }

    fn u32(self, v: u32) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    fn u64(self, v: u64) -> Self {
        self.bytes(&v.to_le_bytes())
    }

    fn f64(self, v: f64) -> Self {
        self.u64(v.to_bits())
    }

    fn str(self, s: &str) -> Self {
        self.u64(s.len() as u64).bytes(s.as_bytes())
    }

    fn coords(self, coords: &[Coord]) -> Self {
        coords.iter().fold(self.u64(coords.len() as u64), |h, c| {
            c.iter().fold(h.u32(c.len() as u32), |h, &x| h.f64(x))
        })
    }

    fn opt_u64(self, v: Option<u64>) -> Self {
        match v {
            Some(v) => self.byte(1).u64(v),
            None => self.byte(0),
        }
    }
}

/// Hash every bit of a task: time anchor, context sets (values, offsets
/// and mask included) and target sets (truth included).
///
/// Floats are hashed by bit pattern, so `0.0` and `-0.0` differ.
pub fn task_hash(task: &Task) -> u64 {
    let mut h = Fnv::new();
    h = match task.time() {
        TimeQuery::At(t) => h.byte(0).u64(t.0 as u64),
        TimeQuery::Window { start, end } => h.byte(1).u64(start.0 as u64).u64(end.0 as u64),
    };

    h = h.u64(task.context().len() as u64);
    for set in task.context() {
        h = h.u32(set.source().0).str(set.variable());
        h = match set.layout() {
            Layout::Scattered => h.byte(0),
            Layout::Gridded { shape } => shape
                .iter()
                .fold(h.byte(1).u32(shape.len() as u32), |h, &d| h.u64(d as u64)),
        };
        h = h.coords(set.coords());
        h = set.values().iter().fold(h, |h, &v| h.f64(v));
        h = set.time_offsets().iter().fold(h, |h, &v| h.f64(v));
        h = set.mask().iter().fold(h, |h, &m| h.byte(m as u8));
    }

    h = h.u64(task.targets().len() as u64);
    for set in task.targets() {
        h = h.u32(set.source().0).str(set.variable()).coords(set.coords());
        h = match set.truth() {
            None => h.byte(0),
            Some(truth) => truth.iter().fold(h.byte(1), |h, t| match t {
                Some(v) => h.byte(1).f64(*v),
                None => h.byte(0),
            }),
        };
    }
    h.0
}

/// Hash everything that determines an episode's decisions besides the
/// model and the starting task: acquisition function, episode settings
/// and the candidate locations.
pub fn config_hash(
    acquisition: AcquisitionFunction,
    config: &EpisodeConfig,
    candidates: &[Coord],
) -> u64 {
    Fnv::new()
        .str(acquisition.name())
        .u32(config.placement_source.0)
        .u64(config.batch_size as u64)
        .opt_u64(config.max_placements.map(|m| m as u64))
        .f64(config.min_improvement)
        .f64(config.score_tolerance)
        .opt_u64(config.max_epochs.map(u64::from))
        .coords(candidates)
        .0
}
