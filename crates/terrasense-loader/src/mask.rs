//! Masking & gap simulation.
//!
//! A [`MaskPolicy`] hides context observations by clearing their validity
//! bits. Coordinates, values and grid layouts are never touched, and
//! target sets are left exactly as built.

use std::error::Error;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use terrasense_core::{Coord, SourceId, Task};

// ── MaskError ──────────────────────────────────────────────────────

/// Errors from malformed mask policies.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskError {
    /// Dropout rate outside `[0, 1]` or NaN.
    InvalidRate {
        /// The rejected rate.
        rate: f64,
    },
    /// Block region is not a well-formed box in the normalized frame.
    InvalidRegion {
        /// What is wrong.
        reason: String,
    },
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRate { rate } => {
                write!(f, "dropout rate must be in [0, 1], got {rate}")
            }
            Self::InvalidRegion { reason } => write!(f, "invalid mask region: {reason}"),
        }
    }
}

impl Error for MaskError {}

// ── MaskPolicy ─────────────────────────────────────────────────────

/// Which context observations to hide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MaskPolicy {
    /// Drop each observed point independently with probability `rate`.
    RandomDropout {
        /// Drop probability.
        rate: f64,
        /// RNG seed.
        seed: u64,
    },
    /// Drop every point inside an inclusive box of the normalized frame.
    BlockMissing {
        /// Lower corner.
        min: Coord,
        /// Upper corner.
        max: Coord,
        /// Restrict to these sources; `None` masks every source.
        sources: Option<Vec<SourceId>>,
    },
    /// Drop whole sources.
    SourceDropout {
        /// Sources to silence.
        sources: Vec<SourceId>,
    },
    /// Apply several policies in order.
    All(Vec<MaskPolicy>),
}

impl MaskPolicy {
    /// Check rates and regions, recursing into [`MaskPolicy::All`].
    pub fn validate(&self) -> Result<(), MaskError> {
        match self {
            Self::RandomDropout { rate, .. } => {
                if (0.0..=1.0).contains(rate) {
                    Ok(())
                } else {
                    Err(MaskError::InvalidRate { rate: *rate })
                }
            }
            Self::BlockMissing { min, max, .. } => {
                if min.is_empty() || min.len() != max.len() {
                    return Err(MaskError::InvalidRegion {
                        reason: format!(
                            "corners have {} and {} axes",
                            min.len(),
                            max.len()
                        ),
                    });
                }
                let ok = min
                    .iter()
                    .zip(max.iter())
                    .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo <= hi);
                if ok {
                    Ok(())
                } else {
                    Err(MaskError::InvalidRegion {
                        reason: format!(
                            "need finite min <= max, got {:?} .. {:?}",
                            min.as_slice(),
                            max.as_slice()
                        ),
                    })
                }
            }
            Self::SourceDropout { .. } => Ok(()),
            Self::All(policies) => policies.iter().try_for_each(MaskPolicy::validate),
        }
    }

    fn apply(&self, task: &mut Task) {
        match self {
            Self::RandomDropout { rate, seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(*seed);
                for set in task.context_mut() {
                    for bit in set.mask_mut() {
                        // One draw per slot keeps the stream aligned with
                        // positions regardless of what is already masked.
                        let u: f64 = rng.random();
                        if u < *rate {
                            *bit = false;
                        }
                    }
                }
            }
            Self::BlockMissing { min, max, sources } => {
                for set in task.context_mut() {
                    if sources
                        .as_ref()
                        .is_some_and(|s| !s.contains(&set.source()))
                    {
                        continue;
                    }
                    let inside: Vec<bool> = set
                        .coords()
                        .iter()
                        .map(|c| {
                            c.len() == min.len()
                                && c.iter()
                                    .zip(min.iter().zip(max.iter()))
                                    .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
                        })
                        .collect();
                    for (bit, hit) in set.mask_mut().iter_mut().zip(inside) {
                        if hit {
                            *bit = false;
                        }
                    }
                }
            }
            Self::SourceDropout { sources } => {
                for set in task.context_mut() {
                    if sources.contains(&set.source()) {
                        set.mask_mut().fill(false);
                    }
                }
            }
            Self::All(policies) => {
                for p in policies {
                    p.apply(task);
                }
            }
        }
    }
}

// ── MaskingSimulator ───────────────────────────────────────────────

/// Applies [`MaskPolicy`]s while honouring a minimum context size.
///
/// The floor is the model adapter's declared minimum number of context
/// points. When a policy would leave fewer, dropped points are
/// re-admitted in canonical order (context set order, then slot order)
/// until the floor is met or nothing more can be re-admitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskingSimulator {
    floor: usize,
}

impl MaskingSimulator {
    /// Simulator with the given context floor.
    pub fn new(floor: usize) -> Self {
        Self { floor }
    }

    /// Context floor.
    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Return a copy of `task` with `policy` applied to its context.
    ///
    /// Deterministic: the same task, policy and seed always produce the
    /// same mask.
    pub fn apply_mask(&self, task: &Task, policy: &MaskPolicy) -> Result<Task, MaskError> {
        policy.validate()?;
        let mut masked = task.clone();
        policy.apply(&mut masked);

        let observed = masked.context_count();
        if observed < self.floor {
            let readmitted = self.readmit(task, &mut masked);
            warn!(
                floor = self.floor,
                observed,
                readmitted,
                "mask fell below context floor; re-admitted dropped points"
            );
        }
        Ok(masked)
    }

    fn readmit(&self, original: &Task, masked: &mut Task) -> usize {
        let mut missing = self.floor.saturating_sub(masked.context_count());
        let mut readmitted = 0;
        for (before, after) in original.context().iter().zip(masked.context_mut()) {
            for (&was, now) in before.mask().iter().zip(after.mask_mut()) {
                if missing == 0 {
                    return readmitted;
                }
                if was && !*now {
                    *now = true;
                    missing -= 1;
                    readmitted += 1;
                }
            }
        }
        readmitted
    }
}
