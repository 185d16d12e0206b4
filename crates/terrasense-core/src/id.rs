//! Strongly-typed identifiers and the [`Coord`] type alias.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Identifies a registered observation source.
///
/// Sources are registered in order and assigned sequential IDs.
/// `SourceId(n)` corresponds to the n-th registered source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SourceId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Observation time in whole seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Absolute distance to another timestamp, in seconds.
    pub fn abs_diff(self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Signed offset `self - other` in seconds.
    pub fn offset_from(self, other: Timestamp) -> i64 {
        self.0 - other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// A spatial coordinate: one `f64` per axis.
///
/// Raw coordinates are expressed in a source's native reference;
/// normalized coordinates live in the shared unit frame. Two axes
/// (and up to four) fit inline without allocation.
pub type Coord = SmallVec<[f64; 4]>;
