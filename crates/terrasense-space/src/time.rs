//! Normalized time axis.

use serde::{Deserialize, Serialize};
use terrasense_core::Timestamp;

/// Affine mapping of timestamps onto a normalized scalar axis.
///
/// `normalize(t) = (t - origin) / unit_seconds`. Offsets between two
/// timestamps use the same unit, so a context point observed one `unit`
/// before the task reference time has offset `-1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    origin: Timestamp,
    unit_seconds: f64,
}

impl Default for TimeAxis {
    /// Unix epoch origin, one-day unit.
    fn default() -> Self {
        Self {
            origin: Timestamp(0),
            unit_seconds: 86_400.0,
        }
    }
}

impl TimeAxis {
    /// Build an axis. Returns `None` for a non-positive or non-finite unit.
    pub fn new(origin: Timestamp, unit_seconds: f64) -> Option<Self> {
        (unit_seconds.is_finite() && unit_seconds > 0.0).then_some(Self {
            origin,
            unit_seconds,
        })
    }

    /// Axis origin.
    pub fn origin(&self) -> Timestamp {
        self.origin
    }

    /// Seconds per normalized unit.
    pub fn unit_seconds(&self) -> f64 {
        self.unit_seconds
    }

    /// Timestamp → axis position.
    pub fn normalize(&self, t: Timestamp) -> f64 {
        t.offset_from(self.origin) as f64 / self.unit_seconds
    }

    /// Axis position → timestamp, rounded to the nearest second.
    pub fn denormalize(&self, x: f64) -> Timestamp {
        Timestamp(self.origin.0 + (x * self.unit_seconds).round() as i64)
    }

    /// Normalized offset of `observed` relative to `reference`.
    pub fn offset(&self, observed: Timestamp, reference: Timestamp) -> f64 {
        observed.offset_from(reference) as f64 / self.unit_seconds
    }
}
