//! Conversions between native coordinate references and the shared
//! geographic reference `(lat, lon)` in degrees.

use smallvec::smallvec;
use terrasense_core::{Coord, CoordinateReference};

/// Metres per degree of latitude used by the local projection.
pub const METRES_PER_DEGREE: f64 = 111_320.0;

/// Bijective mapping between a native reference and `(lat, lon)`.
///
/// Implementations must satisfy
/// `from_reference(to_reference(x)) == x` to floating-point precision
/// for every `x` accepted by [`validate`](Self::validate).
pub trait ReferenceTransform {
    /// Check the reference parameters make the mapping invertible.
    fn validate(&self) -> Result<(), String>;

    /// Native → `(lat, lon)`.
    fn to_reference(&self, native: &[f64]) -> Coord;

    /// `(lat, lon)` → native.
    fn from_reference(&self, reference: &[f64]) -> Coord;
}

impl ReferenceTransform for CoordinateReference {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Geographic => Ok(()),
            Self::Projected {
                origin_lat,
                origin_lon,
            } => {
                if !origin_lat.is_finite() || !origin_lon.is_finite() {
                    return Err("projection origin must be finite".into());
                }
                if origin_lat.abs() >= 90.0 {
                    return Err(format!(
                        "projection origin latitude {origin_lat} is at or beyond a pole"
                    ));
                }
                Ok(())
            }
            Self::GridIndex { origin, spacing } => {
                if origin.iter().chain(spacing.iter()).any(|v| !v.is_finite()) {
                    return Err("grid origin and spacing must be finite".into());
                }
                if spacing.iter().any(|&s| s == 0.0) {
                    return Err("grid spacing must be non-zero".into());
                }
                Ok(())
            }
        }
    }

    fn to_reference(&self, native: &[f64]) -> Coord {
        match self {
            Self::Geographic => Coord::from_slice(native),
            Self::Projected {
                origin_lat,
                origin_lon,
            } => {
                let (north, east) = (native[0], native[1]);
                smallvec![
                    origin_lat + north / METRES_PER_DEGREE,
                    origin_lon + east / (METRES_PER_DEGREE * origin_lat.to_radians().cos()),
                ]
            }
            Self::GridIndex { origin, spacing } => smallvec![
                origin[0] + native[0] * spacing[0],
                origin[1] + native[1] * spacing[1],
            ],
        }
    }

    fn from_reference(&self, reference: &[f64]) -> Coord {
        match self {
            Self::Geographic => Coord::from_slice(reference),
            Self::Projected {
                origin_lat,
                origin_lon,
            } => {
                let (lat, lon) = (reference[0], reference[1]);
                smallvec![
                    (lat - origin_lat) * METRES_PER_DEGREE,
                    (lon - origin_lon) * METRES_PER_DEGREE * origin_lat.to_radians().cos(),
                ]
            }
            Self::GridIndex { origin, spacing } => smallvec![
                (reference[0] - origin[0]) / spacing[0],
                (reference[1] - origin[1]) / spacing[1],
            ],
        }
    }
}
