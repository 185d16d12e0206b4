//! Observation source schemas and their raw data.
//!
//! An [`ObservationSource`] pairs a declared [`SourceSchema`] with either
//! tabular point records or a gridded array. Sources are validated once at
//! construction and immutable afterwards.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::cmp::Ordering;

use crate::error::{CoordinateRangeError, RegistryError};
use crate::id::{Coord, SourceId, Timestamp};

/// Number of spatial axes every source uses: `(y, x)`-like pairs such as
/// `(lat, lon)`, `(north, east)` or `(row, col)`.
pub const SPATIAL_NDIM: usize = 2;

/// Native coordinate reference of a source.
///
/// Every reference converts bijectively onto the shared geographic
/// reference `(lat, lon)` in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CoordinateReference {
    /// Latitude / longitude in degrees.
    Geographic,
    /// Metres north / east of an origin (local equirectangular projection).
    Projected {
        /// Origin latitude in degrees.
        origin_lat: f64,
        /// Origin longitude in degrees.
        origin_lon: f64,
    },
    /// Fractional row / column indices of a regular lat/lon grid.
    GridIndex {
        /// `(lat, lon)` of cell `(0, 0)`.
        origin: [f64; 2],
        /// Degrees per row and per column.
        spacing: [f64; 2],
    },
}

/// Native sampling resolution of a source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// Regular grid with the given spacing in native units.
    Grid {
        /// Cell spacing in native units.
        spacing: f64,
    },
    /// Irregularly placed points (stations, swath footprints).
    Irregular,
}

/// How a source marks missing values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MissingValue {
    /// Only NaN marks a missing value.
    Nan,
    /// A sentinel value (NaN is also treated as missing).
    Sentinel(f64),
}

impl MissingValue {
    /// Returns `true` if `v` is missing under this convention.
    pub fn is_missing(&self, v: f64) -> bool {
        if v.is_nan() {
            return true;
        }
        match self {
            Self::Nan => false,
            Self::Sentinel(s) => v == *s,
        }
    }
}

/// Inclusive axis-aligned box of valid native coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Lower corner.
    pub min: Coord,
    /// Upper corner.
    pub max: Coord,
}

impl Domain {
    /// Build a two-axis domain.
    pub fn new_2d(min: [f64; 2], max: [f64; 2]) -> Self {
        Self {
            min: smallvec![min[0], min[1]],
            max: smallvec![max[0], max[1]],
        }
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.min.len()
    }

    /// Returns `true` if `coord` is finite, has the right dimensionality,
    /// and lies inside the box.
    pub fn contains(&self, coord: &[f64]) -> bool {
        coord.len() == self.ndim()
            && coord
                .iter()
                .zip(self.min.iter().zip(self.max.iter()))
                .all(|(&c, (&lo, &hi))| c.is_finite() && c >= lo && c <= hi)
    }

    /// Check `coord` against the domain, naming `source` on failure.
    pub fn check(&self, source: SourceId, coord: &[f64]) -> Result<(), CoordinateRangeError> {
        if self.contains(coord) {
            Ok(())
        } else {
            Err(CoordinateRangeError {
                source,
                coord: Coord::from_slice(coord),
                bounds: self.describe(),
            })
        }
    }

    /// Human-readable box, e.g. `[0, 10] x [-5, 5]`.
    pub fn describe(&self) -> String {
        self.min
            .iter()
            .zip(self.max.iter())
            .map(|(lo, hi)| format!("[{lo}, {hi}]"))
            .collect::<Vec<_>>()
            .join(" x ")
    }

    fn is_well_formed(&self) -> bool {
        self.min.len() == self.max.len()
            && self
                .min
                .iter()
                .zip(self.max.iter())
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo <= hi)
    }
}

/// Declared schema of an observation source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    /// Unique source name, e.g. `"station_temp"`.
    pub name: String,
    /// Physical variable observed, e.g. `"t2m"`. Keys the normalization
    /// parameters; several sources may observe the same variable.
    pub variable: String,
    /// Native coordinate reference.
    pub reference: CoordinateReference,
    /// Native sampling resolution.
    pub resolution: Resolution,
    /// Missing-value convention.
    pub missing: MissingValue,
    /// Valid native coordinate domain.
    pub domain: Domain,
}

/// A single tabular observation.
#[derive(Clone, Debug, PartialEq)]
pub struct PointRecord {
    /// Native coordinate.
    pub coords: Coord,
    /// Observation time.
    pub time: Timestamp,
    /// Observed value (may be missing per the schema).
    pub value: f64,
}

impl PointRecord {
    /// Build a two-axis record.
    pub fn new(coords: [f64; 2], time: Timestamp, value: f64) -> Self {
        Self {
            coords: smallvec![coords[0], coords[1]],
            time,
            value,
        }
    }
}

/// Coordinate axes of a regular grid, in native units.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAxes {
    /// Values along the first axis (rows).
    pub axis0: Vec<f64>,
    /// Values along the second axis (columns).
    pub axis1: Vec<f64>,
}

impl GridAxes {
    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.axis0.len(), self.axis1.len())
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.axis0.len() * self.axis1.len()
    }

    /// Native coordinate of cell `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Coord {
        smallvec![self.axis0[row], self.axis1[col]]
    }

    /// Nearest cell to `coord`, if it lies within half a spacing of one.
    pub fn nearest_cell(&self, coord: &[f64]) -> Option<(usize, usize)> {
        if coord.len() != SPATIAL_NDIM {
            return None;
        }
        Some((
            nearest_on_axis(&self.axis0, coord[0])?,
            nearest_on_axis(&self.axis1, coord[1])?,
        ))
    }
}

/// Index of the axis value nearest to `v`, within half a spacing.
fn nearest_on_axis(axis: &[f64], v: f64) -> Option<usize> {
    let (best, dist) = axis
        .iter()
        .enumerate()
        .map(|(i, a)| (i, (a - v).abs()))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let half = if axis.len() > 1 {
        (axis[1] - axis[0]).abs() / 2.0
    } else {
        0.0
    };
    (dist <= half + f64::EPSILON * v.abs().max(1.0)).then_some(best)
}

/// A time series of 2D grids.
///
/// `values` is laid out time-major then row-major:
/// `values[t * rows * cols + r * cols + c]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GriddedArray {
    /// Grid axes.
    pub axes: GridAxes,
    /// Strictly increasing slice times.
    pub times: Vec<Timestamp>,
    /// Cell values.
    pub values: Vec<f64>,
}

impl GriddedArray {
    /// Values of slice `t`.
    pub fn slice(&self, t: usize) -> &[f64] {
        let n = self.axes.cell_count();
        &self.values[t * n..(t + 1) * n]
    }
}

/// Raw data of a source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceData {
    /// Tabular `(coords, time, value)` records.
    Points(Vec<PointRecord>),
    /// Gridded time series.
    Grid(GriddedArray),
}

/// A validated, immutable observation source.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSource {
    schema: SourceSchema,
    data: SourceData,
    times: Vec<Timestamp>,
}

impl ObservationSource {
    /// Validate `data` against `schema`.
    ///
    /// Point records are sorted into canonical order (time, then
    /// coordinates) so every downstream selection is reproducible.
    pub fn new(schema: SourceSchema, data: SourceData) -> Result<Self, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidData {
            name: schema.name.clone(),
            reason,
        };

        if !schema.domain.is_well_formed() || schema.domain.ndim() != SPATIAL_NDIM {
            return Err(invalid(format!(
                "domain must be a well-formed {SPATIAL_NDIM}D box, got {}",
                schema.domain.describe()
            )));
        }

        let (data, times) = match data {
            SourceData::Points(mut records) => {
                if let Some(bad) = records.iter().find(|r| r.coords.len() != SPATIAL_NDIM) {
                    return Err(invalid(format!(
                        "record at {} has {} axes",
                        bad.time,
                        bad.coords.len()
                    )));
                }
                if let Some(bad) = records
                    .iter()
                    .find(|r| !schema.domain.contains(&r.coords))
                {
                    return Err(invalid(format!(
                        "record at {} lies at {:?}, outside {}",
                        bad.time,
                        bad.coords.as_slice(),
                        schema.domain.describe()
                    )));
                }
                records.sort_by(canonical_record_order);
                let mut times: Vec<Timestamp> = records.iter().map(|r| r.time).collect();
                times.dedup();
                (SourceData::Points(records), times)
            }
            SourceData::Grid(grid) => {
                if matches!(schema.resolution, Resolution::Irregular) {
                    return Err(invalid("gridded data declared as irregular".into()));
                }
                let (rows, cols) = grid.axes.shape();
                if rows == 0 || cols == 0 {
                    return Err(invalid("grid has an empty axis".into()));
                }
                if !is_strictly_monotonic(&grid.axes.axis0)
                    || !is_strictly_monotonic(&grid.axes.axis1)
                {
                    return Err(invalid("grid axes must be strictly monotonic".into()));
                }
                // Axes are monotonic, so opposite corners bound every cell.
                let corners = [grid.axes.cell(0, 0), grid.axes.cell(rows - 1, cols - 1)];
                if let Some(bad) = corners.iter().find(|c| !schema.domain.contains(c)) {
                    return Err(invalid(format!(
                        "grid cell at {:?} lies outside {}",
                        bad.as_slice(),
                        schema.domain.describe()
                    )));
                }
                if grid.times.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(invalid("grid times must be strictly increasing".into()));
                }
                let expected = grid.times.len() * rows * cols;
                if grid.values.len() != expected {
                    return Err(invalid(format!(
                        "expected {expected} values ({} x {rows} x {cols}), got {}",
                        grid.times.len(),
                        grid.values.len()
                    )));
                }
                let times = grid.times.clone();
                (SourceData::Grid(grid), times)
            }
        };

        Ok(Self {
            schema,
            data,
            times,
        })
    }

    /// Declared schema.
    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    /// Raw data.
    pub fn data(&self) -> &SourceData {
        &self.data
    }

    /// Distinct observation times, ascending.
    pub fn times(&self) -> &[Timestamp] {
        &self.times
    }

    /// Returns `true` if the source is gridded.
    pub fn is_gridded(&self) -> bool {
        matches!(self.data, SourceData::Grid(_))
    }
}

/// Canonical record order: time, then coordinates lexicographically.
fn canonical_record_order(a: &PointRecord, b: &PointRecord) -> Ordering {
    a.time.cmp(&b.time).then_with(|| {
        a.coords
            .iter()
            .zip(b.coords.iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn is_strictly_monotonic(axis: &[f64]) -> bool {
    axis.iter().all(|v| v.is_finite())
        && (axis.windows(2).all(|w| w[0] < w[1]) || axis.windows(2).all(|w| w[0] > w[1]))
}
