//! Persisted normalization parameters.
//!
//! [`NormalizationParams`] holds one invertible value transform per
//! variable plus the shared coordinate bounds. It is fitted once from
//! training statistics, saved next to the trained weights, and shared
//! read-only (typically as `Arc<NormalizationParams>`) by the task loader
//! and the prediction aggregator. There is no mutating API.
//!
//! The on-disk record is versioned JSON:
//!
//! ```text
//! { "version": 1,
//!   "bounds": { "min": [lat_min, lon_min], "max": [lat_max, lon_max] },
//!   "variables": { "t2m": { "kind": "mean_std", "scale": 4.2, "offset": 281.5 } } }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::error::NormError;
use crate::id::Coord;

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Kind of per-variable value transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Pass values through unchanged.
    Identity,
    /// Standardize to zero mean, unit standard deviation.
    MeanStd,
    /// Map `[min, max]` onto `[-1, 1]`.
    MinMax,
}

/// An affine, invertible value transform: `n = (x - offset) / scale`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableTransform {
    kind: TransformKind,
    scale: f64,
    offset: f64,
}

impl VariableTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        kind: TransformKind::Identity,
        scale: 1.0,
        offset: 0.0,
    };

    /// Build a transform from explicit parameters.
    pub fn new(kind: TransformKind, scale: f64, offset: f64) -> Result<Self, NormError> {
        let t = Self {
            kind,
            scale,
            offset,
        };
        t.validate("<explicit>")?;
        Ok(t)
    }

    /// Fit a transform of `kind` from sample statistics.
    ///
    /// Non-finite samples are ignored. A degenerate spread (all samples
    /// equal) falls back to a unit scale so the transform stays invertible.
    pub fn fit(kind: TransformKind, samples: &[f64]) -> Result<Self, NormError> {
        if kind == TransformKind::Identity {
            return Ok(Self::IDENTITY);
        }
        let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(NormError::InvalidParameter {
                variable: "<fit>".into(),
                reason: "no finite samples".into(),
            });
        }
        let n = finite.len() as f64;
        let (scale, offset) = match kind {
            TransformKind::MeanStd => {
                let mean = finite.iter().sum::<f64>() / n;
                let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (var.sqrt(), mean)
            }
            TransformKind::MinMax => {
                let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                ((hi - lo) / 2.0, (hi + lo) / 2.0)
            }
            TransformKind::Identity => unreachable!("handled above"),
        };
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Ok(Self {
            kind,
            scale,
            offset,
        })
    }

    /// Transform kind.
    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Offset.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Physical → normalized.
    pub fn normalize(&self, x: f64) -> f64 {
        (x - self.offset) / self.scale
    }

    /// Normalized → physical.
    pub fn denormalize(&self, n: f64) -> f64 {
        n * self.scale + self.offset
    }

    /// Physical variance → normalized variance.
    pub fn normalize_variance(&self, v: f64) -> f64 {
        v / (self.scale * self.scale)
    }

    /// Normalized variance → physical variance.
    pub fn denormalize_variance(&self, v: f64) -> f64 {
        v * self.scale * self.scale
    }

    fn validate(&self, variable: &str) -> Result<(), NormError> {
        if !self.scale.is_finite() || self.scale == 0.0 || !self.offset.is_finite() {
            return Err(NormError::InvalidParameter {
                variable: variable.into(),
                reason: format!(
                    "scale must be finite and non-zero and offset finite, got scale={} offset={}",
                    self.scale, self.offset
                ),
            });
        }
        Ok(())
    }
}

/// Bounds of the shared reference frame, mapped onto the unit box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBounds {
    min: Coord,
    max: Coord,
}

impl ReferenceBounds {
    /// Build bounds; every axis must satisfy `min < max`.
    pub fn new(min: Coord, max: Coord) -> Result<Self, NormError> {
        let b = Self { min, max };
        b.validate()?;
        Ok(b)
    }

    /// Lower corner in reference units.
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Upper corner in reference units.
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.min.len()
    }

    /// Reference → unit frame.
    pub fn normalize(&self, reference: &[f64]) -> Coord {
        reference
            .iter()
            .enumerate()
            .map(|(i, v)| (v - self.min[i]) / (self.max[i] - self.min[i]))
            .collect()
    }

    /// Unit frame → reference.
    pub fn denormalize(&self, normalized: &[f64]) -> Coord {
        normalized
            .iter()
            .enumerate()
            .map(|(i, n)| n * (self.max[i] - self.min[i]) + self.min[i])
            .collect()
    }

    fn validate(&self) -> Result<(), NormError> {
        let ok = !self.min.is_empty()
            && self.min.len() == self.max.len()
            && self
                .min
                .iter()
                .zip(self.max.iter())
                .all(|(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi);
        if ok {
            Ok(())
        } else {
            Err(NormError::InvalidParameter {
                variable: "coords".into(),
                reason: format!(
                    "reference bounds need min < max on every axis, got {:?} .. {:?}",
                    self.min.as_slice(),
                    self.max.as_slice()
                ),
            })
        }
    }
}

/// Versioned, immutable normalization record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    version: u32,
    bounds: ReferenceBounds,
    variables: IndexMap<String, VariableTransform>,
}

impl NormalizationParams {
    /// Start building a record over the given coordinate bounds.
    pub fn builder(bounds: ReferenceBounds) -> NormalizationBuilder {
        NormalizationBuilder {
            bounds,
            entries: Vec::new(),
        }
    }

    /// Format version of this record.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Shared coordinate bounds.
    pub fn bounds(&self) -> &ReferenceBounds {
        &self.bounds
    }

    /// Transform for `variable`.
    pub fn get(&self, variable: &str) -> Result<&VariableTransform, NormError> {
        self.variables
            .get(variable)
            .ok_or_else(|| NormError::UnknownVariable {
                name: variable.into(),
            })
    }

    /// Variable names in insertion order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Write the record as pretty-printed JSON.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), NormError> {
        serde_json::to_writer_pretty(writer, self).map_err(|e| NormError::Serialization {
            reason: e.to_string(),
        })
    }

    /// Read and validate a record written by [`save`](Self::save).
    pub fn load<R: Read>(reader: R) -> Result<Self, NormError> {
        let params: Self =
            serde_json::from_reader(reader).map_err(|e| NormError::Serialization {
                reason: e.to_string(),
            })?;
        if params.version != FORMAT_VERSION {
            return Err(NormError::UnsupportedVersion {
                found: params.version,
                expected: FORMAT_VERSION,
            });
        }
        params.bounds.validate()?;
        for (name, t) in &params.variables {
            t.validate(name)?;
        }
        Ok(params)
    }
}

/// Builder for [`NormalizationParams`].
///
/// Fitting errors are collected and reported by [`build`](Self::build).
pub struct NormalizationBuilder {
    bounds: ReferenceBounds,
    entries: Vec<(String, Result<VariableTransform, NormError>)>,
}

impl NormalizationBuilder {
    /// Register an explicit transform.
    pub fn transform(mut self, variable: impl Into<String>, t: VariableTransform) -> Self {
        self.entries.push((variable.into(), Ok(t)));
        self
    }

    /// Fit a transform of `kind` from `samples`.
    pub fn fit(mut self, variable: impl Into<String>, kind: TransformKind, samples: &[f64]) -> Self {
        let variable = variable.into();
        let fitted = VariableTransform::fit(kind, samples).map_err(|e| match e {
            NormError::InvalidParameter { reason, .. } => NormError::InvalidParameter {
                variable: variable.clone(),
                reason,
            },
            other => other,
        });
        self.entries.push((variable, fitted));
        self
    }

    /// Validate and freeze the record.
    ///
    /// # Errors
    ///
    /// Returns the first fitting error, or
    /// [`NormError::InvalidParameter`] for a duplicated variable.
    pub fn build(self) -> Result<NormalizationParams, NormError> {
        let mut variables = IndexMap::with_capacity(self.entries.len());
        for (name, fitted) in self.entries {
            let t = fitted?;
            t.validate(&name)?;
            if variables.insert(name.clone(), t).is_some() {
                return Err(NormError::InvalidParameter {
                    variable: name,
                    reason: "registered twice".into(),
                });
            }
        }
        Ok(NormalizationParams {
            version: FORMAT_VERSION,
            bounds: self.bounds,
            variables,
        })
    }
}
