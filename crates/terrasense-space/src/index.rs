//! The [`SpatialIndex`]: per-source coordinate normalizers.

use indexmap::IndexMap;
use smallvec::smallvec;
use terrasense_core::{
    Coord, CoordinateReference, Domain, NormError, ReferenceBounds, SourceId, SourceRegistry,
};

use crate::error::SpaceError;
use crate::reference::ReferenceTransform;
use crate::time::TimeAxis;

#[derive(Clone, Debug, PartialEq)]
struct SourceFrame {
    reference: CoordinateReference,
    domain: Domain,
}

/// Maps every source's native coordinates into the shared unit frame.
///
/// Immutable after construction: it holds only per-source reference
/// parameters and domains, so `&SpatialIndex` can be shared freely
/// across threads.
///
/// # Examples
///
/// ```
/// use terrasense_core::*;
/// use terrasense_space::{SpatialIndex, TimeAxis};
///
/// let schema = SourceSchema {
///     name: "stations".into(),
///     variable: "t2m".into(),
///     reference: CoordinateReference::Geographic,
///     resolution: Resolution::Irregular,
///     missing: MissingValue::Nan,
///     domain: Domain::new_2d([50.0, -5.0], [55.0, 0.0]),
/// };
/// let source = ObservationSource::new(schema, SourceData::Points(vec![])).unwrap();
/// let mut builder = SourceRegistry::builder();
/// let id = builder.register(source).unwrap();
/// let registry = builder.build().unwrap();
///
/// let bounds = SpatialIndex::fit_bounds(&registry).unwrap();
/// let index = SpatialIndex::new(&registry, bounds, TimeAxis::default()).unwrap();
///
/// let n = index.normalize(id, &[52.5, -2.5]).unwrap();
/// assert_eq!(n.as_slice(), &[0.5, 0.5]);
/// let raw = index.denormalize(id, &n).unwrap();
/// assert_eq!(raw.as_slice(), &[52.5, -2.5]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialIndex {
    bounds: ReferenceBounds,
    frames: IndexMap<SourceId, SourceFrame>,
    time: TimeAxis,
}

impl SpatialIndex {
    /// Build an index over every registered source.
    ///
    /// # Errors
    ///
    /// [`SpaceError::InvalidReference`] if a source's reference cannot be
    /// inverted or its dimensionality disagrees with the shared bounds.
    pub fn new(
        registry: &SourceRegistry,
        bounds: ReferenceBounds,
        time: TimeAxis,
    ) -> Result<Self, SpaceError> {
        let mut frames = IndexMap::with_capacity(registry.len());
        for (id, source) in registry.iter() {
            let schema = source.schema();
            schema
                .reference
                .validate()
                .map_err(|reason| SpaceError::InvalidReference { source: id, reason })?;
            if schema.domain.ndim() != bounds.ndim() {
                return Err(SpaceError::InvalidReference {
                    source: id,
                    reason: format!(
                        "domain has {} axes, shared frame has {}",
                        schema.domain.ndim(),
                        bounds.ndim()
                    ),
                });
            }
            frames.insert(
                id,
                SourceFrame {
                    reference: schema.reference.clone(),
                    domain: schema.domain.clone(),
                },
            );
        }
        Ok(Self {
            bounds,
            frames,
            time,
        })
    }

    /// Smallest reference box enclosing every source's domain.
    ///
    /// All references are affine per axis, so mapping the domain corners
    /// is enough.
    pub fn fit_bounds(registry: &SourceRegistry) -> Result<ReferenceBounds, NormError> {
        let mut min: Coord = smallvec![f64::INFINITY, f64::INFINITY];
        let mut max: Coord = smallvec![f64::NEG_INFINITY, f64::NEG_INFINITY];
        for (_, source) in registry.iter() {
            let schema = source.schema();
            let d = &schema.domain;
            let corners = [
                [d.min[0], d.min[1]],
                [d.min[0], d.max[1]],
                [d.max[0], d.min[1]],
                [d.max[0], d.max[1]],
            ];
            for corner in corners {
                let r = schema.reference.to_reference(&corner);
                for axis in 0..2 {
                    min[axis] = min[axis].min(r[axis]);
                    max[axis] = max[axis].max(r[axis]);
                }
            }
        }
        // A degenerate axis (single station row) still needs a non-empty span.
        for axis in 0..2 {
            if min[axis] == max[axis] {
                min[axis] -= 0.5;
                max[axis] += 0.5;
            }
        }
        ReferenceBounds::new(min, max)
    }

    /// Shared reference bounds.
    pub fn bounds(&self) -> &ReferenceBounds {
        &self.bounds
    }

    /// Normalized time axis.
    pub fn time_axis(&self) -> &TimeAxis {
        &self.time
    }

    /// Declared domain of `source`.
    pub fn domain(&self, source: SourceId) -> Result<&Domain, SpaceError> {
        Ok(&self.frame(source)?.domain)
    }

    /// Native → normalized.
    ///
    /// # Errors
    ///
    /// [`SpaceError::CoordinateRange`] if `raw` is outside the source's
    /// declared domain, non-finite, or of the wrong dimensionality.
    pub fn normalize(&self, source: SourceId, raw: &[f64]) -> Result<Coord, SpaceError> {
        let frame = self.frame(source)?;
        frame.domain.check(source, raw)?;
        Ok(self.bounds.normalize(&frame.reference.to_reference(raw)))
    }

    /// Normalized → native. Exact inverse of [`normalize`](Self::normalize)
    /// up to floating-point rounding; no domain check.
    pub fn denormalize(&self, source: SourceId, normalized: &[f64]) -> Result<Coord, SpaceError> {
        let frame = self.frame(source)?;
        Ok(frame
            .reference
            .from_reference(&self.bounds.denormalize(normalized)))
    }

    /// Normalized → shared `(lat, lon)` reference.
    pub fn to_reference(&self, normalized: &[f64]) -> Coord {
        self.bounds.denormalize(normalized)
    }

    fn frame(&self, source: SourceId) -> Result<&SourceFrame, SpaceError> {
        self.frames
            .get(&source)
            .ok_or(SpaceError::UnknownSource { source })
    }
}
