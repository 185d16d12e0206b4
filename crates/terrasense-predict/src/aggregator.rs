//! The [`Aggregator`]: normalized distributions to physical predictions.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use terrasense_core::{
    Coord, Marginals, NormalizationParams, PredictiveDistribution, SourceId, TargetDistribution,
};
use terrasense_space::SpatialIndex;

use crate::config::{AggregatorConfig, MergePolicy};
use crate::error::AggregateError;

/// Normalized locations rounding to the same multiple of this on every
/// axis are the same place.
const LOCATION_QUANTUM: f64 = 1e-9;

type LocationKey = SmallVec<[i64; 2]>;

/// One target in physical units.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalPoint {
    /// Location in the target source's native reference.
    pub coord: Coord,
    /// Location in the shared normalized frame.
    pub normalized: Coord,
    /// Predictive mean.
    pub mean: f64,
    /// Predictive variance.
    pub variance: f64,
    /// Values at the aggregator's quantile levels, present only when the
    /// backend returned samples.
    pub quantiles: Option<Vec<f64>>,
}

/// One target set in physical units, index-aligned with the task's set.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalTargetSet {
    /// Target source.
    pub source: SourceId,
    /// Target variable.
    pub variable: String,
    /// Per-target predictions, in task order.
    pub points: Vec<PhysicalPoint>,
}

/// Every target set of a task, in physical units.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalPrediction {
    /// Per-set predictions, in task order.
    pub sets: Vec<PhysicalTargetSet>,
    /// Levels the `quantiles` entries refer to.
    pub quantile_levels: Vec<f64>,
}

impl PhysicalPrediction {
    /// Total number of targets.
    pub fn len(&self) -> usize {
        self.sets.iter().map(|s| s.points.len()).sum()
    }

    /// Returns `true` if there are no targets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All points in task order.
    pub fn points(&self) -> impl Iterator<Item = &PhysicalPoint> {
        self.sets.iter().flat_map(|s| s.points.iter())
    }
}

/// Combined estimate of one variable at one location.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedEstimate {
    /// Variable.
    pub variable: String,
    /// Location in the shared normalized frame.
    pub normalized: Coord,
    /// Location in the shared geographic reference.
    pub reference: Coord,
    /// Merged mean.
    pub mean: f64,
    /// Merged variance.
    pub variance: f64,
    /// Number of estimates combined.
    pub members: usize,
}

/// Maps model output back to physical units.
///
/// Holds the normalization parameters and spatial index used to build
/// the tasks, so results are the exact inverse of task construction.
#[derive(Clone, Debug)]
pub struct Aggregator {
    params: Arc<NormalizationParams>,
    index: Arc<SpatialIndex>,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Create an aggregator with a fixed merge policy and quantile levels.
    ///
    /// # Errors
    ///
    /// [`AggregateError::Config`] for an invalid config,
    /// [`AggregateError::Inconsistent`] if `index` was built over other
    /// reference bounds than `params`.
    pub fn new(
        params: Arc<NormalizationParams>,
        index: Arc<SpatialIndex>,
        config: AggregatorConfig,
    ) -> Result<Self, AggregateError> {
        config.validate()?;
        if index.bounds() != params.bounds() {
            return Err(AggregateError::Inconsistent {
                reason: format!(
                    "spatial index spans {:?}..{:?} but normalization parameters span {:?}..{:?}",
                    index.bounds().min(),
                    index.bounds().max(),
                    params.bounds().min(),
                    params.bounds().max()
                ),
            });
        }
        Ok(Self {
            params,
            index,
            config,
        })
    }

    /// Merge policy.
    pub fn merge_policy(&self) -> MergePolicy {
        self.config.merge
    }

    /// Configuration.
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Unnormalize every target of `distribution`.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::Inconsistent`] if `distribution` carries
    ///   different normalization parameters than the aggregator.
    /// - [`AggregateError::Norm`] if a variable has no normalization entry.
    /// - [`AggregateError::Space`] if a target source is not indexed.
    pub fn to_physical(
        &self,
        distribution: &PredictiveDistribution,
    ) -> Result<PhysicalPrediction, AggregateError> {
        let carried = distribution.params();
        if !Arc::ptr_eq(carried, &self.params) && **carried != *self.params {
            return Err(AggregateError::Inconsistent {
                reason: "distribution was normalized with other parameters than the aggregator"
                    .into(),
            });
        }
        let sets = distribution
            .targets()
            .iter()
            .map(|t| self.physical_set(t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PhysicalPrediction {
            sets,
            quantile_levels: self.config.quantile_levels.clone(),
        })
    }

    fn physical_set(&self, target: &TargetDistribution) -> Result<PhysicalTargetSet, AggregateError> {
        let transform = self.params.get(&target.variable)?;
        let mut points = Vec::with_capacity(target.len());
        for (i, normalized) in target.coords.iter().enumerate() {
            let coord = self.index.denormalize(target.source, normalized)?;
            let quantiles = match &target.marginals {
                Marginals::Samples { draws } => {
                    let mut column: Vec<f64> =
                        draws.iter().map(|d| transform.denormalize(d[i])).collect();
                    column.sort_by(f64::total_cmp);
                    Some(
                        self.config
                            .quantile_levels
                            .iter()
                            .map(|&p| quantile(&column, p))
                            .collect(),
                    )
                }
                Marginals::Gaussian { .. } => None,
            };
            points.push(PhysicalPoint {
                coord,
                normalized: normalized.clone(),
                mean: transform.denormalize(target.marginals.mean(i)),
                variance: transform.denormalize_variance(target.marginals.variance(i)),
                quantiles,
            });
        }
        Ok(PhysicalTargetSet {
            source: target.source,
            variable: target.variable.clone(),
            points,
        })
    }

    /// Combine estimates of the same variable at the same normalized
    /// location across target sets.
    ///
    /// Every location appears once, in order of first appearance;
    /// unshared locations pass through with `members == 1`.
    pub fn merge_overlapping(&self, prediction: &PhysicalPrediction) -> Vec<MergedEstimate> {
        type Locations = IndexMap<LocationKey, (Coord, Vec<(f64, f64)>)>;
        let mut groups: IndexMap<&str, Locations> = IndexMap::new();
        for set in &prediction.sets {
            let locations = groups.entry(set.variable.as_str()).or_default();
            for point in &set.points {
                locations
                    .entry(location_key(&point.normalized))
                    .or_insert_with(|| (point.normalized.clone(), Vec::new()))
                    .1
                    .push((point.mean, point.variance));
            }
        }

        let mut merged = Vec::new();
        for (variable, locations) in groups {
            for (normalized, members) in locations.into_values() {
                let Some((mean, variance)) = self.config.merge.merge(&members) else {
                    continue;
                };
                if members.len() > 1 {
                    debug!(variable, members = members.len(), mean, variance, "merged overlap");
                }
                merged.push(MergedEstimate {
                    variable: variable.to_string(),
                    reference: self.index.to_reference(&normalized),
                    normalized,
                    mean,
                    variance,
                    members: members.len(),
                });
            }
        }
        merged
    }
}

fn location_key(normalized: &[f64]) -> LocationKey {
    normalized
        .iter()
        .map(|x| (x / LOCATION_QUANTUM).round() as i64)
        .collect()
}

/// Linear-interpolation quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = p * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use terrasense_core::{NormError, ReferenceBounds, TargetSet, Task, TimeQuery, Timestamp};
    use terrasense_test_utils::fixtures::{self, World};

    fn aggregator(world: &World, merge: MergePolicy) -> Aggregator {
        Aggregator::new(
            Arc::clone(&world.params),
            Arc::clone(&world.index),
            AggregatorConfig {
                merge,
                quantile_levels: vec![0.0, 0.5, 1.0],
            },
        )
        .unwrap()
    }

    fn task(sets: &[(&str, Vec<Coord>)]) -> Task {
        let targets = sets
            .iter()
            .map(|(var, coords)| TargetSet::new(SourceId(0), *var, coords.clone(), None).unwrap())
            .collect();
        Task::new(TimeQuery::At(Timestamp(0)), vec![], targets).unwrap()
    }

    #[test]
    fn quantile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&s, 0.0), 1.0);
        assert_eq!(quantile(&s, 0.5), 3.0);
        assert_eq!(quantile(&s, 0.625), 3.5);
        assert_eq!(quantile(&s, 1.0), 5.0);
        assert_eq!(quantile(&[7.0], 0.3), 7.0);
    }

    #[test]
    fn gaussian_values_are_unnormalized() {
        let world = fixtures::station_world();
        let agg = aggregator(&world, MergePolicy::InverseVariance);
        let t = task(&[("t2m", vec![smallvec![0.5, 0.5], smallvec![0.0, 1.0]])]);
        let dist = PredictiveDistribution::new(
            &t,
            vec![Marginals::Gaussian {
                mean: vec![0.4, -1.0],
                variance: vec![0.04, 1.0],
            }],
            Arc::clone(&world.params),
        )
        .unwrap();

        let phys = agg.to_physical(&dist).unwrap();
        assert_eq!(phys.len(), 2);
        let p: Vec<_> = phys.points().collect();
        assert!((p[0].mean - 12.0).abs() < 1e-12);
        assert!((p[0].variance - 1.0).abs() < 1e-12);
        assert!((p[1].mean - 5.0).abs() < 1e-12);
        assert!((p[1].variance - 25.0).abs() < 1e-12);
        assert!((p[0].coord[0] - 53.0).abs() < 1e-9);
        assert!((p[0].coord[1] + 2.0).abs() < 1e-9);
        assert!((p[1].coord[0] - 50.0).abs() < 1e-9);
        assert!((p[1].coord[1] - 2.0).abs() < 1e-9);
        assert!(p[0].quantiles.is_none());
    }

    #[test]
    fn samples_produce_quantiles() {
        let world = fixtures::station_world();
        let agg = aggregator(&world, MergePolicy::InverseVariance);
        let t = task(&[("t2m", vec![smallvec![0.5, 0.5]])]);
        let dist = PredictiveDistribution::new(
            &t,
            vec![Marginals::Samples {
                draws: vec![vec![1.0], vec![-1.0], vec![0.0]],
            }],
            Arc::clone(&world.params),
        )
        .unwrap();
        let phys = agg.to_physical(&dist).unwrap();
        let point = &phys.sets[0].points[0];
        assert_eq!(point.quantiles.as_deref(), Some(&[5.0, 10.0, 15.0][..]));
        assert!((point.mean - 10.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let world = fixtures::station_world();
        let agg = aggregator(&world, MergePolicy::InverseVariance);
        let t = task(&[("precip", vec![smallvec![0.5, 0.5]])]);
        let dist = PredictiveDistribution::new(
            &t,
            vec![Marginals::Gaussian {
                mean: vec![0.0],
                variance: vec![1.0],
            }],
            Arc::clone(&world.params),
        )
        .unwrap();
        assert_eq!(
            agg.to_physical(&dist),
            Err(AggregateError::Norm(NormError::UnknownVariable {
                name: "precip".into()
            }))
        );
    }

    #[test]
    fn overlapping_sets_merge() {
        let world = fixtures::station_world();
        let t = task(&[
            ("t2m", vec![smallvec![0.5, 0.5], smallvec![0.1, 0.1]]),
            ("t2m", vec![smallvec![0.5, 0.5]]),
        ]);
        let dist = PredictiveDistribution::new(
            &t,
            vec![
                Marginals::Gaussian {
                    mean: vec![0.0, 0.2],
                    variance: vec![0.04, 0.04],
                },
                Marginals::Gaussian {
                    mean: vec![2.0],
                    variance: vec![0.16],
                },
            ],
            Arc::clone(&world.params),
        )
        .unwrap();

        let inv = aggregator(&world, MergePolicy::InverseVariance);
        let merged = inv.merge_overlapping(&inv.to_physical(&dist).unwrap());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].members, 2);
        // Physical members (10, 1) and (20, 4).
        assert!((merged[0].mean - 12.0).abs() < 1e-9);
        assert!((merged[0].variance - 0.8).abs() < 1e-9);
        assert_eq!(merged[1].members, 1);
        assert!((merged[1].mean - 11.0).abs() < 1e-9);

        let eq = aggregator(&world, MergePolicy::EqualWeight);
        let merged = eq.merge_overlapping(&eq.to_physical(&dist).unwrap());
        assert!((merged[0].mean - 15.0).abs() < 1e-9);
        assert!((merged[0].variance - 1.25).abs() < 1e-9);
    }

    #[test]
    fn near_identical_locations_share_a_group() {
        let world = fixtures::station_world();
        let agg = aggregator(&world, MergePolicy::EqualWeight);
        let t = task(&[
            ("t2m", vec![smallvec![0.25, 0.75], smallvec![0.75, 0.25]]),
            ("t2m", vec![smallvec![0.75, 0.25 + 1e-12], smallvec![0.25, 0.75]]),
        ]);
        let dist = PredictiveDistribution::new(
            &t,
            vec![
                Marginals::Gaussian {
                    mean: vec![0.0, 0.0],
                    variance: vec![0.04, 0.04],
                },
                Marginals::Gaussian {
                    mean: vec![0.4, 0.4],
                    variance: vec![0.04, 0.04],
                },
            ],
            Arc::clone(&world.params),
        )
        .unwrap();
        let merged = agg.merge_overlapping(&agg.to_physical(&dist).unwrap());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].normalized.as_slice(), &[0.25, 0.75]);
        assert!(merged.iter().all(|m| m.members == 2));
        assert!(merged.iter().all(|m| (m.mean - 11.0).abs() < 1e-9));
    }

    #[test]
    fn index_over_other_bounds_rejected() {
        let world = fixtures::station_world();
        let bounds = ReferenceBounds::new(smallvec![0.0, 0.0], smallvec![100.0, 100.0]).unwrap();
        let params = NormalizationParams::builder(bounds)
            .transform("t2m", fixtures::t2m_transform())
            .build()
            .unwrap();
        let err = Aggregator::new(
            Arc::new(params),
            Arc::clone(&world.index),
            AggregatorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AggregateError::Inconsistent { .. }));
    }

    #[test]
    fn distribution_with_foreign_params_rejected() {
        let world = fixtures::station_world();
        let agg = aggregator(&world, MergePolicy::InverseVariance);
        let t = task(&[("t2m", vec![smallvec![0.5, 0.5]])]);
        let gaussian = || {
            vec![Marginals::Gaussian {
                mean: vec![1.0],
                variance: vec![1.0],
            }]
        };

        let untransformed = NormalizationParams::builder(world.params.bounds().clone())
            .build()
            .unwrap();
        let foreign = PredictiveDistribution::new(&t, gaussian(), Arc::new(untransformed)).unwrap();
        assert!(matches!(
            agg.to_physical(&foreign),
            Err(AggregateError::Inconsistent { .. })
        ));

        // An equal copy is the same normalization.
        let copy = Arc::new(world.params.as_ref().clone());
        let dist = PredictiveDistribution::new(&t, gaussian(), copy).unwrap();
        let phys = agg.to_physical(&dist).unwrap();
        assert!((phys.sets[0].points[0].mean - 15.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_rejected() {
        let world = fixtures::station_world();
        let err = Aggregator::new(
            Arc::clone(&world.params),
            Arc::clone(&world.index),
            AggregatorConfig {
                merge: MergePolicy::EqualWeight,
                quantile_levels: vec![-0.1],
            },
        )
        .unwrap_err();
        assert!(matches!(err, AggregateError::Config(_)));
    }
}
