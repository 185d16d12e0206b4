//! The [`TaskLoader`]: registered sources → normalized [`Task`]s.

use std::sync::Arc;

use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use smallvec::smallvec;
use tracing::debug;

use terrasense_core::{
    ContextSet, Coord, Layout, NormalizationParams, ObservationSource, SourceData, SourceId,
    SourceRegistry, TargetSet, Task, TaskError, TimeQuery, Timestamp, VariableTransform,
};
use terrasense_space::SpatialIndex;

use crate::config::{ConfigError, LoaderConfig};
use crate::policy::SamplingPolicy;

/// Golden-ratio increment used to decorrelate per-source RNG streams.
const SOURCE_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// One task to build: a time anchor plus per-source policies.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskRequest {
    /// Time anchor.
    pub time: TimeQuery,
    /// Context policies, one per contributing source.
    pub context: Vec<(SourceId, SamplingPolicy)>,
    /// Target policies; target sets keep this order.
    pub target: Vec<(SourceId, SamplingPolicy)>,
}

/// Builds [`Task`]s from the registered sources.
///
/// Stateless beyond the shared, immutable registry, spatial index and
/// normalization parameters: identical requests always produce
/// bit-identical tasks.
#[derive(Clone, Debug)]
pub struct TaskLoader {
    registry: Arc<SourceRegistry>,
    index: Arc<SpatialIndex>,
    params: Arc<NormalizationParams>,
    config: LoaderConfig,
}

impl TaskLoader {
    /// Create a loader.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the config names unknown sources, a source's
    /// variable has no normalization entry, or the index was built over
    /// different reference bounds than the normalization parameters.
    pub fn new(
        registry: Arc<SourceRegistry>,
        index: Arc<SpatialIndex>,
        params: Arc<NormalizationParams>,
        config: LoaderConfig,
    ) -> Result<Self, ConfigError> {
        config.validate(&registry)?;
        if index.bounds() != params.bounds() {
            return Err(ConfigError::Inconsistent {
                reason: format!(
                    "spatial index spans {:?}..{:?} but normalization parameters span {:?}..{:?}",
                    index.bounds().min(),
                    index.bounds().max(),
                    params.bounds().min(),
                    params.bounds().max()
                ),
            });
        }
        for (id, source) in registry.iter() {
            if params.get(&source.schema().variable).is_err() {
                return Err(ConfigError::Inconsistent {
                    reason: format!(
                        "variable {:?} of source {id} has no normalization parameters",
                        source.schema().variable
                    ),
                });
            }
            if index.domain(id).is_err() {
                return Err(ConfigError::Inconsistent {
                    reason: format!("source {id} is missing from the spatial index"),
                });
            }
        }
        Ok(Self {
            registry,
            index,
            params,
            config,
        })
    }

    /// Shared source registry.
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Shared spatial index.
    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    /// Shared normalization parameters.
    pub fn params(&self) -> &Arc<NormalizationParams> {
        &self.params
    }

    /// Loader configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Build one task.
    ///
    /// Context sets come out in source registration order regardless of
    /// the order of `context`; target sets keep the order of `target`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::EmptyTarget`] if the target policies select nothing.
    /// - [`TaskError::CoordinateRange`] if a `Fixed` location lies outside
    ///   its source's domain.
    /// - [`TaskError::InvalidPolicy`] / [`TaskError::UnknownSource`] for
    ///   malformed requests.
    pub fn build_task(
        &self,
        time: TimeQuery,
        context: &[(SourceId, SamplingPolicy)],
        target: &[(SourceId, SamplingPolicy)],
    ) -> Result<Task, TaskError> {
        if let TimeQuery::Window { start, end } = time {
            if start > end {
                return Err(TaskError::Malformed {
                    reason: format!("time window starts at {start} after it ends at {end}"),
                });
            }
        }
        let reference = time.reference();

        let mut context_sets = Vec::with_capacity(context.len());
        for (id, policy) in context {
            policy.validate(*id)?;
            let slice = self.slice(*id, time)?;
            let set = self.context_set(&slice, policy, reference)?;
            debug!(
                source = %id,
                stamps = slice.stamps.len(),
                slots = set.len(),
                observed = set.observed_count(),
                "built context set"
            );
            context_sets.push(set);
        }
        context_sets.sort_by_key(ContextSet::source);

        let mut target_sets = Vec::with_capacity(target.len());
        for (id, policy) in target {
            policy.validate(*id)?;
            let slice = self.slice(*id, time)?;
            let set = self.target_set(&slice, policy)?;
            debug!(source = %id, targets = set.len(), "built target set");
            target_sets.push(set);
        }

        Task::new(time, context_sets, target_sets)
    }

    /// Build the task described by `request`.
    pub fn build(&self, request: &TaskRequest) -> Result<Task, TaskError> {
        self.build_task(request.time, &request.context, &request.target)
    }

    /// Build many independent tasks concurrently. Results keep request
    /// order.
    pub fn build_tasks_par(&self, requests: &[TaskRequest]) -> Vec<Result<Task, TaskError>> {
        requests.par_iter().map(|r| self.build(r)).collect()
    }

    // ── Slicing ──────────────────────────────────────────────────

    fn slice(&self, id: SourceId, time: TimeQuery) -> Result<SourceSlice<'_>, TaskError> {
        let source = self
            .registry
            .get(id)
            .ok_or(TaskError::UnknownSource { source: id })?;
        let tolerance = self.config.tolerance(id);
        let stamps = select_stamps(source.times(), time, tolerance);
        let transform = self.params.get(&source.schema().variable)?;
        Ok(SourceSlice {
            id,
            source,
            stamps,
            transform,
        })
    }

    // ── Context ──────────────────────────────────────────────────

    fn context_set(
        &self,
        slice: &SourceSlice<'_>,
        policy: &SamplingPolicy,
        reference: Timestamp,
    ) -> Result<ContextSet, TaskError> {
        let variable = &slice.source.schema().variable;
        if slice.stamps.is_empty() {
            return Ok(ContextSet::empty(slice.id, variable.as_str()));
        }
        let all = slice.observations(&slice.stamps);

        let (layout, chosen): (Layout, Vec<Observation>) = match (policy, slice.grid_shape()) {
            (SamplingPolicy::All, Some((rows, cols))) => (
                Layout::Gridded {
                    shape: smallvec![slice.stamps.len(), rows, cols],
                },
                all,
            ),
            (SamplingPolicy::GridStride(k), Some((rows, cols))) => (
                Layout::Gridded {
                    shape: smallvec![slice.stamps.len(), rows.div_ceil(*k), cols.div_ceil(*k)],
                },
                all.into_iter().filter(|o| o.on_stride(*k)).collect(),
            ),
            (SamplingPolicy::All, None) => (Layout::Scattered, valid_only(all)),
            (SamplingPolicy::GridStride(k), None) => (
                Layout::Scattered,
                valid_only(all).into_iter().step_by(*k).collect(),
            ),
            (SamplingPolicy::Random { amount, seed }, _) => {
                let valid = valid_only(all);
                let n = amount.resolve(valid.len());
                (
                    Layout::Scattered,
                    random_subset(valid, n, *seed, slice.id),
                )
            }
            (SamplingPolicy::Fixed(locations), _) => {
                let mut matched = Vec::new();
                for loc in locations {
                    self.index.normalize(slice.id, loc)?;
                    for &stamp in &slice.stamps {
                        if let Some(obs) = slice.lookup(stamp, loc) {
                            matched.push(obs);
                        }
                    }
                }
                (Layout::Scattered, matched)
            }
        };

        let axis = self.index.time_axis();
        let n = chosen.len();
        let mut coords = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        let mut offsets = Vec::with_capacity(n);
        let mut mask = Vec::with_capacity(n);
        for obs in &chosen {
            coords.push(self.index.normalize(slice.id, &obs.coord)?);
            values.push(if obs.valid {
                slice.transform.normalize(obs.value)
            } else {
                0.0
            });
            offsets.push(axis.offset(obs.time, reference));
            mask.push(obs.valid);
        }
        ContextSet::new(
            slice.id,
            variable.as_str(),
            layout,
            coords,
            values,
            offsets,
            mask,
        )
    }

    // ── Targets ──────────────────────────────────────────────────

    fn target_set(
        &self,
        slice: &SourceSlice<'_>,
        policy: &SamplingPolicy,
    ) -> Result<TargetSet, TaskError> {
        // Data-driven targets come from the slice nearest the reference.
        let latest = || match slice.stamps.last() {
            Some(&stamp) => slice.observations(&[stamp]),
            None => Vec::new(),
        };
        let chosen = match policy {
            SamplingPolicy::Fixed(locations) => return self.fixed_target_set(slice, locations),
            SamplingPolicy::All => valid_only(latest()),
            SamplingPolicy::GridStride(k) if slice.grid_shape().is_some() => {
                valid_only(latest().into_iter().filter(|o| o.on_stride(*k)).collect())
            }
            SamplingPolicy::GridStride(k) => valid_only(latest()).into_iter().step_by(*k).collect(),
            SamplingPolicy::Random { amount, seed } => {
                let valid = valid_only(latest());
                let n = amount.resolve(valid.len());
                random_subset(valid, n, *seed, slice.id)
            }
        };

        let mut coords = Vec::with_capacity(chosen.len());
        let mut truth = Vec::with_capacity(chosen.len());
        for obs in &chosen {
            coords.push(self.index.normalize(slice.id, &obs.coord)?);
            truth.push(Some(slice.transform.normalize(obs.value)));
        }
        TargetSet::new(
            slice.id,
            slice.source.schema().variable.as_str(),
            coords,
            Some(truth),
        )
    }

    /// Targets at explicit raw locations, with truth where the source
    /// observed that location.
    fn fixed_target_set(
        &self,
        slice: &SourceSlice<'_>,
        locations: &[Coord],
    ) -> Result<TargetSet, TaskError> {
        let mut coords = Vec::with_capacity(locations.len());
        let mut truth = Vec::with_capacity(locations.len());
        for loc in locations {
            coords.push(self.index.normalize(slice.id, loc)?);
            // Latest stamp wins: it is closest to the reference time.
            let value = slice
                .stamps
                .iter()
                .rev()
                .find_map(|&stamp| slice.lookup(stamp, loc))
                .map(|obs| slice.transform.normalize(obs.value));
            truth.push(value);
        }
        TargetSet::new(
            slice.id,
            slice.source.schema().variable.as_str(),
            coords,
            Some(truth),
        )
    }
}

// ── Slices and observations ──────────────────────────────────────

/// A source restricted to the stamps selected for one request.
struct SourceSlice<'a> {
    id: SourceId,
    source: &'a ObservationSource,
    stamps: Vec<Timestamp>,
    transform: &'a VariableTransform,
}

/// One raw observation of a slice, in native units.
#[derive(Clone, Debug)]
struct Observation {
    coord: Coord,
    time: Timestamp,
    value: f64,
    valid: bool,
    cell: Option<(usize, usize)>,
}

impl Observation {
    fn on_stride(&self, k: usize) -> bool {
        self.cell.is_some_and(|(r, c)| r % k == 0 && c % k == 0)
    }
}

impl SourceSlice<'_> {
    fn grid_shape(&self) -> Option<(usize, usize)> {
        match self.source.data() {
            SourceData::Grid(g) => Some(g.axes.shape()),
            SourceData::Points(_) => None,
        }
    }

    /// Every observation at `stamps`, in canonical order: points by
    /// (time, coordinates), grids by (time, row, column).
    fn observations(&self, stamps: &[Timestamp]) -> Vec<Observation> {
        let missing = self.source.schema().missing;
        match self.source.data() {
            SourceData::Points(records) => records
                .iter()
                .filter(|r| stamps.binary_search(&r.time).is_ok())
                .map(|r| Observation {
                    coord: r.coords.clone(),
                    time: r.time,
                    value: r.value,
                    valid: !missing.is_missing(r.value),
                    cell: None,
                })
                .collect(),
            SourceData::Grid(grid) => {
                let (rows, cols) = grid.axes.shape();
                let mut out = Vec::with_capacity(stamps.len() * rows * cols);
                for &stamp in stamps {
                    let Ok(t) = grid.times.binary_search(&stamp) else {
                        continue;
                    };
                    let values = grid.slice(t);
                    for r in 0..rows {
                        for c in 0..cols {
                            let value = values[r * cols + c];
                            out.push(Observation {
                                coord: grid.axes.cell(r, c),
                                time: stamp,
                                value,
                                valid: !missing.is_missing(value),
                                cell: Some((r, c)),
                            });
                        }
                    }
                }
                out
            }
        }
    }

    /// The valid observation at `location` and `stamp`, if any.
    ///
    /// Points match exactly; grids match the nearest cell within half a
    /// grid spacing.
    fn lookup(&self, stamp: Timestamp, location: &[f64]) -> Option<Observation> {
        let missing = self.source.schema().missing;
        match self.source.data() {
            SourceData::Points(records) => records
                .iter()
                .find(|r| r.time == stamp && r.coords.as_slice() == location)
                .filter(|r| !missing.is_missing(r.value))
                .map(|r| Observation {
                    coord: r.coords.clone(),
                    time: r.time,
                    value: r.value,
                    valid: true,
                    cell: None,
                }),
            SourceData::Grid(grid) => {
                let t = grid.times.binary_search(&stamp).ok()?;
                let (r, c) = grid.axes.nearest_cell(location)?;
                let value = grid.slice(t)[r * grid.axes.shape().1 + c];
                (!missing.is_missing(value)).then(|| Observation {
                    coord: grid.axes.cell(r, c),
                    time: stamp,
                    value,
                    valid: true,
                    cell: Some((r, c)),
                })
            }
        }
    }
}

fn valid_only(obs: Vec<Observation>) -> Vec<Observation> {
    obs.into_iter().filter(|o| o.valid).collect()
}

/// Seeded subset of `n` observations, returned in canonical order.
fn random_subset(obs: Vec<Observation>, n: usize, seed: u64, source: SourceId) -> Vec<Observation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ u64::from(source.0).wrapping_mul(SOURCE_SEED_MIX));
    let mut picked = sample(&mut rng, obs.len(), n).into_vec();
    picked.sort_unstable();
    let mut keep = vec![false; obs.len()];
    for i in picked {
        keep[i] = true;
    }
    obs.into_iter()
        .zip(keep)
        .filter_map(|(o, k)| k.then_some(o))
        .collect()
}

/// Stamps of `times` (ascending, distinct) that contribute to `query`.
///
/// `At(t)` takes the single nearest stamp within `tolerance` seconds,
/// preferring the earlier one on a tie. `Window` takes every stamp in
/// `[start - tolerance, end + tolerance]`.
fn select_stamps(times: &[Timestamp], query: TimeQuery, tolerance: u64) -> Vec<Timestamp> {
    match query {
        TimeQuery::At(t) => {
            let mut best: Option<(Timestamp, u64)> = None;
            for &stamp in times {
                let d = stamp.abs_diff(t);
                if d <= tolerance && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((stamp, d));
                }
            }
            best.map(|(s, _)| vec![s]).unwrap_or_default()
        }
        TimeQuery::Window { start, end } => {
            let tol = i64::try_from(tolerance).unwrap_or(i64::MAX);
            let lo = start.0.saturating_sub(tol);
            let hi = end.0.saturating_add(tol);
            times
                .iter()
                .copied()
                .filter(|s| s.0 >= lo && s.0 <= hi)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Amount;
    use proptest::prelude::*;
    use terrasense_test_utils::fixtures::{self, World};

    fn loader(world: &World, tolerance: u64) -> TaskLoader {
        TaskLoader::new(
            world.registry.clone(),
            world.index.clone(),
            world.params.clone(),
            LoaderConfig::with_tolerance(tolerance),
        )
        .unwrap()
    }

    fn c(a: f64, b: f64) -> Coord {
        smallvec![a, b]
    }

    fn fixed_station_target(world: &World) -> Vec<(SourceId, SamplingPolicy)> {
        vec![(
            world.stations,
            SamplingPolicy::Fixed(vec![c(52.0, 0.0), c(51.5, 0.0)]),
        )]
    }

    #[test]
    fn stamp_selection() {
        let times = [Timestamp(0), Timestamp(3600)];
        assert_eq!(
            select_stamps(&times, TimeQuery::At(Timestamp(1800)), 3600),
            vec![Timestamp(0)]
        );
        assert_eq!(
            select_stamps(&times, TimeQuery::At(Timestamp(3000)), 3600),
            vec![Timestamp(3600)]
        );
        assert!(select_stamps(&times, TimeQuery::At(Timestamp(1800)), 1000).is_empty());
        let window = TimeQuery::Window {
            start: Timestamp(100),
            end: Timestamp(3500),
        };
        assert!(select_stamps(&times, window, 0).is_empty());
        assert_eq!(select_stamps(&times, window, 100).len(), 2);
    }

    #[test]
    fn all_points_context_is_normalized() {
        let world = fixtures::station_world();
        let l = loader(&world, 0);
        let task = l
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(world.stations, SamplingPolicy::All)],
                &fixed_station_target(&world),
            )
            .unwrap();
        let set = &task.context()[0];
        assert_eq!(set.len(), 3);
        assert_eq!(set.values(), &[0.4, 1.0, -0.2]);
        assert!((set.coords()[0][0] - 1.0 / 6.0).abs() < 1e-12);
        assert!((set.coords()[0][1] - 0.625).abs() < 1e-12);
        assert!(set.time_offsets().iter().all(|&o| o == 0.0));
    }

    #[test]
    fn fixed_target_attaches_truth_where_observed() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[],
                &fixed_station_target(&world),
            )
            .unwrap();
        let targets = &task.targets()[0];
        assert_eq!(targets.len(), 2);
        assert_eq!(targets.truth().unwrap(), &[Some(1.0), None]);
    }

    #[test]
    fn no_data_within_tolerance_gives_empty_context() {
        let world = fixtures::station_world();
        let task = loader(&world, 60)
            .build_task(
                TimeQuery::At(Timestamp(1800)),
                &[(world.stations, SamplingPolicy::All)],
                &fixed_station_target(&world),
            )
            .unwrap();
        assert_eq!(task.context().len(), 1);
        assert!(task.context()[0].is_empty());
        assert_eq!(task.context_count(), 0);
        assert_eq!(task.targets()[0].truth().unwrap(), &[None, None]);
    }

    #[test]
    fn zero_targets_is_empty_target_error() {
        let world = fixtures::station_world();
        let err = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(7200)),
                &[(world.stations, SamplingPolicy::All)],
                &[(world.stations, SamplingPolicy::All)],
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::EmptyTarget(_)));
    }

    #[test]
    fn fixed_target_outside_domain() {
        let world = fixtures::station_world();
        let err = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[],
                &[(world.stations, SamplingPolicy::Fixed(vec![c(40.0, 0.0)]))],
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::CoordinateRange(_)));
    }

    #[test]
    fn gridded_context_keeps_layout_and_masks_missing() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(world.era, SamplingPolicy::All)],
                &fixed_station_target(&world),
            )
            .unwrap();
        let set = &task.context()[0];
        assert_eq!(
            set.layout(),
            &Layout::Gridded {
                shape: smallvec![1, 3, 4]
            }
        );
        assert_eq!(set.len(), 12);
        assert!(!set.mask()[5]);
        assert_eq!(set.observed_count(), 11);
    }

    #[test]
    fn grid_stride_takes_every_kth_cell() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(world.era, SamplingPolicy::GridStride(2))],
                &fixed_station_target(&world),
            )
            .unwrap();
        let set = &task.context()[0];
        assert_eq!(
            set.layout(),
            &Layout::Gridded {
                shape: smallvec![1, 2, 2]
            }
        );
        // Cells (0,0) (0,2) (2,0) (2,2) hold 10, 12, 18, 20.
        assert_eq!(set.values(), &[0.0, 0.4, 1.6, 2.0]);
    }

    #[test]
    fn grid_stride_zero_rejected() {
        let world = fixtures::station_world();
        let err = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(world.era, SamplingPolicy::GridStride(0))],
                &fixed_station_target(&world),
            )
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidPolicy { .. }));
    }

    #[test]
    fn random_grid_context_is_scattered() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(
                    world.era,
                    SamplingPolicy::Random {
                        amount: Amount::Count(4),
                        seed: 9,
                    },
                )],
                &fixed_station_target(&world),
            )
            .unwrap();
        let set = &task.context()[0];
        assert_eq!(set.layout(), &Layout::Scattered);
        assert_eq!(set.observed_count(), 4);
    }

    #[test]
    fn grid_fixed_target_uses_nearest_cell() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[],
                &[(world.era, SamplingPolicy::Fixed(vec![c(1.2, 2.9)]))],
            )
            .unwrap();
        // Cell (1, 3) holds 17.
        assert_eq!(task.targets()[0].truth().unwrap(), &[Some(1.4)]);
    }

    #[test]
    fn window_context_spans_stamps_and_targets_use_latest() {
        let world = fixtures::station_world();
        let window = TimeQuery::Window {
            start: Timestamp(0),
            end: Timestamp(3600),
        };
        let task = loader(&world, 0)
            .build_task(
                window,
                &[(world.stations, SamplingPolicy::All)],
                &[(world.stations, SamplingPolicy::All)],
            )
            .unwrap();
        let set = &task.context()[0];
        assert_eq!(set.len(), 4);
        assert!((set.time_offsets()[0] + 3600.0 / 86_400.0).abs() < 1e-15);
        assert_eq!(set.time_offsets()[3], 0.0);
        assert_eq!(task.target_count(), 1);
    }

    #[test]
    fn context_sets_follow_registration_order() {
        let world = fixtures::station_world();
        let task = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[
                    (world.era, SamplingPolicy::All),
                    (world.stations, SamplingPolicy::All),
                ],
                &fixed_station_target(&world),
            )
            .unwrap();
        let order: Vec<SourceId> = task.context().iter().map(ContextSet::source).collect();
        assert_eq!(order, vec![world.stations, world.era]);
    }

    #[test]
    fn unknown_source_rejected() {
        let world = fixtures::station_world();
        let err = loader(&world, 0)
            .build_task(
                TimeQuery::At(Timestamp(0)),
                &[(SourceId(99), SamplingPolicy::All)],
                &fixed_station_target(&world),
            )
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::UnknownSource {
                source: SourceId(99)
            }
        );
    }

    #[test]
    fn params_over_other_bounds_rejected() {
        let world = fixtures::station_world();
        let bounds =
            terrasense_core::ReferenceBounds::new(c(0.0, 0.0), c(100.0, 100.0)).unwrap();
        let params = NormalizationParams::builder(bounds)
            .transform("t2m", fixtures::t2m_transform())
            .build()
            .unwrap();
        let err = TaskLoader::new(
            world.registry.clone(),
            world.index.clone(),
            Arc::new(params),
            LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent { ref reason } if reason.contains("span")));
    }

    #[test]
    fn parallel_matches_sequential() {
        let world = fixtures::station_world();
        let l = loader(&world, 3600);
        let requests: Vec<TaskRequest> = (0..8)
            .map(|i| TaskRequest {
                time: TimeQuery::At(Timestamp(i * 900)),
                context: vec![(
                    world.era,
                    SamplingPolicy::Random {
                        amount: Amount::Fraction(0.5),
                        seed: i as u64,
                    },
                )],
                target: fixed_station_target(&world),
            })
            .collect();
        let par = l.build_tasks_par(&requests);
        for (req, got) in requests.iter().zip(par) {
            assert_eq!(got, l.build(req));
        }
    }

    proptest! {
        #[test]
        fn identical_requests_are_bit_identical(seed in any::<u64>(), frac in 0.0f64..=1.0) {
            let world = fixtures::station_world();
            let l = loader(&world, 0);
            let context = [
                (world.stations, SamplingPolicy::Random { amount: Amount::Fraction(frac), seed }),
                (world.era, SamplingPolicy::Random { amount: Amount::Fraction(frac), seed }),
            ];
            let target = [(world.era, SamplingPolicy::Random { amount: Amount::Count(3), seed })];
            let a = l.build_task(TimeQuery::At(Timestamp(0)), &context, &target).unwrap();
            let b = l.build_task(TimeQuery::At(Timestamp(0)), &context, &target).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
