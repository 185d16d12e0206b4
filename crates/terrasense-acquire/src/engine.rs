//! The placement state machine.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use terrasense_core::{
    Coord, PredictiveDistribution, SourceId, SourceRegistry, SourceRole, TargetSet, Task,
};
use terrasense_model::{Backend, ModelAdapter};
use terrasense_space::SpatialIndex;

use crate::acquisition::AcquisitionFunction;
use crate::config::{ConfigError, EpisodeConfig};
use crate::episode::{EpisodeLog, EpisodeRecord, ScoreTable};
use crate::error::AcquireError;
use crate::pool::CandidatePool;

// ── Phase ───────────────────────────────────────────────────────────

/// Why an episode stopped.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Scoring found no candidates left.
    PoolExhausted,
    /// `max_placements` sensors have been placed.
    PlacementBudget,
    /// The caller's epoch budget ran out.
    EpochBudget,
    /// No candidate scored at least `min_improvement`.
    BelowThreshold {
        /// Best score of the final round (NaN if every score was NaN).
        best: f64,
    },
}

/// Episode state. One [`AcquisitionEngine::step`] moves one arrow.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Phase {
    /// Constructed; the baseline prediction has not run.
    Initialized,
    /// Ready to score the remaining candidates.
    Scoring,
    /// Candidates picked, not yet placed.
    Selected,
    /// Candidates placed, model re-queried; the next step scores again.
    Updated,
    /// Finished. Further steps are no-ops.
    Terminal(TerminationReason),
}

impl Phase {
    /// Returns `true` for [`Phase::Terminal`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// A candidate picked in the current epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    /// Original pool index.
    pub candidate: usize,
    /// Acquisition score.
    pub score: f64,
    /// Predicted mean at the candidate (normalized), used as its value.
    pub value: f64,
}

// ── Episode inputs ─────────────────────────────────────────────────

/// Everything one episode needs besides the model.
#[derive(Clone, Debug)]
pub struct EpisodeSpec {
    /// Starting task; its targets define what the placements should
    /// improve.
    pub task: Task,
    /// Candidate locations in native coordinates of the placement source.
    pub candidates: Vec<Coord>,
    /// Scoring rule.
    pub acquisition: AcquisitionFunction,
    /// Stopping rules and batch size.
    pub config: EpisodeConfig,
}

/// Complete resumable state of an episode.
#[derive(Clone, Debug)]
pub struct EpisodeCheckpoint {
    acquisition: AcquisitionFunction,
    config: EpisodeConfig,
    variable: String,
    normalized: Vec<Coord>,
    state: EpisodeState,
}

impl EpisodeCheckpoint {
    /// Phase at checkpoint time.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Log so far.
    pub fn log(&self) -> &EpisodeLog {
        &self.state.log
    }
}

#[derive(Clone, Debug)]
struct EpisodeState {
    phase: Phase,
    task: Task,
    pool: CandidatePool,
    epoch: u32,
    placements: usize,
    pending: Vec<Selection>,
    log: EpisodeLog,
}

// ── AcquisitionEngine ──────────────────────────────────────────────

/// Runs one sequential placement episode against a fixed model.
///
/// The engine borrows the adapter immutably: episodes never retrain, and
/// several engines may share one adapter across threads.
pub struct AcquisitionEngine<'a, B> {
    adapter: &'a ModelAdapter<B>,
    acquisition: AcquisitionFunction,
    config: EpisodeConfig,
    variable: String,
    normalized: Vec<Coord>,
    state: EpisodeState,
}

impl<'a, B: Backend> AcquisitionEngine<'a, B> {
    /// Set up an episode.
    ///
    /// Candidates are mapped into the normalized frame up front.
    ///
    /// # Errors
    ///
    /// - [`AcquireError::Config`] for invalid settings, an unregistered
    ///   placement source, or one the adapter does not accept as both
    ///   context and target.
    /// - [`AcquireError::Task`] if a candidate lies outside the placement
    ///   source's domain.
    pub fn new(
        adapter: &'a ModelAdapter<B>,
        registry: &SourceRegistry,
        index: &SpatialIndex,
        spec: EpisodeSpec,
    ) -> Result<Self, AcquireError> {
        let EpisodeSpec {
            task,
            candidates,
            acquisition,
            config,
        } = spec;
        config.validate()?;
        let placement = config.placement_source;
        let variable = registry
            .get(placement)
            .ok_or(ConfigError::UnknownSource { source: placement })?
            .schema()
            .variable
            .clone();
        check_placement(adapter, placement)?;
        let normalized = candidates
            .iter()
            .map(|c| index.normalize(placement, c))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            acquisition = %acquisition,
            candidates = candidates.len(),
            source = %placement,
            "episode initialized"
        );
        Ok(Self {
            adapter,
            acquisition,
            config,
            variable,
            normalized,
            state: EpisodeState {
                phase: Phase::Initialized,
                task,
                pool: CandidatePool::new(candidates),
                epoch: 0,
                placements: 0,
                pending: Vec::new(),
                log: EpisodeLog::new(acquisition),
            },
        })
    }

    /// Continue an episode from a [`checkpoint`](Self::checkpoint).
    pub fn resume(
        adapter: &'a ModelAdapter<B>,
        checkpoint: EpisodeCheckpoint,
    ) -> Result<Self, AcquireError> {
        check_placement(adapter, checkpoint.config.placement_source)?;
        Ok(Self {
            adapter,
            acquisition: checkpoint.acquisition,
            config: checkpoint.config,
            variable: checkpoint.variable,
            normalized: checkpoint.normalized,
            state: checkpoint.state,
        })
    }

    /// Snapshot of the full episode state.
    pub fn checkpoint(&self) -> EpisodeCheckpoint {
        EpisodeCheckpoint {
            acquisition: self.acquisition,
            config: self.config.clone(),
            variable: self.variable.clone(),
            normalized: self.normalized.clone(),
            state: self.state.clone(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Current task, including placements so far.
    pub fn task(&self) -> &Task {
        &self.state.task
    }

    /// Candidate pool.
    pub fn pool(&self) -> &CandidatePool {
        &self.state.pool
    }

    /// Completed epochs.
    pub fn epoch(&self) -> u32 {
        self.state.epoch
    }

    /// Candidates picked by the last scoring round (empty once placed).
    pub fn pending(&self) -> &[Selection] {
        &self.state.pending
    }

    /// Episode settings.
    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    /// Log so far.
    pub fn log(&self) -> &EpisodeLog {
        &self.state.log
    }

    /// Consume the engine, returning its log.
    pub fn into_log(self) -> EpisodeLog {
        self.state.log
    }

    /// Perform exactly one transition.
    pub fn step(&mut self) -> Result<Phase, AcquireError> {
        let next = match self.state.phase {
            Phase::Initialized => {
                let dist = self.adapter.predict(&self.state.task)?;
                let variance = mean_variance(&dist);
                self.state.log.initial_variance = Some(variance);
                debug!(variance, "baseline prediction");
                Phase::Scoring
            }
            Phase::Scoring => self.score_round()?,
            Phase::Selected => {
                self.place_pending();
                Phase::Updated
            }
            Phase::Updated => {
                self.record_update()?;
                Phase::Scoring
            }
            terminal @ Phase::Terminal(_) => terminal,
        };
        if let Phase::Terminal(reason) = next {
            if !self.state.phase.is_terminal() {
                self.state.log.termination = Some(reason);
                info!(
                    ?reason,
                    epochs = self.state.epoch,
                    placements = self.state.placements,
                    "episode finished"
                );
            }
        }
        self.state.phase = next;
        Ok(next)
    }

    /// Step until the episode terminates.
    pub fn run(&mut self) -> Result<&EpisodeLog, AcquireError> {
        while !self.step()?.is_terminal() {}
        Ok(&self.state.log)
    }

    fn score_round(&mut self) -> Result<Phase, AcquireError> {
        let epoch = self.state.epoch + 1;
        if self.config.max_epochs.is_some_and(|max| self.state.epoch >= max) {
            return Ok(Phase::Terminal(TerminationReason::EpochBudget));
        }
        let budget_left = match self.config.max_placements {
            Some(max) if self.state.placements >= max => {
                return Ok(Phase::Terminal(TerminationReason::PlacementBudget));
            }
            Some(max) => max - self.state.placements,
            None => usize::MAX,
        };
        if let Err(e) = self.state.pool.ensure_nonempty(epoch) {
            debug!(%e, "pool exhausted");
            return Ok(Phase::Terminal(TerminationReason::PoolExhausted));
        }

        let scored = self.score_candidates()?;
        self.state.log.score_tables.push(ScoreTable {
            epoch,
            scores: scored.iter().map(|s| (s.candidate, s.score)).collect(),
        });

        let k = self
            .config
            .batch_size
            .min(self.state.pool.len())
            .min(budget_left);
        let picks = select_top(&scored, k, self.config.score_tolerance);
        let best = picks.first().map_or(f64::NAN, |s| s.score);
        let picks: Vec<Selection> = picks
            .into_iter()
            .filter(|s| s.score >= self.config.min_improvement)
            .collect();
        if picks.is_empty() {
            return Ok(Phase::Terminal(TerminationReason::BelowThreshold { best }));
        }
        debug!(
            epoch,
            picked = ?picks.iter().map(|s| s.candidate).collect::<Vec<_>>(),
            best,
            "selected candidates"
        );
        self.state.pending = picks;
        Ok(Phase::Selected)
    }

    /// Score every remaining candidate, ascending by pool index.
    fn score_candidates(&self) -> Result<Vec<Selection>, AcquireError> {
        let task = &self.state.task;
        let remaining = self.state.pool.remaining();
        let placement = self.config.placement_source;

        // One baseline call yields both the target variances and the
        // predicted mean at every candidate.
        let mut targets = task.targets().to_vec();
        let original_sets = targets.len();
        targets.push(TargetSet::new(
            placement,
            self.variable.as_str(),
            remaining.iter().map(|&i| self.normalized[i].clone()).collect(),
            None,
        )?);
        let baseline = self.adapter.predict(&task.with_targets(targets)?)?;
        let base_variances = variances(&baseline, original_sets);
        let candidate_marginals = &baseline.targets()[original_sets].marginals;

        let mut scored = Vec::with_capacity(remaining.len());
        for (slot, &candidate) in remaining.iter().enumerate() {
            let value = candidate_marginals.mean(slot);
            let mut hypothetical = task.clone();
            hypothetical.add_context_point(
                placement,
                &self.variable,
                self.normalized[candidate].clone(),
                value,
            );
            let augmented = self.adapter.predict(&hypothetical)?;
            let score = self
                .acquisition
                .score(&base_variances, &variances(&augmented, original_sets));
            debug!(candidate, score, "scored candidate");
            scored.push(Selection {
                candidate,
                score,
                value,
            });
        }
        Ok(scored)
    }

    fn place_pending(&mut self) {
        let placement = self.config.placement_source;
        let picked: Vec<usize> = self.state.pending.iter().map(|s| s.candidate).collect();
        self.state.pool.remove(&picked);
        for s in &self.state.pending {
            self.state.task.add_context_point(
                placement,
                &self.variable,
                self.normalized[s.candidate].clone(),
                s.value,
            );
        }
        self.state.placements += picked.len();
    }

    fn record_update(&mut self) -> Result<(), AcquireError> {
        let dist = self.adapter.predict(&self.state.task)?;
        let mean_variance = mean_variance(&dist);
        let epoch = self.state.epoch + 1;
        let context_size = self.state.task.context_count();
        for s in std::mem::take(&mut self.state.pending) {
            let coord = self
                .state
                .pool
                .candidate(s.candidate)
                .cloned()
                .unwrap_or_default();
            self.state.log.records.push(EpisodeRecord {
                epoch,
                candidate: s.candidate,
                coord,
                score: s.score,
                context_size,
                mean_variance,
            });
        }
        info!(epoch, context_size, mean_variance, "epoch complete");
        self.state.epoch = epoch;
        Ok(())
    }
}

/// Run independent episodes concurrently against one model. Results keep
/// input order.
pub fn run_episodes_par<B: Backend + Sync>(
    adapter: &ModelAdapter<B>,
    registry: &SourceRegistry,
    index: &SpatialIndex,
    specs: Vec<EpisodeSpec>,
) -> Vec<Result<EpisodeLog, AcquireError>> {
    specs
        .into_par_iter()
        .map(|spec| -> Result<EpisodeLog, AcquireError> {
            let mut engine = AcquisitionEngine::new(adapter, registry, index, spec)?;
            engine.run()?;
            Ok(engine.into_log())
        })
        .collect()
}

fn check_placement<B: Backend>(
    adapter: &ModelAdapter<B>,
    source: SourceId,
) -> Result<(), ConfigError> {
    if !adapter.accepts_context(source) {
        return Err(ConfigError::PlacementRejected {
            source,
            role: SourceRole::Context,
        });
    }
    if !adapter.accepts_target(source) {
        return Err(ConfigError::PlacementRejected {
            source,
            role: SourceRole::Target,
        });
    }
    Ok(())
}

/// Per-target variances of the first `sets` target sets, flattened.
fn variances(dist: &PredictiveDistribution, sets: usize) -> Vec<f64> {
    dist.targets()[..sets]
        .iter()
        .flat_map(|t| (0..t.len()).map(move |i| t.marginals.variance(i)))
        .collect()
}

/// Mean variance over every target of `dist`.
fn mean_variance(dist: &PredictiveDistribution) -> f64 {
    let v = variances(dist, dist.targets().len());
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f64>() / v.len() as f64
    }
}

/// Greedy top-`k` by score. Each round takes the lowest pool index
/// scoring within `tolerance` of the round's maximum. NaN scores are
/// never picked.
fn select_top(scored: &[Selection], k: usize, tolerance: f64) -> Vec<Selection> {
    let mut available: Vec<&Selection> = scored.iter().filter(|s| !s.score.is_nan()).collect();
    available.sort_by_key(|s| s.candidate);
    let mut picks = Vec::with_capacity(k);
    while picks.len() < k {
        let max = available
            .iter()
            .map(|s| s.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let Some(best) = available.iter().position(|s| s.score >= max - tolerance) else {
            break;
        };
        picks.push(available.remove(best).clone());
    }
    picks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(candidate: usize, score: f64) -> Selection {
        Selection {
            candidate,
            score,
            value: 0.0,
        }
    }

    fn picked(scored: &[Selection], k: usize, tol: f64) -> Vec<usize> {
        select_top(scored, k, tol)
            .iter()
            .map(|s| s.candidate)
            .collect()
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let scored = [sel(0, 0.5), sel(1, 0.9), sel(2, 0.9)];
        assert_eq!(picked(&scored, 1, 1e-12), vec![1]);
        assert_eq!(picked(&scored, 2, 1e-12), vec![1, 2]);
    }

    #[test]
    fn tolerance_widens_ties() {
        let scored = [sel(3, 0.50), sel(7, 0.505)];
        assert_eq!(picked(&scored, 1, 0.01), vec![3]);
        assert_eq!(picked(&scored, 1, 0.0), vec![7]);
    }

    #[test]
    fn tolerance_is_measured_from_the_maximum() {
        let scored = [sel(0, 0.50), sel(1, 0.509), sel(2, 0.515)];
        assert_eq!(picked(&scored, 1, 0.01), vec![1]);
        assert_eq!(picked(&scored, 3, 0.01), vec![1, 2, 0]);
    }

    #[test]
    fn nan_scores_are_skipped() {
        let scored = [sel(0, f64::NAN), sel(1, 0.1), sel(2, f64::NAN)];
        assert_eq!(picked(&scored, 3, 0.0), vec![1]);
    }

    #[test]
    fn k_bounds_picks() {
        let scored = [sel(0, 0.1), sel(1, 0.3), sel(2, 0.2)];
        assert_eq!(picked(&scored, 0, 0.0), Vec::<usize>::new());
        assert_eq!(picked(&scored, 5, 0.0), vec![1, 2, 0]);
    }
}
