//! Recording episodes and verifying replays against a log.
//!
//! Frames are compared field by field with scores checked bit-exactly,
//! so a replay either reproduces the recorded decisions exactly or the
//! first differing epoch is reported.

use std::io::{Read, Write};

use tracing::{debug, info};

use terrasense_acquire::{AcquisitionEngine, Phase};
use terrasense_core::Coord;
use terrasense_model::Backend;

use crate::error::ReplayError;
use crate::hash::{config_hash, task_hash};
use crate::reader::ReplayReader;
use crate::types::{BuildMetadata, EpisodeHeader, Frame, FrameSelection};
use crate::writer::ReplayWriter;

/// What differed between the recorded and the replayed episode.
#[derive(Clone, Debug, PartialEq)]
pub enum DivergenceKind {
    /// The starting tasks differ.
    InitialTask {
        /// Task hash from the log header.
        recorded: u64,
        /// Task hash of the replaying engine.
        replayed: u64,
    },
    /// Different candidates were picked, or picked with different scores.
    Selection {
        /// Recorded selections.
        recorded: Vec<FrameSelection>,
        /// Replayed selections.
        replayed: Vec<FrameSelection>,
    },
    /// Same selections, different context size after the update.
    ContextSize {
        /// Recorded context size.
        recorded: u64,
        /// Replayed context size.
        replayed: u64,
    },
    /// Same selections, different post-update task.
    TaskHash {
        /// Recorded task hash.
        recorded: u64,
        /// Replayed task hash.
        replayed: u64,
    },
    /// The log has an epoch the replay never reached.
    MissingEpoch,
    /// The replay completed an epoch the log does not have.
    ExtraEpoch,
}

/// First divergence found during a replay.
#[derive(Clone, Debug, PartialEq)]
pub struct DivergenceReport {
    /// Epoch at which the runs differ (0 for the starting task).
    pub epoch: u32,
    /// What differed.
    pub kind: DivergenceKind,
}

/// Compare one recorded frame against its replayed counterpart.
///
/// Returns `None` when the frames are identical, comparing scores by
/// bit pattern.
pub fn compare_frame(recorded: &Frame, replayed: &Frame) -> Option<DivergenceReport> {
    let epoch = recorded.epoch;
    let same_selections = recorded.selections.len() == replayed.selections.len()
        && recorded
            .selections
            .iter()
            .zip(&replayed.selections)
            .all(|(a, b)| a.candidate == b.candidate && a.score.to_bits() == b.score.to_bits());
    let kind = if recorded.epoch != replayed.epoch || !same_selections {
        DivergenceKind::Selection {
            recorded: recorded.selections.clone(),
            replayed: replayed.selections.clone(),
        }
    } else if recorded.context_size != replayed.context_size {
        DivergenceKind::ContextSize {
            recorded: recorded.context_size,
            replayed: replayed.context_size,
        }
    } else if recorded.task_hash != replayed.task_hash {
        DivergenceKind::TaskHash {
            recorded: recorded.task_hash,
            replayed: replayed.task_hash,
        }
    } else {
        return None;
    };
    Some(DivergenceReport { epoch, kind })
}

/// Header describing a freshly constructed engine.
///
/// # Errors
///
/// [`ReplayError::EpisodeInProgress`] if the engine has already stepped.
pub fn episode_header<B: Backend>(
    engine: &AcquisitionEngine<'_, B>,
) -> Result<EpisodeHeader, ReplayError> {
    if engine.phase() != Phase::Initialized {
        return Err(ReplayError::EpisodeInProgress);
    }
    let pool = engine.pool();
    let candidates: Vec<Coord> = (0..pool.capacity())
        .filter_map(|i| pool.candidate(i).cloned())
        .collect();
    let config = engine.config();
    let acquisition = engine.log().acquisition;
    Ok(EpisodeHeader {
        acquisition: acquisition.name().to_string(),
        pool_size: pool.capacity() as u64,
        batch_size: u32::try_from(config.batch_size).unwrap_or(u32::MAX),
        config_hash: config_hash(acquisition, config, &candidates),
        task_hash: task_hash(engine.task()),
    })
}

/// Frame for the epoch the engine just completed.
fn epoch_frame<B: Backend>(engine: &AcquisitionEngine<'_, B>) -> Frame {
    let epoch = engine.epoch();
    let records = &engine.log().records;
    let selections = records
        .iter()
        .filter(|r| r.epoch == epoch)
        .map(|r| FrameSelection {
            candidate: r.candidate as u64,
            score: r.score,
        })
        .collect();
    Frame {
        epoch,
        selections,
        context_size: engine.task().context_count() as u64,
        task_hash: task_hash(engine.task()),
    }
}

/// Step `engine` once; returns the completed epoch's frame if the step
/// finished an epoch.
fn step_epoch<B: Backend>(
    engine: &mut AcquisitionEngine<'_, B>,
) -> Result<Option<Frame>, ReplayError> {
    let before = engine.phase();
    engine.step()?;
    Ok((before == Phase::Updated).then(|| epoch_frame(engine)))
}

/// Run `engine` to completion, writing one frame per epoch to `sink`.
///
/// Returns the sink after the last frame has been flushed.
///
/// # Errors
///
/// [`ReplayError::EpisodeInProgress`] if the engine has already stepped,
/// plus any episode or I/O failure.
pub fn record_episode<B: Backend, W: Write>(
    engine: &mut AcquisitionEngine<'_, B>,
    metadata: &BuildMetadata,
    sink: W,
) -> Result<W, ReplayError> {
    let header = episode_header(engine)?;
    let mut writer = ReplayWriter::new(sink, metadata, &header)?;
    while !engine.phase().is_terminal() {
        if let Some(frame) = step_epoch(engine)? {
            writer.write_frame(&frame)?;
        }
    }
    writer.flush()?;
    info!(frames = writer.frames_written(), "episode recorded");
    Ok(writer.into_inner())
}

/// Re-run a recorded episode on a fresh engine and report the first
/// divergence, or `None` if every epoch matches.
///
/// # Errors
///
/// - [`ReplayError::ConfigMismatch`] if the engine was set up with a
///   different acquisition function, config or candidate pool.
/// - [`ReplayError::EpisodeInProgress`] if the engine has already
///   stepped.
pub fn replay_and_compare<R: Read, B: Backend>(
    mut reader: ReplayReader<R>,
    engine: &mut AcquisitionEngine<'_, B>,
) -> Result<Option<DivergenceReport>, ReplayError> {
    let current = episode_header(engine)?;
    let recorded = reader.header().clone();
    if current.config_hash != recorded.config_hash {
        return Err(ReplayError::ConfigMismatch {
            recorded: recorded.config_hash,
            current: current.config_hash,
        });
    }
    if current.task_hash != recorded.task_hash {
        return Ok(Some(DivergenceReport {
            epoch: 0,
            kind: DivergenceKind::InitialTask {
                recorded: recorded.task_hash,
                replayed: current.task_hash,
            },
        }));
    }

    while !engine.phase().is_terminal() {
        let Some(replayed) = step_epoch(engine)? else {
            continue;
        };
        let Some(expected) = reader.next_frame()? else {
            return Ok(Some(DivergenceReport {
                epoch: replayed.epoch,
                kind: DivergenceKind::ExtraEpoch,
            }));
        };
        if let Some(report) = compare_frame(&expected, &replayed) {
            debug!(epoch = report.epoch, kind = ?report.kind, "replay diverged");
            return Ok(Some(report));
        }
    }
    if let Some(frame) = reader.next_frame()? {
        return Ok(Some(DivergenceReport {
            epoch: frame.epoch,
            kind: DivergenceKind::MissingEpoch,
        }));
    }
    info!(frames = reader.frames_read(), "replay matched");
    Ok(None)
}
