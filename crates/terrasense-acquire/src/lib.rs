//! Active-learning acquisition: where to place the next sensor.
//!
//! An [`AcquisitionEngine`] runs one placement episode as an explicit
//! state machine over [`Phase`]s. Each scoring round asks the model how
//! much every remaining candidate location would shrink the predictive
//! variance at the task's targets if a sensor there reported the
//! model's own predicted mean, picks the best candidates under an
//! [`AcquisitionFunction`], and feeds them back into the context. The
//! model is never retrained inside an episode.
//!
//! ```text
//! Initialized ─▶ Scoring ─▶ Selected ─▶ Updated ─┐
//!                  ▲  │                          │
//!                  │  └─▶ Terminal               │
//!                  └─────────────────────────────┘
//! ```
//!
//! Every transition is one call to [`AcquisitionEngine::step`], so
//! callers can observe or checkpoint the episode between phases.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod acquisition;
pub mod config;
pub mod engine;
pub mod episode;
pub mod error;
pub mod pool;

pub use acquisition::AcquisitionFunction;
pub use config::{ConfigError, EpisodeConfig};
pub use engine::{
    run_episodes_par, AcquisitionEngine, EpisodeCheckpoint, EpisodeSpec, Phase, Selection,
    TerminationReason,
};
pub use episode::{EpisodeLog, EpisodeRecord, ScoreTable};
pub use error::AcquireError;
pub use pool::CandidatePool;
