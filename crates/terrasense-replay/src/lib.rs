//! Episode recording and replay verification.
//!
//! Records the decisions of an acquisition episode to a compact binary
//! log and re-runs episodes against it to prove they are deterministic.
//!
//! # Architecture
//!
//! - [`ReplayWriter`] records frames to any `Write` sink
//! - [`ReplayReader`] plays back frames from any `Read` source
//! - [`record_episode`] drives an engine to completion while recording
//! - [`replay_and_compare`] re-runs an episode and reports the first
//!   divergence
//! - All I/O uses a custom binary codec (no serde dependency)
//!
//! # Format
//!
//! ```text
//! [MAGIC "TSEP"] [VERSION u8] [BuildMetadata] [EpisodeHeader]
//! [Frame 1] [Frame 2] ... [Frame N]
//! ```
//!
//! Each frame holds one epoch: the selected candidates with their
//! scores, the context size after the update, and an FNV-1a hash of the
//! post-update task.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod compare;
pub mod error;
pub mod hash;
pub mod reader;
pub mod types;
pub mod writer;

pub use compare::{
    compare_frame, episode_header, record_episode, replay_and_compare, DivergenceKind,
    DivergenceReport,
};
pub use error::ReplayError;
pub use hash::{config_hash, task_hash};
pub use reader::{FrameIter, ReplayReader};
pub use types::{BuildMetadata, EpisodeHeader, Frame, FrameSelection};
pub use writer::ReplayWriter;

/// Magic bytes at the start of every episode log.
pub const MAGIC: [u8; 4] = *b"TSEP";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
