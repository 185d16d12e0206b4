//! Error types for the replay system.

use std::fmt;
use std::io;

use terrasense_acquire::AcquireError;

/// Errors that can occur during recording, playback, or comparison.
#[derive(Debug)]
pub enum ReplayError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The stream does not start with the expected `b"TSEP"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the stream.
        found: u8,
    },
    /// A frame could not be decoded (truncated or corrupt data).
    MalformedFrame {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The log was recorded with a different episode configuration.
    ConfigMismatch {
        /// Hash from the log header.
        recorded: u64,
        /// Hash computed from the current episode.
        current: u64,
    },
    /// Recording or replay needs a freshly constructed engine.
    EpisodeInProgress,
    /// The episode itself failed.
    Acquire(AcquireError),
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"TSEP\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::MalformedFrame { detail } => write!(f, "malformed frame: {detail}"),
            Self::ConfigMismatch { recorded, current } => {
                write!(
                    f,
                    "config hash mismatch: recorded={recorded:#018x}, current={current:#018x}"
                )
            }
            Self::EpisodeInProgress => {
                write!(f, "engine has already left the Initialized phase")
            }
            Self::Acquire(e) => write!(f, "episode failed: {e}"),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Acquire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReplayError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<AcquireError> for ReplayError {
    fn from(e: AcquireError) -> Self {
        Self::Acquire(e)
    }
}
