//! Episode log reader.
//!
//! [`ReplayReader`] reads frames from any `Read` source. The header is
//! validated on construction.

use std::io::Read;

use crate::codec::{decode_frame, decode_header};
use crate::error::ReplayError;
use crate::types::{BuildMetadata, EpisodeHeader, Frame};

/// Reads an episode log from a byte stream.
pub struct ReplayReader<R: Read> {
    reader: R,
    metadata: BuildMetadata,
    header: EpisodeHeader,
    frames_read: u64,
}

impl<R: Read> ReplayReader<R> {
    /// Open a log stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let (metadata, header) = decode_header(&mut reader)?;
        Ok(Self {
            reader,
            metadata,
            header,
            frames_read: 0,
        })
    }

    /// Build metadata from the log header.
    pub fn metadata(&self) -> &BuildMetadata {
        &self.metadata
    }

    /// Episode parameters from the log header.
    pub fn header(&self) -> &EpisodeHeader {
        &self.header
    }

    /// Read the next frame, or `None` if the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ReplayError> {
        let frame = decode_frame(&mut self.reader)?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter<R> {
        FrameIter {
            reader: self.reader,
            done: false,
        }
    }
}

/// Iterator over the remaining frames of a log.
///
/// Stops after the first error.
pub struct FrameIter<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> Iterator for FrameIter<R> {
    type Item = Result<Frame, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_frame(&mut self.reader) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
