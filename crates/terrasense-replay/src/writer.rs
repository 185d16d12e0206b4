//! Episode log writer.
//!
//! [`ReplayWriter`] streams frames to any `Write` sink. The header is
//! written immediately on construction.

use std::io::Write;

use crate::codec::{encode_frame, encode_header};
use crate::error::ReplayError;
use crate::types::{BuildMetadata, EpisodeHeader, Frame};

/// Writes an episode log to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use terrasense_replay::{BuildMetadata, EpisodeHeader, Frame, ReplayReader, ReplayWriter};
///
/// let meta = BuildMetadata {
///     toolchain: "test".into(),
///     target_triple: "test".into(),
///     terrasense_version: "0.1.0".into(),
///     compile_flags: "test".into(),
/// };
/// let header = EpisodeHeader {
///     acquisition: "variance_reduction".into(),
///     pool_size: 2,
///     batch_size: 1,
///     config_hash: 0,
///     task_hash: 0,
/// };
///
/// let mut buf = Vec::new();
/// let mut writer = ReplayWriter::new(&mut buf, &meta, &header).unwrap();
/// for epoch in 1..=2u32 {
///     let frame = Frame { epoch, selections: vec![], context_size: 0, task_hash: 0 };
///     writer.write_frame(&frame).unwrap();
/// }
/// assert_eq!(writer.frames_written(), 2);
/// drop(writer);
///
/// let mut reader = ReplayReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.header(), &header);
/// assert_eq!(reader.next_frame().unwrap().unwrap().epoch, 1);
/// assert_eq!(reader.next_frame().unwrap().unwrap().epoch, 2);
/// assert!(reader.next_frame().unwrap().is_none());
/// ```
pub struct ReplayWriter<W: Write> {
    writer: W,
    frames_written: u64,
}

impl<W: Write> ReplayWriter<W> {
    /// Create a new writer, immediately writing the header.
    pub fn new(
        mut writer: W,
        metadata: &BuildMetadata,
        header: &EpisodeHeader,
    ) -> Result<Self, ReplayError> {
        encode_header(&mut writer, metadata, header)?;
        Ok(Self {
            writer,
            frames_written: 0,
        })
    }

    /// Append one epoch frame.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), ReplayError> {
        encode_frame(&mut self.writer, frame)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
