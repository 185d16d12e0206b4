//! Binary encode/decode for the episode log format.
//!
//! All integers are little-endian. Strings are length-prefixed with a
//! `u32` length. No compression, no alignment padding, no
//! self-describing schema.

use std::io::{Read, Write};

use crate::error::ReplayError;
use crate::types::{BuildMetadata, EpisodeHeader, Frame, FrameSelection};
use crate::{FORMAT_VERSION, MAGIC};

/// Upper bound on selections per frame accepted by the decoder.
const MAX_SELECTIONS: usize = 1 << 20;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ReplayError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), ReplayError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), ReplayError> {
    let len = u32::try_from(s.len()).map_err(|_| ReplayError::MalformedFrame {
        detail: format!("string of {} bytes exceeds u32 length prefix", s.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, ReplayError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, ReplayError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, ReplayError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, ReplayError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, ReplayError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = Vec::new();
    Read::take(&mut *r, len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(ReplayError::MalformedFrame {
            detail: format!("truncated string: got {} of {len} bytes", buf.len()),
        });
    }
    String::from_utf8(buf).map_err(|e| ReplayError::MalformedFrame {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

// ── Header encode/decode ────────────────────────────────────────

/// Encode the log header (magic, version, build metadata, episode header).
pub fn encode_header(
    w: &mut dyn Write,
    meta: &BuildMetadata,
    header: &EpisodeHeader,
) -> Result<(), ReplayError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;

    write_length_prefixed_str(w, &meta.toolchain)?;
    write_length_prefixed_str(w, &meta.target_triple)?;
    write_length_prefixed_str(w, &meta.terrasense_version)?;
    write_length_prefixed_str(w, &meta.compile_flags)?;

    write_length_prefixed_str(w, &header.acquisition)?;
    write_u64_le(w, header.pool_size)?;
    write_u32_le(w, header.batch_size)?;
    write_u64_le(w, header.config_hash)?;
    write_u64_le(w, header.task_hash)?;

    Ok(())
}

/// Decode and validate the log header.
pub fn decode_header(r: &mut dyn Read) -> Result<(BuildMetadata, EpisodeHeader), ReplayError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ReplayError::InvalidMagic);
    }

    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ReplayError::UnsupportedVersion { found: version });
    }

    let meta = BuildMetadata {
        toolchain: read_length_prefixed_str(r)?,
        target_triple: read_length_prefixed_str(r)?,
        terrasense_version: read_length_prefixed_str(r)?,
        compile_flags: read_length_prefixed_str(r)?,
    };

    let header = EpisodeHeader {
        acquisition: read_length_prefixed_str(r)?,
        pool_size: read_u64_le(r)?,
        batch_size: read_u32_le(r)?,
        config_hash: read_u64_le(r)?,
        task_hash: read_u64_le(r)?,
    };

    Ok((meta, header))
}

// ── Frame encode/decode ─────────────────────────────────────────

/// Encode a single frame.
pub fn encode_frame(w: &mut dyn Write, frame: &Frame) -> Result<(), ReplayError> {
    write_u32_le(w, frame.epoch)?;
    let count = u32::try_from(frame.selections.len()).map_err(|_| ReplayError::MalformedFrame {
        detail: format!("{} selections exceed u32 count", frame.selections.len()),
    })?;
    write_u32_le(w, count)?;
    for s in &frame.selections {
        write_u64_le(w, s.candidate)?;
        write_f64_le(w, s.score)?;
    }
    write_u64_le(w, frame.context_size)?;
    write_u64_le(w, frame.task_hash)?;
    Ok(())
}

/// Decode a single frame.
///
/// Returns `Ok(None)` on clean EOF (no bytes available), `Ok(Some(frame))`
/// on success, or an error on truncated/corrupt data.
pub fn decode_frame(r: &mut dyn Read) -> Result<Option<Frame>, ReplayError> {
    // Read the epoch byte-by-byte to distinguish clean EOF (zero bytes
    // available) from truncation (1-3 bytes before EOF).
    let mut epoch_buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match r.read(&mut epoch_buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ReplayError::MalformedFrame {
                    detail: format!("truncated frame header: got {filled} of 4 bytes for epoch"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ReplayError::Io(e)),
        }
    }
    let epoch = u32::from_le_bytes(epoch_buf);

    let count = read_u32_le(r)? as usize;
    if count > MAX_SELECTIONS {
        return Err(ReplayError::MalformedFrame {
            detail: format!("selection count {count} exceeds limit {MAX_SELECTIONS}"),
        });
    }
    let mut selections = Vec::with_capacity(count);
    for _ in 0..count {
        selections.push(FrameSelection {
            candidate: read_u64_le(r)?,
            score: read_f64_le(r)?,
        });
    }

    Ok(Some(Frame {
        epoch,
        selections,
        context_size: read_u64_le(r)?,
        task_hash: read_u64_le(r)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta() -> BuildMetadata {
        BuildMetadata {
            toolchain: "1.87.0".into(),
            target_triple: "x86_64-linux".into(),
            terrasense_version: "0.1.0".into(),
            compile_flags: "test".into(),
        }
    }

    fn header() -> EpisodeHeader {
        EpisodeHeader {
            acquisition: "variance_reduction".into(),
            pool_size: 3,
            batch_size: 1,
            config_hash: 0xDEAD_BEEF,
            task_hash: 7,
        }
    }

    fn frame() -> Frame {
        Frame {
            epoch: 2,
            selections: vec![
                FrameSelection {
                    candidate: 4,
                    score: 0.25,
                },
                FrameSelection {
                    candidate: 1,
                    score: -0.0,
                },
            ],
            context_size: 5,
            task_hash: 0xABCD,
        }
    }

    #[test]
    fn header_roundtrip() {
        let mut buf = Vec::new();
        encode_header(&mut buf, &meta(), &header()).unwrap();
        assert_eq!(&buf[..4], b"TSEP");
        let (m, h) = decode_header(&mut buf.as_slice()).unwrap();
        assert_eq!(m, meta());
        assert_eq!(h, header());
    }

    #[test]
    fn bad_magic_rejected() {
        let data = b"NOPE\x01";
        assert!(matches!(
            decode_header(&mut data.as_slice()),
            Err(ReplayError::InvalidMagic)
        ));
    }

    #[test]
    fn bad_version_rejected() {
        let mut buf = Vec::new();
        encode_header(&mut buf, &meta(), &header()).unwrap();
        buf[4] = 99;
        assert!(matches!(
            decode_header(&mut buf.as_slice()),
            Err(ReplayError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn frame_preserves_score_bits() {
        let mut buf = Vec::new();
        encode_frame(&mut buf, &frame()).unwrap();
        let decoded = decode_frame(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(decoded, frame());
        assert!(decoded.selections[1].score.is_sign_negative());
    }

    #[test]
    fn eof_returns_none() {
        let empty: &[u8] = &[];
        assert!(decode_frame(&mut &*empty).unwrap().is_none());
    }

    #[test]
    fn partial_epoch_is_error_not_eof() {
        let partial: &[u8] = &[1, 0];
        assert!(matches!(
            decode_frame(&mut &*partial),
            Err(ReplayError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn truncated_body_is_error() {
        let mut buf = Vec::new();
        encode_frame(&mut buf, &frame()).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(decode_frame(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn absurd_selection_count_rejected() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, 1).unwrap();
        write_u32_le(&mut buf, u32::MAX).unwrap();
        assert!(matches!(
            decode_frame(&mut buf.as_slice()),
            Err(ReplayError::MalformedFrame { .. })
        ));
    }

    proptest! {
        #[test]
        fn strings_survive_the_codec(s in "\\PC{0,48}") {
            let mut buf = Vec::new();
            write_length_prefixed_str(&mut buf, &s).unwrap();
            prop_assert_eq!(read_length_prefixed_str(&mut buf.as_slice()).unwrap(), s);
        }
    }
}
