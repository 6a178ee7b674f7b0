//! File preamble types and constants.

use crate::error::{DecodeError, WireResult};

/// Magic bytes identifying a recording.
///
/// This value is fixed and must never change across versions.
pub const MAGIC: [u8; 8] = *b"DEMODEC\0";

/// Current format version.
pub const VERSION: u32 = 2;

/// Preamble size in bytes (16 total).
pub const PREAMBLE_SIZE: usize = 8 + 4 + 4;

/// The fixed-size block at the start of every recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preamble {
    /// Format version of the frame stream that follows.
    pub version: u32,
    /// Byte offset of the file-info frame, or 0 when absent.
    pub file_info_offset: u32,
}

impl Preamble {
    /// Creates a preamble for the current version.
    #[must_use]
    pub const fn new(file_info_offset: u32) -> Self {
        Self {
            version: VERSION,
            file_info_offset,
        }
    }

    /// Returns the file-info offset when one is recorded.
    #[must_use]
    pub const fn file_info_offset(&self) -> Option<usize> {
        if self.file_info_offset == 0 {
            None
        } else {
            Some(self.file_info_offset as usize)
        }
    }
}

/// Decodes and validates the preamble at the start of `buf`.
///
/// The version is checked here so an incompatible recording is rejected
/// before any frame is read.
pub fn decode_preamble(buf: &[u8]) -> WireResult<Preamble> {
    if buf.len() < PREAMBLE_SIZE {
        return Err(DecodeError::PreambleTooSmall {
            actual: buf.len(),
            required: PREAMBLE_SIZE,
        });
    }
    let mut magic = [0u8; 8];
    magic.copy_from_slice(&buf[0..8]);
    if magic != MAGIC {
        return Err(DecodeError::InvalidMagic { found: magic });
    }
    let version = read_u32_le(&buf[8..12]);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }
    let file_info_offset = read_u32_le(&buf[12..16]);
    Ok(Preamble {
        version,
        file_info_offset,
    })
}

/// Appends the encoded preamble to `out`.
pub fn encode_preamble(preamble: &Preamble, out: &mut Vec<u8>) {
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&preamble.version.to_le_bytes());
    out.extend_from_slice(&preamble.file_info_offset.to_le_bytes());
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}
