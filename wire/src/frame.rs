//! Outer frame decoding.
//!
//! A frame is `varint command | varint tick | varint size | payload`. Bit
//! [`COMPRESSED_FLAG`] of the command marks a Snappy-compressed payload.

use std::borrow::Cow;

use bitstream::{compress_block, decompress_block_bounded, put_varu32, BitError, ByteReader};

use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::header::PREAMBLE_SIZE;
use crate::limits::Limits;

/// Command bit marking a compressed payload.
pub const COMPRESSED_FLAG: u32 = 0x40;

/// Frame types.
///
/// Unknown commands are preserved as [`FrameKind::Unknown`] so callers can
/// skip them and keep reading newer recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Stop,
    FileHeader,
    FileInfo,
    SyncTick,
    SendTables,
    ClassInfo,
    Packet,
    SignonPacket,
    FullPacket,
    Unknown(u32),
}

impl FrameKind {
    /// Maps a command (without the compression flag) to a frame kind.
    #[must_use]
    pub const fn from_command(command: u32) -> Self {
        match command {
            0 => Self::Stop,
            1 => Self::FileHeader,
            2 => Self::FileInfo,
            3 => Self::SyncTick,
            4 => Self::SendTables,
            5 => Self::ClassInfo,
            7 => Self::Packet,
            8 => Self::SignonPacket,
            13 => Self::FullPacket,
            other => Self::Unknown(other),
        }
    }

    /// Returns the command number for this kind.
    #[must_use]
    pub const fn command(self) -> u32 {
        match self {
            Self::Stop => 0,
            Self::FileHeader => 1,
            Self::FileInfo => 2,
            Self::SyncTick => 3,
            Self::SendTables => 4,
            Self::ClassInfo => 5,
            Self::Packet => 7,
            Self::SignonPacket => 8,
            Self::FullPacket => 13,
            Self::Unknown(other) => other,
        }
    }

    /// Returns `true` if the payload is a sequence of inner messages.
    #[must_use]
    pub const fn carries_messages(self) -> bool {
        matches!(self, Self::Packet | Self::SignonPacket | Self::FullPacket)
    }
}

/// One decoded outer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub kind: FrameKind,
    pub tick: u32,
    /// Byte offset of the frame header within the file.
    pub offset: usize,
    pub compressed: bool,
    /// Payload bytes, decompressed when the frame was compressed.
    pub payload: Cow<'a, [u8]>,
}

/// Lazy, forward-only iterator over the frames of a recording.
///
/// Iteration ends after a [`FrameKind::Stop`] frame, at the end of input, or
/// after the first unrecoverable error.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    reader: ByteReader<'a>,
    limits: Limits,
    done: bool,
}

impl<'a> Frames<'a> {
    /// Creates an iterator over the frames that follow the preamble.
    ///
    /// The preamble itself is not validated here; see
    /// [`decode_preamble`](crate::decode_preamble).
    pub fn new(file: &'a [u8], limits: &Limits) -> WireResult<Self> {
        Self::starting_at(file, PREAMBLE_SIZE, limits)
    }

    /// Creates an iterator starting at an arbitrary byte offset.
    pub fn starting_at(file: &'a [u8], offset: usize, limits: &Limits) -> WireResult<Self> {
        let reader = ByteReader::at(file, offset).map_err(|_| DecodeError::Truncated {
            offset,
            needed: offset,
            available: file.len(),
        })?;
        Ok(Self {
            reader,
            limits: limits.clone(),
            done: false,
        })
    }

    /// Returns the byte offset of the next frame.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.reader.position()
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = WireResult<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }
        let result = read_frame(&mut self.reader, &self.limits);
        match &result {
            Ok(frame) => self.done = frame.kind == FrameKind::Stop,
            Err(err) => self.done = !err.is_recoverable(),
        }
        Some(result)
    }
}

/// Reads the single frame starting at `offset`.
pub fn read_frame_at<'a>(file: &'a [u8], offset: usize, limits: &Limits) -> WireResult<Frame<'a>> {
    let mut frames = Frames::starting_at(file, offset, limits)?;
    frames.next().unwrap_or(Err(DecodeError::Truncated {
        offset,
        needed: 1,
        available: 0,
    }))
}

fn read_frame<'a>(reader: &mut ByteReader<'a>, limits: &Limits) -> WireResult<Frame<'a>> {
    let offset = reader.position();
    let raw_command = read_header_varint(reader, offset)?;
    let tick = read_header_varint(reader, offset)?;
    let size = read_header_varint(reader, offset)? as usize;

    if size > limits.max_frame_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::FrameBytes,
            limit: limits.max_frame_bytes,
            actual: size,
        });
    }
    let body = reader.read_slice(size).map_err(|_| DecodeError::Truncated {
        offset,
        needed: size,
        available: reader.remaining(),
    })?;

    let compressed = raw_command & COMPRESSED_FLAG != 0;
    let command = raw_command & !COMPRESSED_FLAG;
    let kind = FrameKind::from_command(command);
    let payload = if compressed {
        let decompressed =
            decompress_block_bounded(body, limits.max_frame_bytes).map_err(|err| {
                DecodeError::Decompress {
                    offset,
                    command,
                    reason: err.to_string(),
                }
            })?;
        Cow::Owned(decompressed)
    } else {
        Cow::Borrowed(body)
    };

    Ok(Frame {
        kind,
        tick,
        offset,
        compressed,
        payload,
    })
}

fn read_header_varint(reader: &mut ByteReader<'_>, offset: usize) -> WireResult<u32> {
    reader.read_varu32().map_err(|err| match err {
        BitError::UnexpectedEof {
            requested,
            available,
        } => DecodeError::Truncated {
            offset,
            needed: requested,
            available,
        },
        _ => DecodeError::InvalidVarint { offset },
    })
}

/// Appends one frame to `out`, compressing the payload when asked.
pub fn encode_frame(
    out: &mut Vec<u8>,
    kind: FrameKind,
    tick: u32,
    payload: &[u8],
    compress: bool,
) -> Result<(), EncodeError> {
    let mut command = kind.command();
    let body: Cow<'_, [u8]> = if compress {
        command |= COMPRESSED_FLAG;
        Cow::Owned(compress_block(payload).map_err(|err| EncodeError::Compress {
            reason: err.to_string(),
        })?)
    } else {
        Cow::Borrowed(payload)
    };
    let len = u32::try_from(body.len())
        .map_err(|_| EncodeError::LengthOverflow { length: body.len() })?;
    put_varu32(out, command);
    put_varu32(out, tick);
    put_varu32(out, len);
    out.extend_from_slice(&body);
    Ok(())
}
