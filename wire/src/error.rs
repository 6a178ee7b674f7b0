//! Error types for wire format operations.

use std::fmt;

use bitstream::BitError;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// High-level decode errors for file and frame framing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// Input is too small to contain the preamble.
    PreambleTooSmall { actual: usize, required: usize },

    /// The file does not start with the expected magic bytes.
    InvalidMagic { found: [u8; 8] },

    /// The preamble declares a format version this decoder does not support.
    UnsupportedVersion { found: u32 },

    /// The stream ended inside a frame header or payload.
    Truncated {
        /// Byte offset of the frame that could not be completed.
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A frame header contained a malformed varint.
    InvalidVarint { offset: usize },

    /// A compressed frame payload could not be decompressed.
    ///
    /// The stream cursor has already moved past the frame, so decoding may
    /// continue with the next frame.
    Decompress {
        offset: usize,
        command: u32,
        reason: String,
    },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Message framing error inside a packet payload.
    MessageFraming(MessageFramingError),
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    FrameBytes,
    MessageCount,
    MessageLength,
}

/// Errors that can occur while framing inner messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageFramingError {
    InvalidVarint,
    Truncated { needed: usize, available: usize },
}

/// Errors that can occur during encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    LengthOverflow { length: usize },
    Compress { reason: String },
}

impl DecodeError {
    /// Returns `true` if the stream is still positioned on a frame boundary
    /// after this error, so iteration can continue.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decompress { .. })
    }

    /// Returns `true` if the error means the input ended too early.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. }
                | Self::PreambleTooSmall { .. }
                | Self::MessageFraming(MessageFramingError::Truncated { .. })
        )
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreambleTooSmall { actual, required } => {
                write!(
                    f,
                    "file too small: {actual} bytes, need at least {required}"
                )
            }
            Self::InvalidMagic { found } => {
                write!(f, "invalid magic bytes: {}", found.escape_ascii())
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version: {found}")
            }
            Self::Truncated {
                offset,
                needed,
                available,
            } => {
                write!(
                    f,
                    "truncated frame at offset {offset}: need {needed} bytes, have {available}"
                )
            }
            Self::InvalidVarint { offset } => {
                write!(f, "invalid varint in frame header at offset {offset}")
            }
            Self::Decompress {
                offset,
                command,
                reason,
            } => {
                write!(
                    f,
                    "failed to decompress frame {command} at offset {offset}: {reason}"
                )
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "{kind} limit exceeded: {actual} > {limit}")
            }
            Self::MessageFraming(err) => write!(f, "message framing error: {err}"),
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FrameBytes => "frame bytes",
            Self::MessageCount => "message count",
            Self::MessageLength => "message length",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for MessageFramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVarint => write!(f, "invalid varint"),
            Self::Truncated { needed, available } => {
                write!(
                    f,
                    "truncated message: need {needed} bytes, have {available}"
                )
            }
        }
    }
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthOverflow { length } => {
                write!(f, "length {length} does not fit in a u32 prefix")
            }
            Self::Compress { reason } => write!(f, "compression failed: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl std::error::Error for EncodeError {}

impl From<MessageFramingError> for DecodeError {
    fn from(err: MessageFramingError) -> Self {
        Self::MessageFraming(err)
    }
}

impl From<BitError> for MessageFramingError {
    fn from(err: BitError) -> Self {
        match err {
            BitError::UnexpectedEof {
                requested,
                available,
            } => Self::Truncated {
                needed: requested,
                available,
            },
            _ => Self::InvalidVarint,
        }
    }
}
