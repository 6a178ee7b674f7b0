//! The public error taxonomy.

use std::fmt;
use std::path::PathBuf;

use bitstream::BitError;
use codec::CodecError;
use schema::SchemaError;
use wire::{DecodeError, EncodeError, MessageFramingError};

/// Result type for parser operations.
pub type DemoResult<T> = Result<T, DemoError>;

/// Errors surfaced by a parse request.
///
/// Fatal errors abort only the request that raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DemoError {
    /// The recording ended inside a frame.
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The input is not a recording.
    InvalidMagic { found: [u8; 8] },

    /// The recording uses a format version this decoder does not support.
    UnsupportedVersion { found: u32 },

    /// A frame command this decoder does not know, in strict mode.
    UnknownFrameType { command: u32, offset: usize },

    /// A framing error other than truncation.
    Wire(DecodeError),

    /// A schema payload could not be decoded.
    Schema(SchemaError),

    /// A message body could not be decoded.
    Codec(CodecError),

    /// A recording could not be synthesized.
    Encode(EncodeError),

    /// A property name the class does not have, while synthesizing.
    UnknownProperty { class_id: u32, name: String },

    /// A recording could not be read from disk.
    Io {
        path: PathBuf,
        kind: std::io::ErrorKind,
        message: String,
    },

    /// The worker pool could not be built.
    Dispatch { reason: String },
}

impl DemoError {
    /// Returns `true` when the error means the input ended early, whichever
    /// layer noticed it.
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::Truncated { .. } => true,
            Self::Wire(err) => err.is_truncation(),
            Self::Schema(SchemaError::Bitstream(err)) => err.is_eof(),
            Self::Codec(CodecError::Bitstream(err)) => err.is_eof(),
            Self::Codec(CodecError::Schema(SchemaError::Bitstream(err))) => err.is_eof(),
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "recording truncated at offset {offset}: need {needed} bytes, have {available}"
            ),
            Self::InvalidMagic { found } => {
                write!(f, "not a recording: magic bytes {found:02x?}")
            }
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported recording version {found}")
            }
            Self::UnknownFrameType { command, offset } => {
                write!(f, "unknown frame command {command} at offset {offset}")
            }
            Self::Wire(err) => write!(f, "framing error: {err}"),
            Self::Schema(err) => write!(f, "schema error: {err}"),
            Self::Codec(err) => write!(f, "decode error: {err}"),
            Self::Encode(err) => write!(f, "encode error: {err}"),
            Self::UnknownProperty { class_id, name } => {
                write!(f, "class {class_id} has no property {name:?}")
            }
            Self::Io {
                path,
                kind,
                message,
            } => write!(f, "failed to read {} ({kind:?}): {message}", path.display()),
            Self::Dispatch { reason } => write!(f, "dispatch error: {reason}"),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Wire(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DecodeError> for DemoError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::PreambleTooSmall { actual, required } => Self::Truncated {
                offset: 0,
                needed: required,
                available: actual,
            },
            DecodeError::InvalidMagic { found } => Self::InvalidMagic { found },
            DecodeError::UnsupportedVersion { found } => Self::UnsupportedVersion { found },
            DecodeError::Truncated {
                offset,
                needed,
                available,
            } => Self::Truncated {
                offset,
                needed,
                available,
            },
            other => Self::Wire(other),
        }
    }
}

impl From<MessageFramingError> for DemoError {
    fn from(err: MessageFramingError) -> Self {
        Self::Wire(DecodeError::MessageFraming(err))
    }
}

impl From<SchemaError> for DemoError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl From<CodecError> for DemoError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<BitError> for DemoError {
    fn from(err: BitError) -> Self {
        Self::Codec(CodecError::Bitstream(err))
    }
}

impl From<EncodeError> for DemoError {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}
