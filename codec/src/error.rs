//! Error types for codec operations.

use std::fmt;

use schema::{FieldPath, FieldType, SchemaError};

use crate::voice::VoiceFormat;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding or encoding message bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// Bitstream error.
    Bitstream(bitstream::BitError),

    /// Schema error while decoding an embedded schema payload.
    Schema(SchemaError),

    /// An update referenced an entity that is not live.
    EntityNotFound { entity_id: u32 },

    /// A create referenced a class the registry does not know.
    ClassNotFound { class_id: u32 },

    /// The field path op stream is malformed.
    InvalidFieldPath { reason: PathReason },

    /// A field path does not address a value of the entity's class.
    UnknownFieldPath { class_id: u32, path: FieldPath },

    /// Entities are not provided in ascending id order.
    InvalidEntityOrder { previous: u32, current: u32 },

    /// A value does not match the encoding of its property.
    ValueMismatch { path: FieldPath, expected: FieldType },

    /// An update referenced a string table that was never created.
    UnknownStringTable { table_id: u32 },

    /// String table entries handed to the encoder are not ascending.
    UnorderedTableEntries { previous: u32, current: u32 },

    /// An event value carried an unknown type tag.
    UnknownEventKeyType { tag: u8 },

    /// An event value handed to the encoder does not fit its key type.
    EventValueMismatch { index: usize },

    /// A voice payload is not a whole number of samples.
    InvalidVoicePayload { len: usize },

    /// A voice decoder rejected a packet.
    VoiceDecode { format: VoiceFormat, reason: String },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    EntityId,
    FieldPaths,
    UpdatesPerPacket,
    StringTables,
    StringTableEntries,
    UserDataLength,
    EventKeys,
    ListLength,
}

/// Details for invalid field path errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathReason {
    /// A push went past the maximum depth.
    DepthOverflow,
    /// A pop removed the root component.
    PopUnderflow,
    /// A finished path has a negative component.
    NegativeComponent,
    /// A component overflowed.
    IndexOverflow,
    /// Paths handed to the encoder are not strictly ascending.
    NotAscending,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(e) => write!(f, "bitstream error: {e}"),
            Self::Schema(e) => write!(f, "schema error: {e}"),
            Self::EntityNotFound { entity_id } => write!(f, "entity {entity_id} not found"),
            Self::ClassNotFound { class_id } => write!(f, "class {class_id} not found"),
            Self::InvalidFieldPath { reason } => write!(f, "invalid field path: {reason}"),
            Self::UnknownFieldPath { class_id, path } => {
                write!(f, "field path {path} is not a property of class {class_id}")
            }
            Self::InvalidEntityOrder { previous, current } => {
                write!(f, "entity order invalid: {previous} then {current}")
            }
            Self::ValueMismatch { path, expected } => {
                write!(f, "value at {path} does not match {expected} encoding")
            }
            Self::UnknownStringTable { table_id } => {
                write!(f, "string table {table_id} does not exist")
            }
            Self::UnorderedTableEntries { previous, current } => {
                write!(f, "string table entries out of order: {previous} then {current}")
            }
            Self::UnknownEventKeyType { tag } => write!(f, "unknown event key type {tag}"),
            Self::EventValueMismatch { index } => {
                write!(f, "event value {index} does not match its key type")
            }
            Self::InvalidVoicePayload { len } => {
                write!(f, "voice payload of {len} bytes is not whole samples")
            }
            Self::VoiceDecode { format, reason } => {
                write!(f, "{format:?} voice packet rejected: {reason}")
            }
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => write!(f, "{kind} limit exceeded: {actual} > {limit}"),
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EntityId => "entity id",
            Self::FieldPaths => "field paths",
            Self::UpdatesPerPacket => "updates per packet",
            Self::StringTables => "string tables",
            Self::StringTableEntries => "string table entries",
            Self::UserDataLength => "user data length",
            Self::EventKeys => "event keys",
            Self::ListLength => "list length",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for PathReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::DepthOverflow => "push past maximum depth",
            Self::PopUnderflow => "pop past the root",
            Self::NegativeComponent => "negative component",
            Self::IndexOverflow => "component overflow",
            Self::NotAscending => "paths not strictly ascending",
        };
        write!(f, "{reason}")
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(e) => Some(e),
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bitstream::BitError> for CodecError {
    fn from(err: bitstream::BitError) -> Self {
        Self::Bitstream(err)
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}
