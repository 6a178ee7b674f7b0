//! Schema decoding and validation errors.

use std::fmt;

use bitstream::BitError;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur when decoding or validating schema payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// The payload ended early or held a malformed primitive.
    Bitstream(BitError),

    /// An encoding tag this decoder does not know.
    UnknownEncoding { tag: u8 },

    /// A field kind tag this decoder does not know.
    UnknownFieldKind { tag: u8 },

    /// A vector encoding with a dimension other than 2 or 3.
    InvalidVectorDims { dims: u8 },

    /// Invalid bit width for a fixed-width or quantized encoding.
    InvalidBitWidth { bits: u8 },

    /// Quantized float range is empty or inverted.
    InvalidQuantizedRange { low: u32, high: u32 },

    /// Two fields of one serializer share a name.
    DuplicateField { serializer: String, field: String },

    /// A field name is empty or contains the path separator.
    InvalidFieldName { serializer: String, field: String },

    /// Limits exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific schema limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Serializers,
    FieldsPerSerializer,
    Classes,
    ArrayLength,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bitstream(err) => write!(f, "malformed schema payload: {err}"),
            Self::UnknownEncoding { tag } => write!(f, "unknown field encoding tag {tag}"),
            Self::UnknownFieldKind { tag } => write!(f, "unknown field kind tag {tag}"),
            Self::InvalidVectorDims { dims } => {
                write!(f, "vector encoding must have 2 or 3 dimensions, got {dims}")
            }
            Self::InvalidBitWidth { bits } => write!(f, "invalid bit width {bits}"),
            Self::InvalidQuantizedRange { low, high } => write!(
                f,
                "invalid quantized range [{}, {}]",
                f32::from_bits(*low),
                f32::from_bits(*high)
            ),
            Self::DuplicateField { serializer, field } => {
                write!(f, "serializer {serializer} declares field {field} twice")
            }
            Self::InvalidFieldName { serializer, field } => {
                write!(f, "serializer {serializer} has invalid field name {field:?}")
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
            Self::Serializers => "serializer count",
            Self::FieldsPerSerializer => "fields per serializer",
            Self::Classes => "class count",
            Self::ArrayLength => "array length",
        };
        write!(f, "{name}")
    }
}

impl std::error::Error for SchemaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bitstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BitError> for SchemaError {
    fn from(err: BitError) -> Self {
        Self::Bitstream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_duplicate_field() {
        let err = SchemaError::DuplicateField {
            serializer: "CCSPlayerPawn".to_string(),
            field: "m_iHealth".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "serializer CCSPlayerPawn declares field m_iHealth twice"
        );
    }

    #[test]
    fn display_range_uses_floats() {
        let err = SchemaError::InvalidQuantizedRange {
            low: 10.0f32.to_bits(),
            high: 1.0f32.to_bits(),
        };
        assert_eq!(err.to_string(), "invalid quantized range [10, 1]");
    }

    #[test]
    fn bit_error_is_source() {
        use std::error::Error;
        let err = SchemaError::from(BitError::InvalidVarint);
        assert!(err.source().is_some());
    }
}
