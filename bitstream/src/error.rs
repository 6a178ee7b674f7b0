//! Error types for bitstream operations.

use std::fmt;

/// Result type for bitstream operations.
pub type BitResult<T> = Result<T, BitError>;

/// Errors that can occur during bit-level or byte-level decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitError {
    /// Attempted to read past the end of the buffer.
    ///
    /// Units are bits for [`BitReader`](crate::BitReader) and bytes for
    /// [`ByteReader`](crate::ByteReader).
    UnexpectedEof {
        /// Amount requested.
        requested: usize,
        /// Amount available.
        available: usize,
    },

    /// Invalid bit count for the operation.
    InvalidBitCount {
        /// The invalid bit count provided.
        bits: u8,
        /// Maximum allowed bits for this operation.
        max_bits: u8,
    },

    /// Value exceeds the range representable by the specified number of bits.
    ValueOutOfRange {
        /// The value that was out of range.
        value: u64,
        /// Number of bits available.
        bits: u8,
    },

    /// A varint ran past its maximum encoded length.
    InvalidVarint,

    /// A NUL-terminated string exceeded the allowed length.
    StringTooLong {
        /// Maximum accepted length in bytes.
        limit: usize,
    },

    /// A compressed block could not be decompressed.
    Decompress {
        /// Description reported by the decompressor.
        reason: String,
    },
}

impl BitError {
    /// Returns `true` if the error was caused by running out of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::UnexpectedEof { .. })
    }
}

impl fmt::Display for BitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "unexpected end of input: requested {requested}, only {available} available"
                )
            }
            Self::InvalidBitCount { bits, max_bits } => {
                write!(f, "invalid bit count {bits}, maximum allowed is {max_bits}")
            }
            Self::ValueOutOfRange { value, bits } => {
                write!(f, "value {value} cannot be represented in {bits} bits")
            }
            Self::InvalidVarint => write!(f, "invalid varint encoding"),
            Self::StringTooLong { limit } => {
                write!(f, "string exceeds {limit} bytes without terminator")
            }
            Self::Decompress { reason } => write!(f, "decompression failed: {reason}"),
        }
    }
}

impl std::error::Error for BitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unexpected_eof() {
        let err = BitError::UnexpectedEof {
            requested: 8,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("requested 8"));
        assert!(msg.contains("only 3"));
    }

    #[test]
    fn error_display_invalid_bit_count() {
        let err = BitError::InvalidBitCount {
            bits: 65,
            max_bits: 64,
        };
        let msg = err.to_string();
        assert!(msg.contains("65"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn error_display_value_out_of_range() {
        let err = BitError::ValueOutOfRange {
            value: 256,
            bits: 8,
        };
        let msg = err.to_string();
        assert!(msg.contains("256"));
        assert!(msg.contains("8 bits"));
    }

    #[test]
    fn error_display_decompress() {
        let err = BitError::Decompress {
            reason: "corrupt input".to_string(),
        };
        assert!(err.to_string().contains("corrupt input"));
    }

    #[test]
    fn eof_classification() {
        assert!(BitError::UnexpectedEof {
            requested: 1,
            available: 0
        }
        .is_eof());
        assert!(!BitError::InvalidVarint.is_eof());
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<BitError>();
    }
}
