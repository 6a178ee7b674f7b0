//! Bounds applied while decoding schema payloads.

/// Schema decoding limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
    /// Maximum serializers declared by one SendTables payload.
    pub max_serializers: usize,

    /// Maximum fields declared by one serializer.
    pub max_fields_per_serializer: usize,

    /// Maximum classes declared by one ClassInfo payload.
    pub max_classes: usize,

    /// Maximum declared length of a fixed array.
    pub max_array_len: usize,

    /// Maximum length of serializer, class and field names.
    pub max_name_len: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_serializers: 8 * 1024,
            max_fields_per_serializer: 4 * 1024,
            max_classes: 8 * 1024,
            max_array_len: 64 * 1024,
            max_name_len: 256,
        }
    }
}

impl SchemaLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_serializers: 64,
            max_fields_per_serializer: 64,
            max_classes: 64,
            max_array_len: 256,
            max_name_len: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_serializers: usize::MAX,
            max_fields_per_serializer: usize::MAX,
            max_classes: usize::MAX,
            max_array_len: usize::MAX,
            max_name_len: usize::MAX,
        }
    }
}
