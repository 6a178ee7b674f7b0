//! Limits for codec-level decoding.

/// Codec-specific limits enforced while decoding message bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecLimits {
    /// Entity ids must stay below this bound.
    pub max_entities: usize,
    /// Maximum field paths in one entity delta.
    pub max_field_paths: usize,
    /// Maximum entries in one PacketEntities message.
    pub max_updates_per_packet: usize,
    /// Maximum length of decoded strings.
    pub max_string_len: usize,
    /// Maximum number of string tables.
    pub max_string_tables: usize,
    /// Maximum entry index in a string table.
    pub max_string_table_entries: usize,
    /// Maximum user-data bytes on one string table entry.
    pub max_user_data_len: usize,
    /// Maximum keys on one event descriptor or event.
    pub max_event_keys: usize,
    /// Maximum entries in a convar, item or player list.
    pub max_list_len: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_entities: 1 << 14,
            max_field_paths: 4096,
            max_updates_per_packet: 1 << 14,
            max_string_len: 4096,
            max_string_tables: 64,
            max_string_table_entries: 1 << 16,
            max_user_data_len: 1 << 17,
            max_event_keys: 256,
            max_list_len: 4096,
        }
    }
}

impl CodecLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_entities: 2048,
            max_field_paths: 256,
            max_updates_per_packet: 256,
            max_string_len: 256,
            max_string_tables: 16,
            max_string_table_entries: 1024,
            max_user_data_len: 4096,
            max_event_keys: 32,
            max_list_len: 64,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_entities: usize::MAX,
            max_field_paths: usize::MAX,
            max_updates_per_packet: usize::MAX,
            max_string_len: usize::MAX,
            max_string_tables: usize::MAX,
            max_string_table_entries: usize::MAX,
            max_user_data_len: usize::MAX,
            max_event_keys: usize::MAX,
            max_list_len: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_limits_smaller() {
        let testing = CodecLimits::for_testing();
        let default = CodecLimits::default();
        assert!(testing.max_entities < default.max_entities);
        assert!(testing.max_field_paths < default.max_field_paths);
        assert!(testing.max_string_table_entries < default.max_string_table_entries);
    }

    #[test]
    fn unlimited_is_max() {
        let limits = CodecLimits::unlimited();
        assert_eq!(limits.max_entities, usize::MAX);
        assert_eq!(limits.max_event_keys, usize::MAX);
    }
}
