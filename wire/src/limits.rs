//! Configurable limits for bounded decoding.

/// Wire-level limits for frame and message decoding.
///
/// These limits are enforced during decoding to bound memory use on hostile
/// or corrupt input. Message body parsing limits belong to higher layers
/// (schema/codec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum frame payload size in bytes, after decompression.
    pub max_frame_bytes: usize,

    /// Maximum number of messages in one packet frame.
    pub max_messages: usize,

    /// Maximum length of a single message body in bytes.
    pub max_message_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // Full packets on busy servers reach a few megabytes
            max_frame_bytes: 64 * 1024 * 1024,
            max_messages: 64 * 1024,
            max_message_len: 16 * 1024 * 1024,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
            max_messages: 256,
            max_message_len: 16 * 1024,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_bytes: usize::MAX,
            max_messages: usize::MAX,
            max_message_len: usize::MAX,
        }
    }
}
