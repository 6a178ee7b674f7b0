//! Parse configuration.

use codec::CodecLimits;
use schema::SchemaLimits;

/// Options shared by every parse request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseOptions {
    /// Fail on corrupt inner messages and unknown frame commands instead of
    /// logging and skipping them.
    pub strict: bool,
    pub wire: wire::Limits,
    pub schema: SchemaLimits,
    pub codec: CodecLimits,
}

impl ParseOptions {
    /// Creates options with smaller limits, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            strict: false,
            wire: wire::Limits::for_testing(),
            schema: SchemaLimits::for_testing(),
            codec: CodecLimits::for_testing(),
        }
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
