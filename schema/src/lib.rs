//! Entity schema model for the demodec replay decoder.
//!
//! A recording declares its own schema before any entity data appears:
//! - Serializers: ordered field lists with per-field encodings
//! - Classes: numeric ids bound to a serializer
//! - Field paths: positional addresses into nested fields
//!
//! The [`SchemaRegistry`] accumulates both and answers name/path questions
//! for the entity decoder and for user-facing property lookups.
//!
//! # Design Principles
//!
//! - **Data-driven** - Nothing about a game's classes is compiled in; every class comes from the recording.
//! - **Append-only** - Declarations are never replaced, so earlier lookups stay valid.
//! - **Deterministic hashing** - The fingerprint is stable given the same declarations.
//! - **Bounded decoding** - Payload counts and lengths are checked against [`SchemaLimits`].

mod error;
mod field;
mod hash;
mod limits;
mod path;
mod payload;
mod registry;
mod serializer;

pub use error::{LimitKind, SchemaError, SchemaResult};
pub use field::{
    EncoderFlags, FieldDecl, FieldEncoding, FieldKind, FieldType, FloatEncoding, QuantizedFloat,
};
pub use hash::fingerprint;
pub use limits::SchemaLimits;
pub use path::{FieldPath, MAX_PATH_DEPTH};
pub use payload::{decode_class_info, decode_send_tables, encode_class_info, encode_send_tables};
pub use registry::{ClassSchema, Lookup, PropertyDescriptor, SchemaRegistry};
pub use serializer::{ClassInfo, Serializer, SerializerBuilder};
