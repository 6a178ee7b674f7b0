//! File and frame layout for the demodec replay decoder.
//!
//! This crate handles the binary container: the file preamble, outer frames
//! (with optional Snappy compression), inner message framing inside packet
//! frames, and limit enforcement. It does not know what frames mean, only
//! how they are laid out.
//!
//! # Design Principles
//!
//! - **Stable container format** - The format is versioned and changes are documented.
//! - **Bounded decoding** - All length fields are validated against limits before use.
//! - **Forward compatible** - Unknown frame and message types are surfaced, not rejected.
//! - **Lazy** - Frames and messages are produced on demand, borrowing from the input.
//!
//! See `WIRE_FORMAT.md` for the complete layout.

mod error;
mod frame;
mod header;
mod limits;
mod message;

pub use error::{DecodeError, EncodeError, LimitKind, MessageFramingError, WireResult};
pub use frame::{encode_frame, read_frame_at, Frame, FrameKind, Frames, COMPRESSED_FLAG};
pub use header::{decode_preamble, encode_preamble, Preamble, MAGIC, PREAMBLE_SIZE, VERSION};
pub use limits::Limits;
pub use message::{decode_messages, encode_message, Message, MessageTag, Messages};
