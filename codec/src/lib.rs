//! Message body decoding for the demodec replay decoder.
//!
//! This crate sits between the framing layer and the public parser. It
//! turns inner message bodies into state:
//!
//! - PacketEntities bodies update an [`EntityTable`] through Huffman-coded
//!   field paths and per-encoding values
//! - Instance baselines are cached per class in a [`BaselineStore`]
//! - String tables are created and updated in a [`StringTables`] set
//! - Game events decode against descriptors held by an [`EventDecoder`]
//! - Voice packets are decoded and assembled per speaker by a
//!   [`VoiceExtractor`]; Opus needs the `voice` feature
//! - Server variables, item drops and end-of-match inventories decode to
//!   plain lists
//!
//! Every decoder has a matching encoder so recordings can be synthesized
//! for tests, benches and fuzz seeds.
//!
//! # Design Principles
//!
//! - **Stream order** - State after a body is a pure function of the state before it and the body.
//! - **Bounded decoding** - Counts, ids and lengths are checked against [`CodecLimits`].
//! - **Deterministic** - Encoders produce the same bytes for the same input.

mod baseline;
mod entities;
mod error;
mod events;
mod header;
mod items;
mod limits;
mod path;
mod stringtable;
mod types;
mod value;
mod voice;

pub use baseline::{BaselineStore, INSTANCE_BASELINE_TABLE};
pub use entities::{
    class_id_bits, encode_packet_entities, read_field_delta, write_field_delta, ApplyContext,
    Entity, EntityChanges, EntityOp, EntityTable, ENTITY_SERIAL_BITS,
};
pub use error::{CodecError, CodecResult, LimitKind, PathReason};
pub use events::{
    encode_event, encode_event_list, ChatMessage, EventDecoder, EventDescriptor, EventField,
    EventKey, EventKeyType, GameEvent, CHAT_MESSAGE_EVENT,
};
pub use header::{FileHeader, FileInfo, ServerInfo};
pub use items::{
    decode_convars, decode_end_of_match, decode_item_drops, encode_convars, encode_end_of_match,
    encode_item_drops, EconItem, PlayerEndData,
};
pub use limits::CodecLimits;
pub use path::{op_code_len, read_field_paths, write_field_paths, PathOp};
pub use stringtable::{
    encode_create_string_table, encode_entries, encode_update_string_table, EntryWrite,
    StringEntry, StringTable, StringTables, TableChange, UserDataLayout, UserInfo,
    USER_INFO_TABLE,
};
pub use types::{EntityId, Tick, ENTITY_HANDLE_MASK, INVALID_HANDLE};
pub use value::{read_value, write_value, FieldValue, SIMULATION_TICK_SECONDS};
#[cfg(feature = "voice")]
pub use voice::OpusDecoder;
pub use voice::{
    DecoderFactory, Pcm16Decoder, VoiceDecoder, VoiceExtractor, VoiceFormat, VoicePacket,
    VoiceTrack,
};
