//! Synthesizes recordings.
//!
//! Every encoder the decoder has a counterpart for is reachable from here,
//! so tests, benches and fuzz seeds can build recordings frame by frame:
//!
//! ```
//! use demodec::writer::DemoWriter;
//! use demodec::codec::{FileHeader, ServerInfo};
//!
//! let mut writer = DemoWriter::new();
//! writer.file_header(&FileHeader::default()).unwrap();
//! writer
//!     .signon(0, |packet| {
//!         packet.server_info(&ServerInfo {
//!             max_clients: 10,
//!             max_classes: 64,
//!             tick_interval: 1.0 / 64.0,
//!             map_name: "de_dust2".into(),
//!         })?;
//!         Ok(())
//!     })
//!     .unwrap();
//! let bytes = writer.finish().unwrap();
//! assert!(demodec::parse_header(&bytes).is_ok());
//! ```

use bitstream::BitWriter;
use codec::{
    class_id_bits, encode_convars, encode_create_string_table, encode_end_of_match, encode_event,
    encode_event_list, encode_item_drops, encode_packet_entities, encode_update_string_table,
    write_field_delta, ChatMessage, CodecError, EconItem, EntityOp, EntryWrite, EventDescriptor,
    EventKeyType, FieldValue, FileHeader, FileInfo, PlayerEndData, ServerInfo, UserDataLayout,
    VoicePacket,
};
use schema::{encode_class_info, encode_send_tables, ClassInfo, FieldPath, SchemaRegistry, Serializer};
use wire::{encode_frame, encode_message, encode_preamble, FrameKind, MessageTag, Preamble, PREAMBLE_SIZE};

use crate::error::{DemoError, DemoResult};

/// Byte offset of the file-info offset inside the preamble.
const FILE_INFO_OFFSET_POS: usize = 12;

/// What packets need to encode their messages.
#[derive(Debug, Clone)]
struct WriterContext {
    registry: SchemaRegistry,
    class_bits: u8,
    tick_interval: f32,
    tables: Vec<UserDataLayout>,
    compress: bool,
}

/// Builds a recording frame by frame.
#[derive(Debug, Clone)]
pub struct DemoWriter {
    out: Vec<u8>,
    ctx: WriterContext,
    frames: u32,
    last_tick: u32,
}

impl Default for DemoWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoWriter {
    #[must_use]
    pub fn new() -> Self {
        let mut out = Vec::with_capacity(4096);
        encode_preamble(&Preamble::new(0), &mut out);
        Self {
            out,
            ctx: WriterContext {
                registry: SchemaRegistry::new(),
                class_bits: 1,
                tick_interval: 1.0 / 64.0,
                tables: Vec::new(),
                compress: false,
            },
            frames: 0,
            last_tick: 0,
        }
    }

    /// Compresses every frame payload and string table data block.
    #[must_use]
    pub fn compressed(mut self, compress: bool) -> Self {
        self.ctx.compress = compress;
        self
    }

    /// The schema declared so far.
    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.ctx.registry
    }

    /// Resolves property names of a class to field paths.
    pub fn fields(
        &self,
        class_id: u32,
        named: &[(&str, FieldValue)],
    ) -> DemoResult<Vec<(FieldPath, FieldValue)>> {
        named
            .iter()
            .map(|(name, value)| {
                let descriptor = self.ctx.registry.resolve(class_id, name).found().ok_or_else(|| {
                    DemoError::UnknownProperty {
                        class_id,
                        name: (*name).to_string(),
                    }
                })?;
                Ok((descriptor.path, value.clone()))
            })
            .collect()
    }

    /// Encodes an instance baseline value for the `instancebaseline` table.
    pub fn baseline(&self, class_id: u32, named: &[(&str, FieldValue)]) -> DemoResult<Vec<u8>> {
        let fields = self.fields(class_id, named)?;
        let mut writer = BitWriter::new();
        write_field_delta(&mut writer, &self.ctx.registry, class_id, &fields)?;
        Ok(writer.finish())
    }

    pub fn file_header(&mut self, header: &FileHeader) -> DemoResult<&mut Self> {
        self.raw_frame(FrameKind::FileHeader, 0, &header.encode())
    }

    /// Declares serializers; later entity ops encode against them.
    pub fn send_tables(&mut self, serializers: Vec<Serializer>) -> DemoResult<&mut Self> {
        let payload = encode_send_tables(&serializers);
        self.ctx.registry.add_serializers(serializers);
        self.raw_frame(FrameKind::SendTables, 0, &payload)
    }

    pub fn class_info(&mut self, classes: Vec<ClassInfo>) -> DemoResult<&mut Self> {
        let payload = encode_class_info(&classes);
        self.ctx.registry.add_classes(classes);
        self.raw_frame(FrameKind::ClassInfo, 0, &payload)
    }

    pub fn sync_tick(&mut self, tick: u32) -> DemoResult<&mut Self> {
        self.raw_frame(FrameKind::SyncTick, tick, &[])
    }

    /// Writes a signon packet built by `build`.
    pub fn signon<F>(&mut self, tick: u32, build: F) -> DemoResult<&mut Self>
    where
        F: FnOnce(&mut PacketBuilder<'_>) -> DemoResult<()>,
    {
        self.packet_of(FrameKind::SignonPacket, tick, build)
    }

    /// Writes a regular packet built by `build`.
    pub fn packet<F>(&mut self, tick: u32, build: F) -> DemoResult<&mut Self>
    where
        F: FnOnce(&mut PacketBuilder<'_>) -> DemoResult<()>,
    {
        self.packet_of(FrameKind::Packet, tick, build)
    }

    fn packet_of<F>(&mut self, kind: FrameKind, tick: u32, build: F) -> DemoResult<&mut Self>
    where
        F: FnOnce(&mut PacketBuilder<'_>) -> DemoResult<()>,
    {
        let mut builder = PacketBuilder {
            ctx: &mut self.ctx,
            payload: Vec::new(),
        };
        build(&mut builder)?;
        let payload = builder.payload;
        self.raw_frame(kind, tick, &payload)
    }

    /// Writes a frame with an arbitrary payload.
    pub fn raw_frame(&mut self, kind: FrameKind, tick: u32, payload: &[u8]) -> DemoResult<&mut Self> {
        encode_frame(&mut self.out, kind, tick, payload, self.ctx.compress)?;
        self.frames += 1;
        self.last_tick = self.last_tick.max(tick);
        Ok(self)
    }

    /// Appends raw bytes, for building damaged recordings.
    pub fn raw_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Writes the file-info and stop frames and returns the recording.
    pub fn finish(mut self) -> DemoResult<Vec<u8>> {
        let info = FileInfo {
            playback_time: self.last_tick as f32 * self.ctx.tick_interval,
            playback_ticks: self.last_tick,
            playback_frames: self.frames,
        };
        let offset = u32::try_from(self.out.len())
            .map_err(|_| wire::EncodeError::LengthOverflow { length: self.out.len() })?;
        let tick = self.last_tick;
        self.raw_frame(FrameKind::FileInfo, tick, &info.encode())?;
        self.raw_frame(FrameKind::Stop, tick, &[])?;
        self.out[FILE_INFO_OFFSET_POS..PREAMBLE_SIZE].copy_from_slice(&offset.to_le_bytes());
        Ok(self.out)
    }

    /// Writes the stop frame only, leaving the recording without file info.
    pub fn finish_bare(mut self) -> DemoResult<Vec<u8>> {
        let tick = self.last_tick;
        self.raw_frame(FrameKind::Stop, tick, &[])?;
        Ok(self.out)
    }
}

/// Collects the messages of one packet frame.
#[derive(Debug)]
pub struct PacketBuilder<'w> {
    ctx: &'w mut WriterContext,
    payload: Vec<u8>,
}

impl PacketBuilder<'_> {
    /// Appends a message with an arbitrary body.
    pub fn message(&mut self, tag: MessageTag, body: &[u8]) -> DemoResult<&mut Self> {
        encode_message(&mut self.payload, tag, body)?;
        Ok(self)
    }

    /// Writes ServerInfo; later creates size their class ids from it.
    pub fn server_info(&mut self, info: &ServerInfo) -> DemoResult<&mut Self> {
        self.ctx.class_bits = class_id_bits(info.max_classes);
        if info.tick_interval > 0.0 {
            self.ctx.tick_interval = info.tick_interval;
        }
        self.message(MessageTag::ServerInfo, &info.encode())
    }

    /// Creates a string table and returns its id.
    pub fn create_string_table(
        &mut self,
        name: &str,
        max_entries: u32,
        layout: UserDataLayout,
        entries: &[EntryWrite<'_>],
    ) -> DemoResult<u32> {
        let body =
            encode_create_string_table(name, max_entries, layout, entries, self.ctx.compress)?;
        let table_id = self.ctx.tables.len() as u32;
        self.ctx.tables.push(layout);
        self.message(MessageTag::CreateStringTable, &body)?;
        Ok(table_id)
    }

    pub fn update_string_table(
        &mut self,
        table_id: u32,
        entries: &[EntryWrite<'_>],
    ) -> DemoResult<&mut Self> {
        let layout = *self
            .ctx
            .tables
            .get(table_id as usize)
            .ok_or(CodecError::UnknownStringTable { table_id })?;
        let body = encode_update_string_table(table_id, layout, entries)?;
        self.message(MessageTag::UpdateStringTable, &body)
    }

    /// Writes one PacketEntities message. Ops must be in ascending id order.
    pub fn entities(&mut self, ops: &[EntityOp]) -> DemoResult<&mut Self> {
        let body = encode_packet_entities(ops, &self.ctx.registry, self.ctx.class_bits)?;
        self.message(MessageTag::PacketEntities, &body)
    }

    pub fn event_list(&mut self, descriptors: &[EventDescriptor]) -> DemoResult<&mut Self> {
        self.message(MessageTag::GameEventList, &encode_event_list(descriptors))
    }

    pub fn event(&mut self, id: u32, values: &[(EventKeyType, FieldValue)]) -> DemoResult<&mut Self> {
        let body = encode_event(id, values)?;
        self.message(MessageTag::GameEvent, &body)
    }

    pub fn chat(&mut self, chat: &ChatMessage) -> DemoResult<&mut Self> {
        self.message(MessageTag::ChatMessage, &chat.encode())
    }

    pub fn voice(&mut self, packet: &VoicePacket<'_>) -> DemoResult<&mut Self> {
        self.message(MessageTag::VoiceData, &packet.encode())
    }

    pub fn convars(&mut self, vars: &[(&str, &str)]) -> DemoResult<&mut Self> {
        self.message(MessageTag::SetConVar, &encode_convars(vars))
    }

    pub fn item_drops(&mut self, items: &[EconItem]) -> DemoResult<&mut Self> {
        self.message(MessageTag::ItemDrops, &encode_item_drops(items))
    }

    pub fn end_of_match(&mut self, players: &[PlayerEndData]) -> DemoResult<&mut Self> {
        self.message(MessageTag::EndOfMatch, &encode_end_of_match(players))
    }
}
