//! The frame-by-frame state machine behind every request.
//!
//! A [`DemoParser`] owns one forward pass over a recording. Each frame is
//! read with [`DemoParser::next_frame`] and folded into [`DemoState`] with
//! [`DemoParser::apply`]; callers that need to act between frames (the
//! projection engine does, to snapshot a tick before the next one starts)
//! drive the two halves themselves.

use bitstream::ByteReader;
use codec::{
    class_id_bits, decode_convars, decode_end_of_match, decode_item_drops, ApplyContext,
    ChatMessage, FileHeader, FileInfo, GameEvent, ServerInfo, Tick, VoiceExtractor, VoicePacket,
    CHAT_MESSAGE_EVENT,
};
use schema::{decode_class_info, decode_send_tables};
use tracing::{debug, debug_span, trace, warn, Span};
use wire::{decode_preamble, Frame, FrameKind, Frames, Message, MessageTag, Messages, Preamble};

use crate::error::{DemoError, DemoResult};
use crate::options::ParseOptions;
use crate::request::Selection;
use crate::state::DemoState;

/// One forward pass over a recording.
#[derive(Debug)]
pub struct DemoParser<'a> {
    preamble: Preamble,
    frames: Frames<'a>,
    state: DemoState,
    options: ParseOptions,
    events: Selection<String>,
    voice: Option<VoiceExtractor>,
    span: Span,
}

impl<'a> DemoParser<'a> {
    /// Validates the preamble and positions the parser at the first frame.
    ///
    /// An unsupported version is rejected here, before any frame is read.
    pub fn new(bytes: &'a [u8], options: ParseOptions) -> DemoResult<Self> {
        let preamble = decode_preamble(bytes)?;
        let frames = Frames::new(bytes, &options.wire)?;
        let span = debug_span!("pass", bytes = bytes.len(), version = preamble.version);
        Ok(Self {
            preamble,
            frames,
            state: DemoState::new(options.codec.clone()),
            options,
            events: Selection::All,
            voice: None,
            span,
        })
    }

    /// Restricts which game events are decoded. Others are skipped after
    /// reading their id.
    #[must_use]
    pub fn with_events(mut self, events: Selection<String>) -> Self {
        self.events = events;
        self
    }

    /// Collects voice packets into `extractor`.
    #[must_use]
    pub fn with_voice(mut self, extractor: VoiceExtractor) -> Self {
        self.voice = Some(extractor);
        self
    }

    #[must_use]
    pub const fn preamble(&self) -> Preamble {
        self.preamble
    }

    #[must_use]
    pub const fn state(&self) -> &DemoState {
        &self.state
    }

    #[must_use]
    pub const fn options(&self) -> &ParseOptions {
        &self.options
    }

    #[must_use]
    pub fn into_state(self) -> DemoState {
        self.state
    }

    /// Returns the state and the voice extractor, if one was attached.
    #[must_use]
    pub fn into_parts(self) -> (DemoState, Option<VoiceExtractor>) {
        (self.state, self.voice)
    }

    pub(crate) fn note_unresolved(&mut self, count: u64) {
        self.state.counters.unresolved_fields += count;
    }

    /// Reads the next frame without applying it.
    ///
    /// Frames that fail to decompress are skipped unless strict mode is on.
    /// Truncation is always fatal.
    pub fn next_frame(&mut self) -> DemoResult<Option<Frame<'a>>> {
        let span = self.span.clone();
        let _enter = span.enter();
        loop {
            match self.frames.next() {
                None => return Ok(None),
                Some(Ok(frame)) => return Ok(Some(frame)),
                Some(Err(err)) if err.is_recoverable() && !self.options.strict => {
                    debug!(%err, "skipping undecodable frame");
                    self.state.counters.skipped_frames += 1;
                }
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    /// Folds one frame into the state and returns the game events it carried
    /// that pass the event filter.
    pub fn apply(&mut self, frame: &Frame<'_>) -> DemoResult<Vec<GameEvent>> {
        let span = self.span.clone();
        let _enter = span.enter();
        trace!(
            kind = ?frame.kind,
            tick = frame.tick,
            offset = frame.offset,
            len = frame.payload.len(),
            "frame"
        );
        let counters = &mut self.state.counters;
        counters.frames += 1;
        *counters.frame_kinds.entry(kind_name(frame.kind)).or_default() += 1;
        let tick = Tick::new(frame.tick);
        if frame.kind != FrameKind::Stop && tick > self.state.tick {
            self.state.tick = tick;
        }

        let mut events = Vec::new();
        match frame.kind {
            FrameKind::Stop | FrameKind::SyncTick => {}
            FrameKind::FileHeader => {
                let header = FileHeader::decode(&frame.payload, &self.options.codec);
                if let Some(header) = self.recover(header, "file header")? {
                    self.state.header = Some(header);
                }
            }
            FrameKind::FileInfo => {
                let info = FileInfo::decode(&frame.payload);
                if let Some(info) = self.recover(info, "file info")? {
                    self.state.file_info = Some(info);
                }
            }
            FrameKind::SendTables => {
                let serializers = decode_send_tables(&frame.payload, &self.options.schema);
                if let Some(serializers) = self.recover(serializers, "send tables")? {
                    let added = self.state.registry.add_serializers(serializers);
                    self.state.baselines.invalidate_decoded();
                    debug!(added, "serializers registered");
                }
            }
            FrameKind::ClassInfo => {
                let classes = decode_class_info(&frame.payload, &self.options.schema);
                if let Some(classes) = self.recover(classes, "class info")? {
                    let added = self.state.registry.add_classes(classes);
                    debug!(added, "classes registered");
                }
            }
            FrameKind::Packet | FrameKind::SignonPacket | FrameKind::FullPacket => {
                self.apply_messages(frame, tick, &mut events)?;
            }
            FrameKind::Unknown(command) => {
                if self.options.strict {
                    return Err(DemoError::UnknownFrameType {
                        command,
                        offset: frame.offset,
                    });
                }
                debug!(command, offset = frame.offset, "skipping unknown frame");
                self.state.counters.skipped_frames += 1;
            }
        }
        Ok(events)
    }

    /// Reads and applies the next frame.
    pub fn step(&mut self) -> DemoResult<Option<(Tick, Vec<GameEvent>)>> {
        let Some(frame) = self.next_frame()? else {
            return Ok(None);
        };
        let events = self.apply(&frame)?;
        Ok(Some((Tick::new(frame.tick), events)))
    }

    /// Applies every remaining frame.
    pub fn run(&mut self) -> DemoResult<()> {
        while self.step()?.is_some() {}
        Ok(())
    }

    fn apply_messages(
        &mut self,
        frame: &Frame<'_>,
        tick: Tick,
        events: &mut Vec<GameEvent>,
    ) -> DemoResult<()> {
        for message in Messages::new(&frame.payload, &self.options.wire) {
            let Some(message) = self.recover(message, "message framing")? else {
                break;
            };
            self.state.counters.messages += 1;
            let result = self.apply_message(message, tick, events);
            self.recover(result, message_name(message.tag))?;
        }
        Ok(())
    }

    fn apply_message(
        &mut self,
        message: Message<'_>,
        tick: Tick,
        events: &mut Vec<GameEvent>,
    ) -> DemoResult<()> {
        let limits = &self.options.codec;
        let body = message.body;
        match message.tag {
            MessageTag::ServerInfo => {
                let info = ServerInfo::decode(body, limits)?;
                self.state.class_bits = class_id_bits(info.max_classes);
                debug!(
                    max_classes = info.max_classes,
                    class_bits = self.state.class_bits,
                    map = %info.map_name,
                    "server info"
                );
                self.state.server_info = Some(info);
            }
            MessageTag::CreateStringTable => {
                let change = self.state.tables.create(body, limits)?;
                self.state.sync_table(&change);
            }
            MessageTag::UpdateStringTable => {
                let change = self.state.tables.update(body, limits)?;
                self.state.sync_table(&change);
            }
            MessageTag::PacketEntities => {
                let state = &mut self.state;
                let mut ctx = ApplyContext {
                    registry: &state.registry,
                    baselines: &mut state.baselines,
                    class_bits: state.class_bits,
                    limits,
                };
                let changes = state.entities.apply_packet_entities(body, &mut ctx)?;
                trace!(
                    created = changes.created.len(),
                    updated = changes.updated.len(),
                    deleted = changes.deleted.len(),
                    "entities"
                );
            }
            MessageTag::GameEventList => {
                let count = self.state.events.load_list(body, limits)?;
                debug!(count, "event descriptors");
            }
            MessageTag::GameEvent => {
                if self.wants_event_body(body)? {
                    let event = self.state.events.decode(body, tick, limits)?;
                    self.state.counters.events += 1;
                    events.push(event);
                }
            }
            MessageTag::ChatMessage => {
                if self.events.contains(CHAT_MESSAGE_EVENT) {
                    let chat = ChatMessage::decode(body, limits)?;
                    self.state.counters.events += 1;
                    events.push(chat.into_event(tick));
                }
            }
            MessageTag::VoiceData => {
                if let Some(voice) = self.voice.as_mut() {
                    let packet = VoicePacket::decode(body)?;
                    voice.push(tick, &packet)?;
                }
            }
            MessageTag::SetConVar => {
                let vars = decode_convars(body, limits)?;
                trace!(count = vars.len(), "convars");
                self.state.convars.extend(vars);
            }
            MessageTag::ItemDrops => {
                let items = decode_item_drops(body, limits)?;
                debug!(count = items.len(), "item drops");
                self.state.item_drops.extend(items);
            }
            MessageTag::EndOfMatch => {
                let players = decode_end_of_match(body, limits)?;
                debug!(players = players.len(), "end of match");
                self.state.skins = players.iter().flat_map(|player| player.skins()).collect();
            }
            MessageTag::Unknown(tag) => {
                debug!(tag, len = body.len(), "skipping unknown message");
                self.state.counters.unknown_messages += 1;
            }
        }
        Ok(())
    }

    /// Peeks at an event id and checks its name against the filter.
    fn wants_event_body(&self, body: &[u8]) -> DemoResult<bool> {
        if self.events.is_all() {
            return Ok(true);
        }
        if self.events.is_empty() {
            return Ok(false);
        }
        let id = ByteReader::new(body).read_varu32()?;
        Ok(match self.state.events.descriptor(id) {
            Some(descriptor) => self.events.contains(descriptor.name.as_str()),
            None => self.events.contains(format!("unknown_event_{id}").as_str()),
        })
    }

    /// Lets a corrupt payload through as `None` in lenient mode.
    fn recover<T, E>(&mut self, result: Result<T, E>, context: &'static str) -> DemoResult<Option<T>>
    where
        E: Into<DemoError>,
    {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let err = err.into();
                if self.options.strict {
                    return Err(err);
                }
                warn!(%err, context, tick = self.state.tick.raw(), "dropping corrupt message");
                self.state.counters.dropped_messages += 1;
                Ok(None)
            }
        }
    }
}

fn kind_name(kind: FrameKind) -> String {
    match kind {
        FrameKind::Stop => "stop".into(),
        FrameKind::FileHeader => "file_header".into(),
        FrameKind::FileInfo => "file_info".into(),
        FrameKind::SyncTick => "sync_tick".into(),
        FrameKind::SendTables => "send_tables".into(),
        FrameKind::ClassInfo => "class_info".into(),
        FrameKind::Packet => "packet".into(),
        FrameKind::SignonPacket => "signon_packet".into(),
        FrameKind::FullPacket => "full_packet".into(),
        FrameKind::Unknown(command) => format!("unknown_{command}"),
    }
}

const fn message_name(tag: MessageTag) -> &'static str {
    match tag {
        MessageTag::ServerInfo => "server info",
        MessageTag::CreateStringTable => "create string table",
        MessageTag::UpdateStringTable => "update string table",
        MessageTag::PacketEntities => "packet entities",
        MessageTag::GameEventList => "game event list",
        MessageTag::GameEvent => "game event",
        MessageTag::VoiceData => "voice data",
        MessageTag::ChatMessage => "chat message",
        MessageTag::SetConVar => "set convar",
        MessageTag::ItemDrops => "item drops",
        MessageTag::EndOfMatch => "end of match",
        MessageTag::Unknown(_) => "unknown message",
    }
}
