//! One-call requests over a whole recording.
//!
//! Every request takes the raw bytes and runs at most one forward pass.
//! Nothing is shared between calls.

use std::collections::{BTreeMap, BTreeSet};

use codec::{EconItem, FileHeader, FileInfo, ServerInfo, VoiceExtractor, VoiceTrack};
use serde::Serialize;
use tracing::debug;
use wire::{read_frame_at, FrameKind};

use crate::error::DemoResult;
use crate::options::ParseOptions;
use crate::parser::DemoParser;
use crate::players::PlayerRoster;
use crate::projection::Projection;
use crate::request::{ProjectionRequest, Selection};
use crate::row::{Columns, EventRow, GrenadeRow, Row, SnapshotRow};
use crate::state::ParseSummary;

/// Recording metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoHeader {
    /// Format version from the preamble.
    pub version: u32,
    pub header: Option<FileHeader>,
    pub server_info: Option<ServerInfo>,
    /// Totals written at the end of the recording, when present.
    pub file_info: Option<FileInfo>,
    /// Server variables set during signon.
    pub convars: BTreeMap<String, String>,
}

/// Snapshot rows, either row by row or as columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TickOutput {
    Rows(Vec<SnapshotRow>),
    Columns(Columns),
}

/// A recording and the options every request over it uses.
#[derive(Debug, Clone, Copy)]
pub struct Demo<'a, 'o> {
    bytes: &'a [u8],
    options: &'o ParseOptions,
}

static DEFAULT_OPTIONS: std::sync::OnceLock<ParseOptions> = std::sync::OnceLock::new();

impl<'a> Demo<'a, 'static> {
    /// Wraps a recording with default options.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            options: DEFAULT_OPTIONS.get_or_init(ParseOptions::default),
        }
    }
}

impl<'a, 'o> Demo<'a, 'o> {
    #[must_use]
    pub const fn with_options(bytes: &'a [u8], options: &'o ParseOptions) -> Self {
        Self { bytes, options }
    }

    /// Starts a lazy projection pass.
    pub fn project(&self, request: ProjectionRequest) -> DemoResult<Projection<'a>> {
        Projection::new(self.bytes, request, self.options.clone())
    }

    fn parser(&self) -> DemoResult<DemoParser<'a>> {
        DemoParser::new(self.bytes, self.options.clone())
    }

    /// Reads the preamble, the header frame, the signon frames and the
    /// file-info frame. Stops at the first regular packet.
    pub fn header(&self) -> DemoResult<DemoHeader> {
        let mut parser = self.parser()?.with_events(Selection::none());
        while let Some(frame) = parser.next_frame()? {
            if frame.kind == FrameKind::Packet {
                break;
            }
            parser.apply(&frame)?;
        }
        let version = parser.preamble().version;
        let file_info_offset = parser.preamble().file_info_offset();
        let state = parser.into_state();
        let file_info = match (state.file_info, file_info_offset) {
            (Some(info), _) => Some(info),
            (None, Some(offset)) => self.file_info_at(offset)?,
            (None, None) => None,
        };
        Ok(DemoHeader {
            version,
            header: state.header,
            server_info: state.server_info,
            file_info,
            convars: state.convars,
        })
    }

    fn file_info_at(&self, offset: usize) -> DemoResult<Option<FileInfo>> {
        let read: DemoResult<Option<FileInfo>> =
            read_frame_at(self.bytes, offset, &self.options.wire)
                .map_err(Into::into)
                .and_then(|frame| {
                    if frame.kind == FrameKind::FileInfo {
                        FileInfo::decode(&frame.payload).map(Some).map_err(Into::into)
                    } else {
                        Ok(None)
                    }
                });
        match read {
            Ok(info) => Ok(info),
            Err(err) if !self.options.strict => {
                debug!(%err, offset, "file info frame unreadable");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Rows of the named events.
    pub fn events(
        &self,
        events: Selection<String>,
        player_fields: Selection<String>,
        other_fields: Selection<String>,
    ) -> DemoResult<Vec<EventRow>> {
        let request = ProjectionRequest::new()
            .events(events)
            .player_fields(player_fields)
            .other_fields(other_fields);
        self.project(request)?
            .filter_map(|row| row.map(Row::into_event).transpose())
            .collect()
    }

    /// Rows of one event.
    pub fn event(
        &self,
        event: &str,
        player_fields: Selection<String>,
        other_fields: Selection<String>,
    ) -> DemoResult<Vec<EventRow>> {
        self.events(Selection::only([event]), player_fields, other_fields)
    }

    /// Player snapshots at the wanted ticks.
    pub fn ticks(
        &self,
        fields: Selection<String>,
        ticks: Selection<u32>,
        players: Selection<u64>,
    ) -> DemoResult<Vec<SnapshotRow>> {
        let request = ProjectionRequest::new()
            .ticks(ticks)
            .tick_fields(fields)
            .players(players);
        self.project(request)?
            .filter_map(|row| row.map(Row::into_snapshot).transpose())
            .collect()
    }

    /// Player snapshots as columns.
    pub fn tick_columns(
        &self,
        fields: Selection<String>,
        ticks: Selection<u32>,
        players: Selection<u64>,
    ) -> DemoResult<Columns> {
        let request = ProjectionRequest::new()
            .ticks(ticks)
            .tick_fields(fields)
            .players(players);
        self.project(request)?
            .filter_map(|row| row.map(Row::into_snapshot).transpose())
            .collect()
    }

    /// Every player, as of the end of the recording.
    pub fn player_info(&self) -> DemoResult<PlayerRoster> {
        let mut parser = self.parser()?.with_events(Selection::none());
        parser.run()?;
        Ok(PlayerRoster::collect(parser.state()))
    }

    /// One row per live projectile per tick.
    pub fn grenades(&self) -> DemoResult<Vec<GrenadeRow>> {
        self.project(ProjectionRequest::new().grenades(true))?
            .filter_map(|row| row.map(Row::into_grenade).transpose())
            .collect()
    }

    /// Names of the events that occur, sorted.
    pub fn game_event_names(&self) -> DemoResult<Vec<String>> {
        let mut parser = self.parser()?;
        let mut names = BTreeSet::new();
        while let Some((_, events)) = parser.step()? {
            names.extend(events.into_iter().map(|event| event.name));
        }
        Ok(names.into_iter().collect())
    }

    /// Items dropped to players during the match.
    pub fn item_drops(&self) -> DemoResult<Vec<EconItem>> {
        let mut parser = self.parser()?.with_events(Selection::none());
        parser.run()?;
        Ok(parser.into_state().item_drops)
    }

    /// Weapon skins from the end-of-match summary, one row per owned item.
    pub fn skins(&self) -> DemoResult<Vec<EconItem>> {
        let mut parser = self.parser()?.with_events(Selection::none());
        parser.run()?;
        Ok(parser.into_state().skins)
    }

    /// Voice samples per speaker.
    pub fn voice(&self) -> DemoResult<BTreeMap<u64, VoiceTrack>> {
        let mut parser = self
            .parser()?
            .with_events(Selection::none())
            .with_voice(VoiceExtractor::new());
        parser.run()?;
        let (_, voice) = parser.into_parts();
        Ok(voice.map(VoiceExtractor::into_tracks).unwrap_or_default())
    }

    /// Decodes everything and reports counters.
    pub fn inspect(&self) -> DemoResult<ParseSummary> {
        let mut parser = self.parser()?;
        parser.run()?;
        Ok(parser.state().summary())
    }
}

/// Reads the recording metadata.
pub fn parse_header(bytes: &[u8]) -> DemoResult<DemoHeader> {
    Demo::new(bytes).header()
}

/// Rows of one event, with player and game rules properties attached.
pub fn parse_event(
    bytes: &[u8],
    event: &str,
    player_fields: Selection<String>,
    other_fields: Selection<String>,
) -> DemoResult<Vec<EventRow>> {
    Demo::new(bytes).event(event, player_fields, other_fields)
}

/// Rows of several events in stream order.
pub fn parse_events(
    bytes: &[u8],
    events: Selection<String>,
    player_fields: Selection<String>,
    other_fields: Selection<String>,
) -> DemoResult<Vec<EventRow>> {
    Demo::new(bytes).events(events, player_fields, other_fields)
}

/// Player snapshots at the wanted ticks.
pub fn parse_ticks(
    bytes: &[u8],
    fields: Selection<String>,
    ticks: Selection<u32>,
    players: Selection<u64>,
    struct_of_arrays: bool,
) -> DemoResult<TickOutput> {
    let demo = Demo::new(bytes);
    if struct_of_arrays {
        demo.tick_columns(fields, ticks, players).map(TickOutput::Columns)
    } else {
        demo.ticks(fields, ticks, players).map(TickOutput::Rows)
    }
}

pub fn parse_player_info(bytes: &[u8]) -> DemoResult<PlayerRoster> {
    Demo::new(bytes).player_info()
}

pub fn parse_grenades(bytes: &[u8]) -> DemoResult<Vec<GrenadeRow>> {
    Demo::new(bytes).grenades()
}

/// Distinct names of the events in a recording.
pub fn list_game_events(bytes: &[u8]) -> DemoResult<Vec<String>> {
    Demo::new(bytes).game_event_names()
}

pub fn parse_item_drops(bytes: &[u8]) -> DemoResult<Vec<EconItem>> {
    Demo::new(bytes).item_drops()
}

pub fn parse_skins(bytes: &[u8]) -> DemoResult<Vec<EconItem>> {
    Demo::new(bytes).skins()
}

pub fn parse_voice(bytes: &[u8]) -> DemoResult<BTreeMap<u64, VoiceTrack>> {
    Demo::new(bytes).voice()
}
