//! Command-line helpers for inspecting replay recordings.
//!
//! The `demodec` binary wraps the library requests. This crate holds the
//! parts worth testing on their own:
//!
//! - Argument parsing for field, tick and event lists
//! - Input discovery with glob filters
//! - Human-readable renderings of headers, summaries, events and players
//! - Writing voice tracks to disk
//!
//! # Design Principles
//!
//! - **First-class tooling** - These tools are part of the product, not afterthoughts.
//! - **Human-readable output** - Make it easy to see what a recording contains.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use demodec::codec::{FieldValue, VoiceFormat, VoiceTrack};
use demodec::{DemoHeader, EventRow, ParseSummary, PlayerRoster, Selection};
use glob::Pattern;
use serde::Serialize;

/// Parses a comma-separated list; `all` or `*` selects everything.
pub fn parse_names(raw: &str) -> Selection<String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") || raw == "*" {
        return Selection::All;
    }
    Selection::only(
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty()),
    )
}

/// Parses ticks such as `100,200,1000..1064` or `all`.
///
/// Ranges are half-open; `a..=b` includes `b`.
pub fn parse_ticks(raw: &str) -> Result<Selection<u32>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") || raw == "*" {
        return Ok(Selection::All);
    }
    let mut ticks = std::collections::BTreeSet::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        if let Some((start, end)) = part.split_once("..=") {
            let (start, end) = (parse_tick(start)?, parse_tick(end)?);
            ticks.extend(start..=end);
        } else if let Some((start, end)) = part.split_once("..") {
            let (start, end) = (parse_tick(start)?, parse_tick(end)?);
            ticks.extend(start..end);
        } else {
            ticks.insert(parse_tick(part)?);
        }
    }
    Ok(Selection::Only(ticks))
}

fn parse_tick(raw: &str) -> Result<u32> {
    raw.trim()
        .parse()
        .with_context(|| format!("invalid tick {raw:?}"))
}

/// Parses comma-separated steam ids; `all` selects every player.
pub fn parse_steamids(raw: &str) -> Result<Selection<u64>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("all") || raw == "*" {
        return Ok(Selection::All);
    }
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse().with_context(|| format!("invalid steam id {id:?}")))
        .collect::<Result<_>>()?;
    Ok(Selection::Only(ids))
}

/// One recording found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Lists the recordings under `path`.
///
/// A file is returned as is. A directory yields its files, filtered by
/// `glob` against either the full path or the file name, sorted by path.
pub fn collect_inputs(path: &Path, glob: Option<&str>) -> Result<Vec<InputEntry>> {
    if path.is_file() {
        let size = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        return Ok(vec![InputEntry {
            path: path.to_path_buf(),
            size,
        }]);
    }
    if !path.is_dir() {
        bail!("{} is neither a file nor a directory", path.display());
    }
    let pattern = glob
        .map(|value| Pattern::new(value).context("invalid glob pattern"))
        .transpose()?;

    let mut entries = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("read dir {}", path.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(InputEntry { path, size });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Outcome of one file in a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ParseSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn value_text(value: Option<&FieldValue>) -> String {
    value.map_or_else(|| "-".to_string(), ToString::to_string)
}

pub fn format_header_pretty(header: &DemoHeader) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "format version: {}", header.version);
    match &header.header {
        Some(file) => {
            let _ = writeln!(out, "map: {}", file.map_name);
            let _ = writeln!(out, "server: {}", file.server_name);
            let _ = writeln!(out, "client: {}", file.client_name);
            let _ = writeln!(out, "game directory: {}", file.game_directory);
            let _ = writeln!(out, "network protocol: {}", file.network_protocol);
            let _ = writeln!(out, "build: {}", file.build_num);
        }
        None => out.push_str("file header: missing\n"),
    }
    if let Some(server) = &header.server_info {
        let rate = server
            .tick_rate()
            .map_or_else(|| "-".to_string(), |rate| format!("{rate:.1}"));
        let _ = writeln!(
            out,
            "server info: {} clients, {} classes, {rate} ticks/s",
            server.max_clients, server.max_classes
        );
    }
    if let Some(info) = &header.file_info {
        let _ = writeln!(
            out,
            "playback: {} ticks, {} frames, {:.1}s",
            info.playback_ticks, info.playback_frames, info.playback_time
        );
    }
    for (name, value) in &header.convars {
        let _ = writeln!(out, "  {name} = {value}");
    }
    out
}

pub fn format_summary_pretty(summary: &ParseSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "frames: {} ({} skipped)",
        summary.frames, summary.skipped_frames
    );
    for (kind, count) in &summary.frame_kinds {
        let _ = writeln!(out, "  {kind}: {count}");
    }
    let _ = writeln!(
        out,
        "messages: {} ({} dropped, {} unknown)",
        summary.messages, summary.dropped_messages, summary.unknown_messages
    );
    let _ = writeln!(out, "events: {}", summary.events);
    let _ = writeln!(out, "last tick: {}", summary.last_tick);
    let _ = writeln!(
        out,
        "schema: {} classes, {} serializers, fingerprint 0x{:016x}",
        summary.classes, summary.serializers, summary.fingerprint
    );
    let _ = writeln!(out, "live entities at end: {}", summary.live_entities);
    let _ = writeln!(
        out,
        "items: {} dropped, {} skins",
        summary.item_drops, summary.skins
    );
    out
}

/// One line per event: tick, name, then `key=value` pairs.
pub fn format_events_pretty(rows: &[EventRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = write!(out, "{:>8} {}", row.tick, row.name);
        for (name, value) in &row.fields {
            let _ = write!(out, " {name}={}", value_text(value.as_ref()));
        }
        out.push('\n');
    }
    out
}

pub fn format_players_pretty(roster: &PlayerRoster) -> String {
    let mut out = String::new();
    for player in roster {
        let _ = writeln!(
            out,
            "slot {:>2}  {:<24} steamid {:<20} team {}{}",
            player.slot,
            player.name.as_deref().unwrap_or("-"),
            player
                .steamid
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            player
                .team
                .map_or_else(|| "-".to_string(), |team| team.to_string()),
            if player.is_hltv { "  (hltv)" } else { "" },
        );
    }
    out
}

/// Writes one file per speaker into `dir` and returns the paths.
///
/// Decoded samples go to `<xuid>.pcm` as little-endian 16-bit mono; payloads
/// without a decoder go to `<xuid>.<format>` unchanged.
pub fn write_voice(dir: &Path, tracks: &BTreeMap<u64, VoiceTrack>) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    let mut written = Vec::new();
    for (xuid, track) in tracks {
        if !track.samples.is_empty() {
            let path = dir.join(format!("{xuid}.pcm"));
            let bytes: Vec<u8> = track
                .samples
                .iter()
                .flat_map(|sample| sample.to_le_bytes())
                .collect();
            fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
            written.push(path);
        }
        if !track.raw.is_empty() {
            let extension = match track.format {
                VoiceFormat::Pcm16 => "pcm".to_string(),
                VoiceFormat::Opus => "opus".to_string(),
                VoiceFormat::Reserved(raw) => format!("fmt{raw}"),
            };
            let path = dir.join(format!("{xuid}.raw.{extension}"));
            fs::write(&path, &track.raw).with_context(|| format!("write {}", path.display()))?;
            written.push(path);
        }
    }
    Ok(written)
}
