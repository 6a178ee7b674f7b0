//! Recording metadata frames and the ServerInfo message.

use bitstream::{put_string, put_varu32, ByteReader};

use crate::error::CodecResult;
use crate::limits::CodecLimits;

/// Contents of the FileHeader frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileHeader {
    pub demo_file_stamp: String,
    pub network_protocol: u32,
    pub server_name: String,
    pub client_name: String,
    pub map_name: String,
    pub game_directory: String,
    pub fullpackets_version: u32,
    pub allow_clientside_entities: bool,
    pub allow_clientside_particles: bool,
    pub addons: String,
    pub demo_version_name: String,
    pub demo_version_guid: String,
    pub build_num: u32,
}

impl FileHeader {
    pub fn decode(payload: &[u8], limits: &CodecLimits) -> CodecResult<Self> {
        let mut reader = ByteReader::new(payload);
        let max = limits.max_string_len;
        Ok(Self {
            demo_file_stamp: reader.read_string(max)?,
            network_protocol: reader.read_varu32()?,
            server_name: reader.read_string(max)?,
            client_name: reader.read_string(max)?,
            map_name: reader.read_string(max)?,
            game_directory: reader.read_string(max)?,
            fullpackets_version: reader.read_varu32()?,
            allow_clientside_entities: reader.read_u8()? != 0,
            allow_clientside_particles: reader.read_u8()? != 0,
            addons: reader.read_string(max)?,
            demo_version_name: reader.read_string(max)?,
            demo_version_guid: reader.read_string(max)?,
            build_num: reader.read_varu32()?,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_string(&mut out, &self.demo_file_stamp);
        put_varu32(&mut out, self.network_protocol);
        put_string(&mut out, &self.server_name);
        put_string(&mut out, &self.client_name);
        put_string(&mut out, &self.map_name);
        put_string(&mut out, &self.game_directory);
        put_varu32(&mut out, self.fullpackets_version);
        out.push(u8::from(self.allow_clientside_entities));
        out.push(u8::from(self.allow_clientside_particles));
        put_string(&mut out, &self.addons);
        put_string(&mut out, &self.demo_version_name);
        put_string(&mut out, &self.demo_version_guid);
        put_varu32(&mut out, self.build_num);
        out
    }
}

/// Contents of the FileInfo frame written at the end of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileInfo {
    /// Seconds.
    pub playback_time: f32,
    pub playback_ticks: u32,
    pub playback_frames: u32,
}

impl FileInfo {
    pub fn decode(payload: &[u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(payload);
        Ok(Self {
            playback_time: reader.read_f32_le()?,
            playback_ticks: reader.read_varu32()?,
            playback_frames: reader.read_varu32()?,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&self.playback_time.to_le_bytes());
        put_varu32(&mut out, self.playback_ticks);
        put_varu32(&mut out, self.playback_frames);
        out
    }
}

/// The ServerInfo message.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ServerInfo {
    pub max_clients: u32,
    /// Sizes the class id field of entity creates.
    pub max_classes: u32,
    /// Seconds per tick.
    pub tick_interval: f32,
    pub map_name: String,
}

impl ServerInfo {
    pub fn decode(body: &[u8], limits: &CodecLimits) -> CodecResult<Self> {
        let mut reader = ByteReader::new(body);
        Ok(Self {
            max_clients: reader.read_varu32()?,
            max_classes: reader.read_varu32()?,
            tick_interval: reader.read_f32_le()?,
            map_name: reader.read_string(limits.max_string_len)?,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_varu32(&mut out, self.max_clients);
        put_varu32(&mut out, self.max_classes);
        out.extend_from_slice(&self.tick_interval.to_le_bytes());
        put_string(&mut out, &self.map_name);
        out
    }

    /// Ticks per second, or `None` when the interval is not positive.
    #[must_use]
    pub fn tick_rate(&self) -> Option<f32> {
        (self.tick_interval > 0.0).then(|| 1.0 / self.tick_interval)
    }
}
