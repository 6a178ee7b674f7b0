//! Voice packets and per-speaker sample assembly.
//!
//! VoiceData body: `xuid:u64 LE format:u8 sequence:varu32 len:varu32
//! payload`.

use std::collections::BTreeMap;

use ahash::AHashMap;
use bitstream::{put_varu32, ByteReader};

use crate::error::{CodecError, CodecResult};
use crate::types::Tick;

/// Payload format of a voice packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VoiceFormat {
    /// Little-endian signed 16-bit samples.
    Pcm16,
    Opus,
    Reserved(u8),
}

impl VoiceFormat {
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::Pcm16,
            1 => Self::Opus,
            other => Self::Reserved(other),
        }
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Pcm16 => 0,
            Self::Opus => 1,
            Self::Reserved(raw) => raw,
        }
    }
}

/// A decoded VoiceData message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePacket<'a> {
    pub xuid: u64,
    pub format: VoiceFormat,
    pub sequence: u32,
    pub payload: &'a [u8],
}

impl<'a> VoicePacket<'a> {
    pub fn decode(body: &'a [u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(body);
        let xuid = reader.read_u64_le()?;
        let format = VoiceFormat::from_raw(reader.read_u8()?);
        let sequence = reader.read_varu32()?;
        let len = reader.read_varu32()? as usize;
        let payload = reader.read_slice(len)?;
        Ok(Self {
            xuid,
            format,
            sequence,
            payload,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 20);
        out.extend_from_slice(&self.xuid.to_le_bytes());
        out.push(self.format.raw());
        put_varu32(&mut out, self.sequence);
        put_varu32(&mut out, self.payload.len() as u32);
        out.extend_from_slice(self.payload);
        out
    }
}

/// Turns a packet payload into linear samples.
///
/// Decoders may carry state between packets, so every speaker gets its own
/// instance.
pub trait VoiceDecoder {
    /// Appends the samples of one payload to `out`.
    fn decode(&mut self, payload: &[u8], out: &mut Vec<i16>) -> CodecResult<()>;
}

/// Builds a fresh decoder for a new speaker.
pub type DecoderFactory =
    Box<dyn Fn() -> CodecResult<Box<dyn VoiceDecoder + Send>> + Send + Sync>;

/// Decoder for uncompressed little-endian 16-bit samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pcm16Decoder;

impl VoiceDecoder for Pcm16Decoder {
    fn decode(&mut self, payload: &[u8], out: &mut Vec<i16>) -> CodecResult<()> {
        if payload.len() % 2 != 0 {
            return Err(CodecError::InvalidVoicePayload { len: payload.len() });
        }
        out.extend(
            payload
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );
        Ok(())
    }
}

/// Opus decoder producing 24 kHz mono samples.
#[cfg(feature = "voice")]
pub struct OpusDecoder {
    inner: opus::Decoder,
}

#[cfg(feature = "voice")]
impl OpusDecoder {
    pub const SAMPLE_RATE: u32 = 24_000;

    /// Samples in the longest Opus packet (120 ms).
    const MAX_PACKET_SAMPLES: usize = 2880;

    pub fn new() -> CodecResult<Self> {
        let inner = opus::Decoder::new(Self::SAMPLE_RATE, opus::Channels::Mono)
            .map_err(|err| opus_error(&err))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "voice")]
impl std::fmt::Debug for OpusDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpusDecoder")
            .field("sample_rate", &Self::SAMPLE_RATE)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "voice")]
impl VoiceDecoder for OpusDecoder {
    fn decode(&mut self, payload: &[u8], out: &mut Vec<i16>) -> CodecResult<()> {
        let start = out.len();
        out.resize(start + Self::MAX_PACKET_SAMPLES, 0);
        match self.inner.decode(payload, &mut out[start..], false) {
            Ok(written) => {
                out.truncate(start + written);
                Ok(())
            }
            Err(err) => {
                out.truncate(start);
                Err(opus_error(&err))
            }
        }
    }
}

#[cfg(feature = "voice")]
fn opus_error(err: &opus::Error) -> CodecError {
    CodecError::VoiceDecode {
        format: VoiceFormat::Opus,
        reason: err.to_string(),
    }
}

/// Everything one speaker said, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VoiceTrack {
    pub format: VoiceFormat,
    /// Decoded samples, when a decoder for the format was available.
    pub samples: Vec<i16>,
    /// Concatenated payloads of packets no decoder handled.
    pub raw: Vec<u8>,
    pub packets: usize,
    pub first_tick: Tick,
    pub last_tick: Tick,
}

/// Collects voice packets into one track per speaker.
pub struct VoiceExtractor {
    factories: Vec<(VoiceFormat, DecoderFactory)>,
    decoders: AHashMap<(u64, VoiceFormat), Box<dyn VoiceDecoder + Send>>,
    tracks: BTreeMap<u64, VoiceTrack>,
}

impl std::fmt::Debug for VoiceExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formats: Vec<VoiceFormat> = self.factories.iter().map(|(format, _)| *format).collect();
        f.debug_struct("VoiceExtractor")
            .field("formats", &formats)
            .field("decoders", &self.decoders.len())
            .field("tracks", &self.tracks)
            .finish()
    }
}

impl Default for VoiceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceExtractor {
    /// Creates an extractor for every format this build can decode. Other
    /// formats are kept raw.
    #[must_use]
    pub fn new() -> Self {
        let extractor = Self::raw_only().with_decoder(VoiceFormat::Pcm16, || {
            Ok(Box::new(Pcm16Decoder) as Box<dyn VoiceDecoder + Send>)
        });
        #[cfg(feature = "voice")]
        let extractor = extractor.with_decoder(VoiceFormat::Opus, || {
            Ok(Box::new(OpusDecoder::new()?) as Box<dyn VoiceDecoder + Send>)
        });
        extractor
    }

    /// Creates an extractor that decodes nothing.
    #[must_use]
    pub fn raw_only() -> Self {
        Self {
            factories: Vec::new(),
            decoders: AHashMap::new(),
            tracks: BTreeMap::new(),
        }
    }

    /// Registers a decoder for `format`, replacing any earlier one.
    #[must_use]
    pub fn with_decoder<F>(mut self, format: VoiceFormat, factory: F) -> Self
    where
        F: Fn() -> CodecResult<Box<dyn VoiceDecoder + Send>> + Send + Sync + 'static,
    {
        self.factories.retain(|(known, _)| *known != format);
        self.factories.push((format, Box::new(factory)));
        self
    }

    /// Appends one packet to its speaker's track.
    pub fn push(&mut self, tick: Tick, packet: &VoicePacket<'_>) -> CodecResult<()> {
        let track = self.tracks.entry(packet.xuid).or_insert_with(|| VoiceTrack {
            format: packet.format,
            samples: Vec::new(),
            raw: Vec::new(),
            packets: 0,
            first_tick: tick,
            last_tick: tick,
        });
        let key = (packet.xuid, packet.format);
        if !self.decoders.contains_key(&key) {
            if let Some((_, factory)) = self
                .factories
                .iter()
                .find(|(format, _)| *format == packet.format)
            {
                self.decoders.insert(key, factory()?);
            }
        }
        match self.decoders.get_mut(&key) {
            Some(decoder) => decoder.decode(packet.payload, &mut track.samples)?,
            None => track.raw.extend_from_slice(packet.payload),
        }
        track.packets += 1;
        track.last_tick = tick;
        Ok(())
    }

    #[must_use]
    pub fn track(&self, xuid: u64) -> Option<&VoiceTrack> {
        self.tracks.get(&xuid)
    }

    /// Tracks ordered by speaker.
    pub fn tracks(&self) -> impl Iterator<Item = (u64, &VoiceTrack)> {
        self.tracks.iter().map(|(xuid, track)| (*xuid, track))
    }

    #[must_use]
    pub fn into_tracks(self) -> BTreeMap<u64, VoiceTrack> {
        self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn packet_roundtrip() {
        let payload = pcm(&[1, -1, 300]);
        let packet = VoicePacket {
            xuid: 76_561_198_000_000_042,
            format: VoiceFormat::Pcm16,
            sequence: 9,
            payload: &payload,
        };
        let body = packet.encode();
        assert_eq!(VoicePacket::decode(&body).unwrap(), packet);
    }

    #[test]
    fn samples_concatenate_per_speaker() {
        let mut extractor = VoiceExtractor::new();
        let a1 = pcm(&[1, 2]);
        let b1 = pcm(&[100]);
        let a2 = pcm(&[3]);
        for (tick, xuid, payload) in [(10, 1u64, &a1), (11, 2, &b1), (12, 1, &a2)] {
            let packet = VoicePacket {
                xuid,
                format: VoiceFormat::Pcm16,
                sequence: 0,
                payload,
            };
            extractor.push(Tick::new(tick), &packet).unwrap();
        }
        let a = extractor.track(1).unwrap();
        assert_eq!(a.samples, vec![1, 2, 3]);
        assert_eq!(a.packets, 2);
        assert_eq!(a.first_tick, Tick::new(10));
        assert_eq!(a.last_tick, Tick::new(12));
        assert_eq!(extractor.track(2).unwrap().samples, vec![100]);
        assert_eq!(extractor.tracks().count(), 2);
    }

    fn opus(xuid: u64, payload: &[u8]) -> VoicePacket<'_> {
        VoicePacket {
            xuid,
            format: VoiceFormat::Opus,
            sequence: 1,
            payload,
        }
    }

    #[test]
    fn undecodable_formats_are_kept_raw() {
        let mut extractor = VoiceExtractor::raw_only();
        let packet = opus(5, &[0xFC, 0xFF, 0xFE]);
        extractor.push(Tick::new(0), &packet).unwrap();
        extractor.push(Tick::new(1), &packet).unwrap();
        let track = extractor.track(5).unwrap();
        assert!(track.samples.is_empty());
        assert_eq!(track.raw.len(), 6);
        assert_eq!(track.packets, 2);
    }

    /// Counts packets, so the instance a speaker got is observable.
    struct Counting(i16);

    impl VoiceDecoder for Counting {
        fn decode(&mut self, _payload: &[u8], out: &mut Vec<i16>) -> CodecResult<()> {
            self.0 += 1;
            out.push(self.0);
            Ok(())
        }
    }

    #[test]
    fn each_speaker_gets_its_own_decoder() {
        let mut extractor = VoiceExtractor::raw_only().with_decoder(VoiceFormat::Opus, || {
            Ok(Box::new(Counting(0)) as Box<dyn VoiceDecoder + Send>)
        });
        for (tick, xuid) in [(0, 1u64), (1, 2), (2, 1), (3, 1), (4, 2)] {
            extractor.push(Tick::new(tick), &opus(xuid, &[0])).unwrap();
        }
        assert_eq!(extractor.track(1).unwrap().samples, vec![1, 2, 3]);
        assert_eq!(extractor.track(2).unwrap().samples, vec![1, 2]);
    }

    #[cfg(feature = "voice")]
    #[test]
    fn opus_packets_decode_to_samples() {
        let mut extractor = VoiceExtractor::new();
        // TOC 0xF8: CELT fullband, 20 ms, mono, one empty frame.
        extractor.push(Tick::new(0), &opus(9, &[0xF8])).unwrap();
        extractor.push(Tick::new(1), &opus(9, &[0xF8])).unwrap();
        let track = extractor.track(9).unwrap();
        assert_eq!(track.samples.len(), 2 * 480);
        assert!(track.raw.is_empty());
    }

    #[cfg(feature = "voice")]
    #[test]
    fn corrupt_opus_is_an_error() {
        let mut extractor = VoiceExtractor::new();
        // Code 3 packet that declares more frames than it carries.
        let err = extractor.push(Tick::new(0), &opus(9, &[0x0B, 0x3F])).unwrap_err();
        assert!(matches!(err, CodecError::VoiceDecode { format: VoiceFormat::Opus, .. }));
    }

    #[test]
    fn odd_pcm_payload_rejected() {
        let mut out = Vec::new();
        let err = Pcm16Decoder.decode(&[1, 2, 3], &mut out).unwrap_err();
        assert_eq!(err, CodecError::InvalidVoicePayload { len: 3 });
    }

    #[test]
    fn format_mapping() {
        assert_eq!(VoiceFormat::from_raw(0), VoiceFormat::Pcm16);
        assert_eq!(VoiceFormat::from_raw(7), VoiceFormat::Reserved(7));
        assert_eq!(VoiceFormat::Reserved(7).raw(), 7);
    }
}
