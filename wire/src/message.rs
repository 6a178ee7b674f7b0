//! Inner message framing for packet frames.
//!
//! A packet payload is a sequence of `tag:u8 | varint len | body` records.

use bitstream::{put_varu32, ByteReader};

use crate::error::{DecodeError, EncodeError, LimitKind, MessageFramingError, WireResult};
use crate::limits::Limits;

/// Inner message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    ServerInfo,
    CreateStringTable,
    UpdateStringTable,
    PacketEntities,
    GameEventList,
    GameEvent,
    VoiceData,
    ChatMessage,
    SetConVar,
    ItemDrops,
    EndOfMatch,
    Unknown(u8),
}

impl MessageTag {
    /// Parses a message tag from a raw byte.
    #[must_use]
    pub const fn parse(tag: u8) -> Self {
        match tag {
            1 => Self::ServerInfo,
            2 => Self::CreateStringTable,
            3 => Self::UpdateStringTable,
            4 => Self::PacketEntities,
            5 => Self::GameEventList,
            6 => Self::GameEvent,
            7 => Self::VoiceData,
            8 => Self::ChatMessage,
            9 => Self::SetConVar,
            10 => Self::ItemDrops,
            11 => Self::EndOfMatch,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw tag byte.
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::ServerInfo => 1,
            Self::CreateStringTable => 2,
            Self::UpdateStringTable => 3,
            Self::PacketEntities => 4,
            Self::GameEventList => 5,
            Self::GameEvent => 6,
            Self::VoiceData => 7,
            Self::ChatMessage => 8,
            Self::SetConVar => 9,
            Self::ItemDrops => 10,
            Self::EndOfMatch => 11,
            Self::Unknown(other) => other,
        }
    }
}

/// A message within a packet frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub tag: MessageTag,
    pub body: &'a [u8],
}

/// Lazy iterator over the messages of a packet payload.
///
/// Every body is bounded by its length prefix. A framing error ends
/// iteration; messages already yielded stay valid.
#[derive(Debug, Clone)]
pub struct Messages<'a> {
    reader: ByteReader<'a>,
    limits: Limits,
    count: usize,
    done: bool,
}

impl<'a> Messages<'a> {
    #[must_use]
    pub fn new(payload: &'a [u8], limits: &Limits) -> Self {
        Self {
            reader: ByteReader::new(payload),
            limits: limits.clone(),
            count: 0,
            done: false,
        }
    }

    fn read_message(&mut self) -> WireResult<Message<'a>> {
        if self.count >= self.limits.max_messages {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::MessageCount,
                limit: self.limits.max_messages,
                actual: self.count + 1,
            });
        }
        let tag = MessageTag::parse(self.reader.read_u8().map_err(MessageFramingError::from)?);
        let len = self
            .reader
            .read_varu32()
            .map_err(MessageFramingError::from)? as usize;
        if len > self.limits.max_message_len {
            return Err(DecodeError::LimitsExceeded {
                kind: LimitKind::MessageLength,
                limit: self.limits.max_message_len,
                actual: len,
            });
        }
        let body = self.reader.read_slice(len).map_err(MessageFramingError::from)?;
        self.count += 1;
        Ok(Message { tag, body })
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = WireResult<Message<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }
        let result = self.read_message();
        self.done = result.is_err();
        Some(result)
    }
}

/// Decodes all messages from a packet payload.
pub fn decode_messages<'a>(payload: &'a [u8], limits: &Limits) -> WireResult<Vec<Message<'a>>> {
    Messages::new(payload, limits).collect()
}

/// Appends a single message to `out`.
pub fn encode_message(out: &mut Vec<u8>, tag: MessageTag, body: &[u8]) -> Result<(), EncodeError> {
    let len = u32::try_from(body.len())
        .map_err(|_| EncodeError::LengthOverflow { length: body.len() })?;
    out.push(tag.raw());
    put_varu32(out, len);
    out.extend_from_slice(body);
    Ok(())
}
