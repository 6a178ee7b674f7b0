//! Game event descriptors and event bodies.
//!
//! GameEventList body (bytes):
//!
//! ```text
//! count:varu32
//! repeat count:
//!     id:varu32 name:cstring key_count:varu32
//!     repeat key_count: type:u8 name:cstring
//! ```
//!
//! GameEvent body: `id:varu32`, then `type:u8 value` per key until the
//! body ends. Values: string cstring, float f32 LE, long/short/player
//! zigzag varint, byte u8, bool u8, u64 u64 LE.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bitstream::{put_string, put_varu32, put_vars32, ByteReader};

use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::types::Tick;
use crate::value::FieldValue;

/// Name given to chat messages surfaced as events.
pub const CHAT_MESSAGE_EVENT: &str = "chat_message";

/// Wire type of an event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKeyType {
    String,
    Float,
    Long,
    Short,
    Byte,
    Bool,
    U64,
    /// Player slot of a controller.
    PlayerController,
    /// Handle of a player pawn.
    PlayerPawn,
}

impl EventKeyType {
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::String,
            2 => Self::Float,
            3 => Self::Long,
            4 => Self::Short,
            5 => Self::Byte,
            6 => Self::Bool,
            7 => Self::U64,
            8 => Self::PlayerController,
            9 => Self::PlayerPawn,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::String => 1,
            Self::Float => 2,
            Self::Long => 3,
            Self::Short => 4,
            Self::Byte => 5,
            Self::Bool => 6,
            Self::U64 => 7,
            Self::PlayerController => 8,
            Self::PlayerPawn => 9,
        }
    }

    /// Returns `true` for keys that reference a player.
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::PlayerController | Self::PlayerPawn)
    }
}

impl fmt::Display for EventKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Float => "float",
            Self::Long => "long",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::Bool => "bool",
            Self::U64 => "u64",
            Self::PlayerController => "player_controller",
            Self::PlayerPawn => "player_pawn",
        };
        write!(f, "{name}")
    }
}

/// A declared event key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventKey {
    pub name: String,
    pub key_type: EventKeyType,
}

/// Declares the name and keys of one event id.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventDescriptor {
    pub id: u32,
    pub name: String,
    pub keys: Vec<EventKey>,
}

impl EventDescriptor {
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(mut self, name: impl Into<String>, key_type: EventKeyType) -> Self {
        self.keys.push(EventKey {
            name: name.into(),
            key_type,
        });
        self
    }
}

/// One decoded event field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventField {
    pub name: String,
    pub key_type: EventKeyType,
    pub value: FieldValue,
}

/// A decoded game event.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GameEvent {
    pub id: u32,
    pub name: String,
    pub tick: Tick,
    pub fields: Vec<EventField>,
}

impl GameEvent {
    /// Returns the value of a named field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| &field.value)
    }
}

/// Event descriptors seen so far, and the decoder that uses them.
#[derive(Debug, Clone, Default)]
pub struct EventDecoder {
    descriptors: BTreeMap<u32, EventDescriptor>,
    by_name: HashMap<String, u32>,
}

impl EventDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[must_use]
    pub fn descriptor(&self, id: u32) -> Option<&EventDescriptor> {
        self.descriptors.get(&id)
    }

    #[must_use]
    pub fn descriptor_by_name(&self, name: &str) -> Option<&EventDescriptor> {
        self.by_name.get(name).and_then(|id| self.descriptors.get(id))
    }

    /// Descriptors ordered by id.
    pub fn descriptors(&self) -> impl Iterator<Item = &EventDescriptor> {
        self.descriptors.values()
    }

    /// Registers a descriptor, replacing any previous one with the same id.
    pub fn insert(&mut self, descriptor: EventDescriptor) {
        if let Some(old) = self.descriptors.get(&descriptor.id) {
            self.by_name.remove(&old.name);
        }
        self.by_name.insert(descriptor.name.clone(), descriptor.id);
        self.descriptors.insert(descriptor.id, descriptor);
    }

    /// Decodes a GameEventList body, returning how many descriptors it held.
    pub fn load_list(&mut self, body: &[u8], limits: &CodecLimits) -> CodecResult<usize> {
        let mut reader = ByteReader::new(body);
        let count = reader.read_varu32()? as usize;
        for _ in 0..count {
            let id = reader.read_varu32()?;
            let name = reader.read_string(limits.max_string_len)?;
            let key_count = reader.read_varu32()? as usize;
            check_key_count(key_count, limits)?;
            let mut descriptor = EventDescriptor::new(id, name);
            for _ in 0..key_count {
                let tag = reader.read_u8()?;
                let key_type =
                    EventKeyType::from_tag(tag).ok_or(CodecError::UnknownEventKeyType { tag })?;
                let name = reader.read_string(limits.max_string_len)?;
                descriptor.keys.push(EventKey { name, key_type });
            }
            self.insert(descriptor);
        }
        Ok(count)
    }

    /// Decodes a GameEvent body.
    ///
    /// Ids without a descriptor decode as `unknown_event_<id>` with fields
    /// named `key_<n>`.
    pub fn decode(&self, body: &[u8], tick: Tick, limits: &CodecLimits) -> CodecResult<GameEvent> {
        let mut reader = ByteReader::new(body);
        let id = reader.read_varu32()?;
        let descriptor = self.descriptors.get(&id);
        let mut fields = Vec::with_capacity(descriptor.map_or(0, |d| d.keys.len()));
        while !reader.is_empty() {
            check_key_count(fields.len() + 1, limits)?;
            let tag = reader.read_u8()?;
            let key_type =
                EventKeyType::from_tag(tag).ok_or(CodecError::UnknownEventKeyType { tag })?;
            let value = read_event_value(&mut reader, key_type, limits)?;
            let name = descriptor
                .and_then(|d| d.keys.get(fields.len()))
                .map_or_else(|| format!("key_{}", fields.len()), |key| key.name.clone());
            fields.push(EventField {
                name,
                key_type,
                value,
            });
        }
        let name = descriptor.map_or_else(|| format!("unknown_event_{id}"), |d| d.name.clone());
        Ok(GameEvent {
            id,
            name,
            tick,
            fields,
        })
    }
}

fn check_key_count(count: usize, limits: &CodecLimits) -> CodecResult<()> {
    if count > limits.max_event_keys {
        return Err(CodecError::LimitsExceeded {
            kind: LimitKind::EventKeys,
            limit: limits.max_event_keys,
            actual: count,
        });
    }
    Ok(())
}

fn read_event_value(
    reader: &mut ByteReader<'_>,
    key_type: EventKeyType,
    limits: &CodecLimits,
) -> CodecResult<FieldValue> {
    let value = match key_type {
        EventKeyType::String => FieldValue::String(reader.read_string(limits.max_string_len)?),
        EventKeyType::Float => FieldValue::F32(reader.read_f32_le()?),
        EventKeyType::Long
        | EventKeyType::Short
        | EventKeyType::PlayerController
        | EventKeyType::PlayerPawn => FieldValue::I32(reader.read_vars32()?),
        EventKeyType::Byte => FieldValue::U32(u32::from(reader.read_u8()?)),
        EventKeyType::Bool => FieldValue::Bool(reader.read_u8()? != 0),
        EventKeyType::U64 => FieldValue::U64(reader.read_u64_le()?),
    };
    Ok(value)
}

/// Encodes a GameEventList body.
#[must_use]
pub fn encode_event_list(descriptors: &[EventDescriptor]) -> Vec<u8> {
    let mut out = Vec::new();
    put_varu32(&mut out, descriptors.len() as u32);
    for descriptor in descriptors {
        put_varu32(&mut out, descriptor.id);
        put_string(&mut out, &descriptor.name);
        put_varu32(&mut out, descriptor.keys.len() as u32);
        for key in &descriptor.keys {
            out.push(key.key_type.tag());
            put_string(&mut out, &key.name);
        }
    }
    out
}

/// Encodes a GameEvent body from typed values in key order.
pub fn encode_event(id: u32, values: &[(EventKeyType, FieldValue)]) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    put_varu32(&mut out, id);
    for (index, (key_type, value)) in values.iter().enumerate() {
        out.push(key_type.tag());
        match (key_type, value) {
            (EventKeyType::String, FieldValue::String(v)) => put_string(&mut out, v),
            (EventKeyType::Float, FieldValue::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
            (
                EventKeyType::Long
                | EventKeyType::Short
                | EventKeyType::PlayerController
                | EventKeyType::PlayerPawn,
                FieldValue::I32(v),
            ) => put_vars32(&mut out, *v),
            (EventKeyType::Byte, FieldValue::U32(v)) if *v <= u32::from(u8::MAX) => {
                out.push(*v as u8);
            }
            (EventKeyType::Bool, FieldValue::Bool(v)) => out.push(u8::from(*v)),
            (EventKeyType::U64, FieldValue::U64(v)) => out.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(CodecError::EventValueMismatch { index }),
        }
    }
    Ok(out)
}

/// A chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Entity id of the sender's controller.
    pub entity_id: u32,
    pub chat_all: bool,
    pub text: String,
}

impl ChatMessage {
    /// Decodes a ChatMessage body: `entity_id:varu32 chat_all:u8 text:cstring`.
    pub fn decode(body: &[u8], limits: &CodecLimits) -> CodecResult<Self> {
        let mut reader = ByteReader::new(body);
        Ok(Self {
            entity_id: reader.read_varu32()?,
            chat_all: reader.read_u8()? != 0,
            text: reader.read_string(limits.max_string_len)?,
        })
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.text.len() + 8);
        put_varu32(&mut out, self.entity_id);
        out.push(u8::from(self.chat_all));
        put_string(&mut out, &self.text);
        out
    }

    /// Surfaces the message as a `chat_message` event.
    #[must_use]
    pub fn into_event(self, tick: Tick) -> GameEvent {
        GameEvent {
            id: u32::MAX,
            name: CHAT_MESSAGE_EVENT.to_string(),
            tick,
            fields: vec![
                EventField {
                    name: "entity_id".to_string(),
                    key_type: EventKeyType::Long,
                    value: FieldValue::I32(self.entity_id as i32),
                },
                EventField {
                    name: "text".to_string(),
                    key_type: EventKeyType::String,
                    value: FieldValue::String(self.text),
                },
                EventField {
                    name: "chat_all".to_string(),
                    key_type: EventKeyType::Bool,
                    value: FieldValue::Bool(self.chat_all),
                },
            ],
        }
    }
}
