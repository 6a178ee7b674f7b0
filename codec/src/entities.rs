//! Live entity table and the PacketEntities body.
//!
//! A PacketEntities body is an MSB-first bitstream:
//!
//! ```text
//! count:varu32
//! repeat count:
//!     index_delta:ubitvar        id = previous + 1 + index_delta
//!     command:2 bits             0b00 update, 0b10 create, x1 delete
//!     create only:
//!         class_id:class_bits
//!         serial:17 bits
//!     create or update:
//!         field delta            field paths, then one value per path
//! ```

use std::collections::BTreeMap;

use ahash::AHashMap;
use bitstream::{BitReader, BitWriter};
use schema::{FieldPath, SchemaRegistry};
use tracing::trace;

use crate::baseline::BaselineStore;
use crate::error::{CodecError, CodecResult, LimitKind};
use crate::limits::CodecLimits;
use crate::path::{read_field_paths, write_field_paths};
use crate::types::EntityId;
use crate::value::{read_value, write_value, FieldValue};

/// Width of the serial number sent with every create.
pub const ENTITY_SERIAL_BITS: u8 = 17;

const CMD_DELETE: u32 = 0b01;
const CMD_CREATE: u32 = 0b10;

/// Bits used for class ids given the `max_classes` announced by ServerInfo.
#[must_use]
pub fn class_id_bits(max_classes: u32) -> u8 {
    (u32::BITS - max_classes.leading_zeros()).max(1) as u8
}

/// A live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    class_id: u32,
    serial: u32,
    fields: AHashMap<FieldPath, FieldValue>,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, class_id: u32, serial: u32) -> Self {
        Self {
            id,
            class_id,
            serial,
            fields: AHashMap::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub const fn class_id(&self) -> u32 {
        self.class_id
    }

    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    /// Returns the current value at `path`.
    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.fields.get(path)
    }

    /// Returns the current value of a flattened property name.
    #[must_use]
    pub fn property(&self, registry: &SchemaRegistry, name: &str) -> Option<&FieldValue> {
        let descriptor = registry.resolve(self.class_id, name).found()?;
        self.fields.get(&descriptor.path)
    }

    /// Iterates over every decoded value, in no particular order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldPath, &FieldValue)> {
        self.fields.iter()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Sets a single value.
    pub fn set(&mut self, path: FieldPath, value: FieldValue) {
        self.fields.insert(path, value);
    }
}

/// What a PacketEntities body changed, in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityChanges {
    pub created: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub deleted: Vec<EntityId>,
}

impl EntityChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Everything needed to apply a PacketEntities body.
#[derive(Debug)]
pub struct ApplyContext<'a> {
    pub registry: &'a SchemaRegistry,
    pub baselines: &'a mut BaselineStore,
    pub class_bits: u8,
    pub limits: &'a CodecLimits,
}

/// Arena of entity slots indexed by entity id.
///
/// A slot is either empty (absent) or holds one live entity. Deleting an
/// entity clears its slot; a later create on the same id starts from
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    slots: Vec<Option<Entity>>,
    live: usize,
    paths: Vec<FieldPath>,
}

impl EntityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with `capacity` preallocated slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            live: 0,
            paths: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.raw() as usize)?.as_ref()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }

    /// Places an entity into its slot, replacing any previous occupant.
    pub fn insert(&mut self, entity: Entity) {
        let idx = entity.id.raw() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].replace(entity).is_none() {
            self.live += 1;
        }
    }

    /// Empties the slot of `id`, returning the entity that lived there.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.slots.get_mut(id.raw() as usize)?.take();
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    /// Applies one PacketEntities body.
    ///
    /// Entries are applied in order. On error, entries before the failing
    /// one stay applied.
    pub fn apply_packet_entities(
        &mut self,
        body: &[u8],
        ctx: &mut ApplyContext<'_>,
    ) -> CodecResult<EntityChanges> {
        let mut reader = BitReader::new(body);
        let count = reader.read_varu32()? as usize;
        if count > ctx.limits.max_updates_per_packet {
            return Err(CodecError::LimitsExceeded {
                kind: LimitKind::UpdatesPerPacket,
                limit: ctx.limits.max_updates_per_packet,
                actual: count,
            });
        }

        let mut changes = EntityChanges::default();
        let mut next_id = 0u64;
        for _ in 0..count {
            let raw = next_id + u64::from(reader.read_ubitvar()?);
            let id = u32::try_from(raw)
                .ok()
                .filter(|&id| (id as usize) < ctx.limits.max_entities)
                .ok_or(CodecError::LimitsExceeded {
                    kind: LimitKind::EntityId,
                    limit: ctx.limits.max_entities,
                    actual: usize::try_from(raw).unwrap_or(usize::MAX),
                })?;
            next_id = raw + 1;
            let id = EntityId::new(id);

            let cmd = reader.read_u32_bits(2)?;
            if cmd & CMD_DELETE != 0 {
                if self.remove(id).is_some() {
                    trace!(entity = id.raw(), "entity deleted");
                    changes.deleted.push(id);
                }
            } else if cmd & CMD_CREATE != 0 {
                let entity = self.read_create(&mut reader, id, ctx)?;
                trace!(entity = id.raw(), class = entity.class_id, "entity created");
                self.insert(entity);
                changes.created.push(id);
            } else {
                let Self { slots, paths, .. } = self;
                let entity = slots
                    .get_mut(id.raw() as usize)
                    .and_then(Option::as_mut)
                    .ok_or(CodecError::EntityNotFound {
                        entity_id: id.raw(),
                    })?;
                let class_id = entity.class_id;
                read_field_delta(
                    &mut reader,
                    ctx.registry,
                    class_id,
                    ctx.limits,
                    paths,
                    |path, value| entity.set(path, value),
                )?;
                changes.updated.push(id);
            }
        }
        Ok(changes)
    }

    fn read_create(
        &mut self,
        reader: &mut BitReader<'_>,
        id: EntityId,
        ctx: &mut ApplyContext<'_>,
    ) -> CodecResult<Entity> {
        let class_id = reader.read_u32_bits(ctx.class_bits)?;
        if ctx.registry.class(class_id).is_none() {
            return Err(CodecError::ClassNotFound { class_id });
        }
        let serial = reader.read_u32_bits(ENTITY_SERIAL_BITS)?;
        let mut entity = Entity::new(id, class_id, serial);
        if let Some(baseline) = ctx.baselines.decoded(class_id, ctx.registry, ctx.limits)? {
            for (path, value) in baseline {
                entity.set(*path, value.clone());
            }
        }
        read_field_delta(
            reader,
            ctx.registry,
            class_id,
            ctx.limits,
            &mut self.paths,
            |path, value| entity.set(path, value),
        )?;
        Ok(entity)
    }
}

/// Reads a field delta: a path list followed by one value per path.
///
/// `paths` is scratch space; `sink` receives every decoded value in path
/// order.
pub fn read_field_delta(
    reader: &mut BitReader<'_>,
    registry: &SchemaRegistry,
    class_id: u32,
    limits: &CodecLimits,
    paths: &mut Vec<FieldPath>,
    mut sink: impl FnMut(FieldPath, FieldValue),
) -> CodecResult<()> {
    paths.clear();
    read_field_paths(reader, limits, paths)?;
    for path in paths.iter() {
        let encoding = registry
            .encoding(class_id, path)
            .ok_or(CodecError::UnknownFieldPath {
                class_id,
                path: *path,
            })?;
        sink(*path, read_value(reader, &encoding, limits.max_string_len)?);
    }
    Ok(())
}

/// Writes a field delta for `class_id`.
///
/// Fields are written in path order; when a path repeats, the last value
/// wins.
pub fn write_field_delta(
    writer: &mut BitWriter,
    registry: &SchemaRegistry,
    class_id: u32,
    fields: &[(FieldPath, FieldValue)],
) -> CodecResult<()> {
    let sorted: BTreeMap<FieldPath, &FieldValue> =
        fields.iter().map(|(path, value)| (*path, value)).collect();
    let mut encodings = Vec::with_capacity(sorted.len());
    for path in sorted.keys() {
        let encoding = registry
            .encoding(class_id, path)
            .ok_or(CodecError::UnknownFieldPath {
                class_id,
                path: *path,
            })?;
        encodings.push(encoding);
    }
    let paths: Vec<FieldPath> = sorted.keys().copied().collect();
    write_field_paths(writer, &paths)?;
    for ((path, value), encoding) in sorted.into_iter().zip(&encodings) {
        write_value(writer, path, encoding, value)?;
    }
    Ok(())
}

/// One entry of a PacketEntities body to encode.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityOp {
    Create {
        id: EntityId,
        class_id: u32,
        serial: u32,
        fields: Vec<(FieldPath, FieldValue)>,
    },
    Update {
        id: EntityId,
        class_id: u32,
        fields: Vec<(FieldPath, FieldValue)>,
    },
    Delete {
        id: EntityId,
    },
}

impl EntityOp {
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Create { id, .. } | Self::Update { id, .. } | Self::Delete { id } => *id,
        }
    }
}

/// Encodes a PacketEntities body. Ops must have strictly ascending ids.
pub fn encode_packet_entities(
    ops: &[EntityOp],
    registry: &SchemaRegistry,
    class_bits: u8,
) -> CodecResult<Vec<u8>> {
    let mut writer = BitWriter::new();
    let count = u32::try_from(ops.len()).map_err(|_| CodecError::LimitsExceeded {
        kind: LimitKind::UpdatesPerPacket,
        limit: u32::MAX as usize,
        actual: ops.len(),
    })?;
    writer.write_varu32(count);

    let mut previous: Option<u32> = None;
    for op in ops {
        let id = op.id().raw();
        let next = match previous {
            Some(prev) if id <= prev => {
                return Err(CodecError::InvalidEntityOrder {
                    previous: prev,
                    current: id,
                });
            }
            Some(prev) => prev + 1,
            None => 0,
        };
        writer.write_ubitvar(id - next)?;
        previous = Some(id);

        match op {
            EntityOp::Delete { .. } => writer.write_bits(u64::from(CMD_DELETE), 2)?,
            EntityOp::Create {
                class_id,
                serial,
                fields,
                ..
            } => {
                writer.write_bits(u64::from(CMD_CREATE), 2)?;
                writer.write_bits(u64::from(*class_id), class_bits)?;
                writer.write_bits(u64::from(*serial), ENTITY_SERIAL_BITS)?;
                write_field_delta(&mut writer, registry, *class_id, fields)?;
            }
            EntityOp::Update {
                class_id, fields, ..
            } => {
                writer.write_bits(0, 2)?;
                write_field_delta(&mut writer, registry, *class_id, fields)?;
            }
        }
    }
    Ok(writer.finish())
}
