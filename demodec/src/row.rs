//! Output rows and their column-oriented view.

use std::collections::BTreeMap;

use codec::FieldValue;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Field values by name. `None` marks a field that could not be resolved.
///
/// Fields sit beside the fixed columns of their row when serialized. A
/// field whose name matches a fixed column (or `row`) is left out there;
/// the fixed column wins. It is still reachable through `get`.
pub type Fields = BTreeMap<String, Option<FieldValue>>;

const EVENT_KEYS: [&str; 3] = ["row", "tick", "event_name"];
const SNAPSHOT_KEYS: [&str; 5] = ["row", "tick", "entity_id", "steamid", "name"];

fn serialize_fields<M, V>(
    map: &mut M,
    fixed: &[&str],
    fields: &BTreeMap<String, V>,
) -> Result<(), M::Error>
where
    M: SerializeMap,
    V: Serialize,
{
    for (name, value) in fields {
        if !fixed.contains(&name.as_str()) {
            map.serialize_entry(name, value)?;
        }
    }
    Ok(())
}

/// One output of a projection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum Row {
    Event(EventRow),
    Snapshot(SnapshotRow),
    Grenade(GrenadeRow),
}

impl Row {
    #[must_use]
    pub const fn tick(&self) -> u32 {
        match self {
            Self::Event(row) => row.tick,
            Self::Snapshot(row) => row.tick,
            Self::Grenade(row) => row.tick,
        }
    }

    #[must_use]
    pub fn into_event(self) -> Option<EventRow> {
        match self {
            Self::Event(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_snapshot(self) -> Option<SnapshotRow> {
        match self {
            Self::Snapshot(row) => Some(row),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_grenade(self) -> Option<GrenadeRow> {
        match self {
            Self::Grenade(row) => Some(row),
            _ => None,
        }
    }
}

/// A game event with its requested fields.
///
/// Serializes as `tick`, `event_name`, then the fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub tick: u32,
    pub name: String,
    pub fields: Fields,
}

impl Serialize for EventRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("tick", &self.tick)?;
        map.serialize_entry("event_name", &self.name)?;
        serialize_fields(&mut map, &EVENT_KEYS, &self.fields)?;
        map.end()
    }
}

impl EventRow {
    /// Returns a resolved field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(Option::as_ref)
    }
}

/// One player's requested properties at one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub tick: u32,
    /// Entity id of the player's controller.
    pub entity_id: u32,
    pub steamid: Option<u64>,
    pub name: Option<String>,
    pub fields: Fields,
}

impl Serialize for SnapshotRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("tick", &self.tick)?;
        map.serialize_entry("entity_id", &self.entity_id)?;
        map.serialize_entry("steamid", &self.steamid)?;
        map.serialize_entry("name", &self.name)?;
        serialize_fields(&mut map, &SNAPSHOT_KEYS, &self.fields)?;
        map.end()
    }
}

impl SnapshotRow {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).and_then(Option::as_ref)
    }
}

/// One live projectile at one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrenadeRow {
    pub tick: u32,
    pub entity_id: u32,
    /// Class name of the projectile.
    pub grenade_type: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
    pub thrower_name: Option<String>,
    pub thrower_steamid: Option<u64>,
}

/// Snapshot rows as parallel columns.
///
/// Every column has one entry per row. A field missing from a row is
/// `None` in that row's position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    pub tick: Vec<u32>,
    pub entity_id: Vec<u32>,
    pub steamid: Vec<Option<u64>>,
    pub name: Vec<Option<String>>,
    pub fields: BTreeMap<String, Vec<Option<FieldValue>>>,
}

impl Serialize for Columns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("tick", &self.tick)?;
        map.serialize_entry("entity_id", &self.entity_id)?;
        map.serialize_entry("steamid", &self.steamid)?;
        map.serialize_entry("name", &self.name)?;
        serialize_fields(&mut map, &SNAPSHOT_KEYS, &self.fields)?;
        map.end()
    }
}

impl Columns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tick.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tick.is_empty()
    }

    /// Appends a row, backfilling columns it introduces.
    pub fn push(&mut self, row: SnapshotRow) {
        let len = self.len();
        let mut values = row.fields;
        for name in values.keys() {
            if !self.fields.contains_key(name) {
                self.fields.insert(name.clone(), vec![None; len]);
            }
        }
        for (name, column) in &mut self.fields {
            column.push(values.remove(name).flatten());
        }
        self.tick.push(row.tick);
        self.entity_id.push(row.entity_id);
        self.steamid.push(row.steamid);
        self.name.push(row.name);
    }

    /// Returns one field column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Option<FieldValue>]> {
        self.fields.get(name).map(Vec::as_slice)
    }
}

impl FromIterator<SnapshotRow> for Columns {
    fn from_iter<I: IntoIterator<Item = SnapshotRow>>(iter: I) -> Self {
        let mut columns = Self::new();
        for row in iter {
            columns.push(row);
        }
        columns
    }
}
