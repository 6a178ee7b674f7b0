//! Everything a pass has learned so far, and player lookups over it.

use std::collections::BTreeMap;

use codec::{
    BaselineStore, CodecLimits, EconItem, Entity, EntityId, EntityTable, EventDecoder,
    FieldValue, FileHeader, FileInfo, ServerInfo, StringTables, TableChange, Tick, UserInfo,
    INSTANCE_BASELINE_TABLE, USER_INFO_TABLE,
};
use schema::SchemaRegistry;
use serde::Serialize;

/// Class name suffix of player controller entities.
pub const CONTROLLER_SUFFIX: &str = "PlayerController";
/// Class name fragment of thrown projectiles.
pub const PROJECTILE_MARKER: &str = "Projectile";
/// Class name fragment of the game rules proxy.
pub const GAME_RULES_MARKER: &str = "GameRules";

pub const PAWN_HANDLE_PROPERTY: &str = "m_hPlayerPawn";
pub const PLAYER_NAME_PROPERTY: &str = "m_iszPlayerName";
pub const STEAM_ID_PROPERTY: &str = "m_steamID";
pub const TEAM_PROPERTY: &str = "m_iTeamNum";
pub const ORIGIN_PROPERTY: &str = "m_vecOrigin";
pub const THROWER_PROPERTY: &str = "m_hThrower";

/// Counters collected over a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub frames: u64,
    /// Frames per kind, keyed by kind name.
    pub frame_kinds: BTreeMap<String, u64>,
    /// Undecodable or unknown frames that were skipped.
    pub skipped_frames: u64,
    pub messages: u64,
    /// Corrupt messages that were logged and skipped.
    pub dropped_messages: u64,
    pub unknown_messages: u64,
    pub events: u64,
    /// Requested fields that resolved to null.
    pub unresolved_fields: u64,
    pub last_tick: u32,
    pub classes: usize,
    pub serializers: usize,
    pub live_entities: usize,
    /// Schema fingerprint; recordings of one game build share it.
    pub fingerprint: u64,
    pub item_drops: usize,
    pub skins: usize,
    /// Server variables, last value wins.
    pub convars: BTreeMap<String, String>,
}

/// Decoder state built up frame by frame.
#[derive(Debug, Clone, Default)]
pub struct DemoState {
    pub(crate) header: Option<FileHeader>,
    pub(crate) file_info: Option<FileInfo>,
    pub(crate) server_info: Option<ServerInfo>,
    pub(crate) registry: SchemaRegistry,
    pub(crate) entities: EntityTable,
    pub(crate) baselines: BaselineStore,
    pub(crate) tables: StringTables,
    pub(crate) events: EventDecoder,
    pub(crate) class_bits: u8,
    pub(crate) tick: Tick,
    pub(crate) limits: CodecLimits,
    pub(crate) convars: BTreeMap<String, String>,
    pub(crate) item_drops: Vec<EconItem>,
    pub(crate) skins: Vec<EconItem>,
    pub(crate) counters: ParseSummary,
}

impl DemoState {
    pub(crate) fn new(limits: CodecLimits) -> Self {
        Self {
            class_bits: 1,
            limits,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn header(&self) -> Option<&FileHeader> {
        self.header.as_ref()
    }

    #[must_use]
    pub const fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    #[must_use]
    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn entities(&self) -> &EntityTable {
        &self.entities
    }

    #[must_use]
    pub const fn string_tables(&self) -> &StringTables {
        &self.tables
    }

    #[must_use]
    pub const fn event_decoder(&self) -> &EventDecoder {
        &self.events
    }

    /// Server variables seen so far; a later value replaces an earlier one.
    #[must_use]
    pub const fn convars(&self) -> &BTreeMap<String, String> {
        &self.convars
    }

    /// Items dropped to players, in stream order.
    #[must_use]
    pub fn item_drops(&self) -> &[EconItem] {
        &self.item_drops
    }

    /// Non-default items from the end-of-match summary, owner attached.
    #[must_use]
    pub fn skins(&self) -> &[EconItem] {
        &self.skins
    }

    /// The highest tick applied so far.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Counters so far, with the current schema fingerprint.
    #[must_use]
    pub fn summary(&self) -> ParseSummary {
        let mut summary = self.counters.clone();
        summary.last_tick = self.tick.raw();
        summary.classes = self.registry.class_count();
        summary.serializers = self.registry.serializer_count();
        summary.live_entities = self.entities.len();
        summary.fingerprint = schema::fingerprint(&self.registry);
        summary.item_drops = self.item_drops.len();
        summary.skins = self.skins.len();
        summary.convars = self.convars.clone();
        summary
    }

    /// Mirrors string table entries that feed other state.
    pub(crate) fn sync_table(&mut self, change: &TableChange) {
        let Some(table) = self.tables.by_id(change.table_id) else {
            return;
        };
        if table.name() != INSTANCE_BASELINE_TABLE {
            return;
        }
        for index in &change.changed {
            if let Some(entry) = table.get(*index) {
                if !self.baselines.set_from_entry(&entry.key, &entry.value) {
                    tracing::debug!(key = %entry.key, "ignoring baseline entry with a non-numeric key");
                }
            }
        }
    }

    /// Returns the class name of an entity.
    #[must_use]
    pub fn class_name(&self, entity: &Entity) -> Option<&str> {
        self.registry
            .class(entity.class_id())
            .map(|class| class.name.as_str())
    }

    #[must_use]
    pub fn is_controller(&self, entity: &Entity) -> bool {
        self.class_name(entity)
            .is_some_and(|name| name.ends_with(CONTROLLER_SUFFIX))
    }

    /// Live player controllers in id order.
    pub fn controllers(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .iter()
            .filter(move |entity| self.is_controller(entity))
    }

    /// The controller entity of a player slot, if it is live.
    #[must_use]
    pub fn controller_for_slot(&self, slot: u32) -> Option<&Entity> {
        self.entities
            .get(EntityId::from_player_slot(slot))
            .filter(|entity| self.is_controller(entity))
    }

    /// The pawn a controller currently drives.
    #[must_use]
    pub fn pawn_of(&self, controller: &Entity) -> Option<&Entity> {
        let id = self.handle_property(controller, PAWN_HANDLE_PROPERTY)?;
        self.entities.get(id)
    }

    /// The controller that drives a pawn.
    #[must_use]
    pub fn controller_of_pawn(&self, pawn: EntityId) -> Option<&Entity> {
        self.controllers()
            .find(|controller| self.handle_property(controller, PAWN_HANDLE_PROPERTY) == Some(pawn))
    }

    /// Resolves the entity a handle-valued property points at.
    fn handle_property(&self, entity: &Entity, name: &str) -> Option<EntityId> {
        let handle = entity.property(&self.registry, name)?.as_u64()?;
        EntityId::from_handle(u32::try_from(handle).ok()?)
    }

    /// Looks up a property on one entity.
    #[must_use]
    pub fn entity_property(&self, entity: &Entity, name: &str) -> Option<FieldValue> {
        entity.property(&self.registry, name).cloned()
    }

    /// World position of an entity.
    #[must_use]
    pub fn origin(&self, entity: &Entity) -> Option<[f32; 3]> {
        entity
            .property(&self.registry, ORIGIN_PROPERTY)?
            .as_vector3()
    }

    /// Looks up a player property on the controller, then on its pawn.
    ///
    /// `X`, `Y` and `Z` are the components of the pawn's origin.
    #[must_use]
    pub fn player_property(&self, controller: &Entity, name: &str) -> Option<FieldValue> {
        let pawn = self.pawn_of(controller);
        if let Some(axis) = axis_index(name) {
            return pawn
                .and_then(|pawn| self.origin(pawn))
                .or_else(|| self.origin(controller))
                .map(|origin| FieldValue::F32(origin[axis]));
        }
        controller
            .property(&self.registry, name)
            .or_else(|| pawn.and_then(|pawn| pawn.property(&self.registry, name)))
            .cloned()
    }

    /// The `userinfo` entry of a player slot.
    #[must_use]
    pub fn user_info(&self, slot: u32) -> Option<UserInfo> {
        let entry = self.tables.get(USER_INFO_TABLE)?.get(slot)?;
        UserInfo::decode(&entry.value, &self.limits).ok()
    }

    /// Player slot of a controller.
    #[must_use]
    pub const fn slot_of(controller: &Entity) -> u32 {
        controller.id().raw().saturating_sub(1)
    }

    #[must_use]
    pub fn player_name(&self, controller: &Entity) -> Option<String> {
        match controller.property(&self.registry, PLAYER_NAME_PROPERTY) {
            Some(FieldValue::String(name)) => Some(name.clone()),
            _ => self.user_info(Self::slot_of(controller)).map(|info| info.name),
        }
    }

    #[must_use]
    pub fn steamid(&self, controller: &Entity) -> Option<u64> {
        controller
            .property(&self.registry, STEAM_ID_PROPERTY)
            .and_then(FieldValue::as_u64)
            .filter(|id| *id != 0)
            .or_else(|| {
                self.user_info(Self::slot_of(controller))
                    .map(|info| info.steamid)
            })
    }

    /// The game rules proxy entity, when one is live.
    #[must_use]
    pub fn game_rules(&self) -> Option<&Entity> {
        self.entities.iter().find(|entity| {
            self.class_name(entity)
                .is_some_and(|name| name.contains(GAME_RULES_MARKER))
        })
    }

    /// Every property name of an entity's class.
    #[must_use]
    pub fn property_names(&self, entity: &Entity) -> Vec<String> {
        self.registry
            .class_schema(entity.class_id())
            .map(|schema| schema.properties.into_iter().map(|p| p.name).collect())
            .unwrap_or_default()
    }

    /// Every property name of a controller and of its pawn, controller first.
    #[must_use]
    pub fn player_property_names(&self, controller: &Entity) -> Vec<String> {
        let mut names = self.property_names(controller);
        if let Some(pawn) = self.pawn_of(controller) {
            for name in self.property_names(pawn) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

fn axis_index(name: &str) -> Option<usize> {
    match name {
        "X" => Some(0),
        "Y" => Some(1),
        "Z" => Some(2),
        _ => None,
    }
}
