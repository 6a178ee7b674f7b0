//! The lazy, single-pass projection engine.

use std::collections::VecDeque;

use ahash::AHashMap;
use codec::{Entity, EntityId, EventField, EventKeyType, FieldValue, GameEvent, Tick};
use wire::FrameKind;

use crate::error::DemoResult;
use crate::options::ParseOptions;
use crate::parser::DemoParser;
use crate::request::{ProjectionRequest, Selection};
use crate::row::{EventRow, Fields, GrenadeRow, Row, SnapshotRow};
use crate::state::{DemoState, ParseSummary, PROJECTILE_MARKER, THROWER_PROPERTY};

/// Event keys that name a player even when their type does not say so.
const PLAYER_KEY_NAMES: [&str; 4] = ["userid", "attacker", "assister", "victim"];

/// Raw player keys, replaced by their enrichment columns when every event
/// key is selected.
const INTERNAL_PLAYER_KEYS: [&str; 8] = [
    "userid",
    "attacker",
    "assister",
    "victim",
    "userid_pawn",
    "attacker_pawn",
    "assister_pawn",
    "victim_pawn",
];

/// Key naming the projectile in grenade events; it stands for the thrower.
const PROJECTILE_KEY: &str = "entityid";

/// How an event key value points at a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerRef {
    /// A player slot.
    Slot,
    /// A pawn entity handle.
    Pawn,
    /// A projectile entity id, resolved to whoever threw it.
    Projectile,
}

/// Rows of one request, produced while the recording is decoded.
///
/// Frames are decoded only as rows are pulled; dropping the projection stops
/// the pass. Snapshot and grenade rows for a tick are emitted once every
/// frame of that tick has been applied.
#[derive(Debug)]
pub struct Projection<'a> {
    parser: DemoParser<'a>,
    request: ProjectionRequest,
    pending: VecDeque<Row>,
    current: Option<Tick>,
    done: bool,
    /// "All fields" name lists per (controller class, pawn class).
    field_names: AHashMap<(u32, Option<u32>), Vec<String>>,
}

impl<'a> Projection<'a> {
    pub fn new(bytes: &'a [u8], request: ProjectionRequest, options: ParseOptions) -> DemoResult<Self> {
        let parser = DemoParser::new(bytes, options)?.with_events(request.events.clone());
        Ok(Self {
            parser,
            request,
            pending: VecDeque::new(),
            current: None,
            done: false,
            field_names: AHashMap::new(),
        })
    }

    /// State as of the last applied frame.
    #[must_use]
    pub const fn state(&self) -> &DemoState {
        self.parser.state()
    }

    #[must_use]
    pub fn summary(&self) -> ParseSummary {
        self.parser.state().summary()
    }

    /// Ends the projection, returning the parser with its state.
    #[must_use]
    pub fn into_parser(self) -> DemoParser<'a> {
        self.parser
    }

    fn advance(&mut self) -> DemoResult<()> {
        let Some(frame) = self.parser.next_frame()? else {
            self.leave_tick();
            self.current = None;
            self.done = true;
            return Ok(());
        };
        if frame.kind != FrameKind::Stop {
            let tick = Tick::new(frame.tick);
            match self.current {
                Some(current) if tick > current => {
                    self.leave_tick();
                    self.current = Some(tick);
                }
                None => self.current = Some(tick),
                Some(_) => {}
            }
        }
        for event in self.parser.apply(&frame)? {
            let row = self.event_row(event);
            self.pending.push_back(Row::Event(row));
        }
        Ok(())
    }

    /// Emits the per-tick rows of the tick being left.
    fn leave_tick(&mut self) {
        if !self.request.wants_tick_rows() {
            return;
        }
        let Some(tick) = self.current else {
            return;
        };
        if self.request.wants_snapshot(tick.raw()) {
            self.snapshot_rows(tick);
        }
        if self.request.grenades {
            self.grenade_rows(tick);
        }
    }

    fn snapshot_rows(&mut self, tick: Tick) {
        let state = self.parser.state();
        let mut unresolved = 0;
        for controller in state.controllers() {
            let steamid = state.steamid(controller);
            let wanted = match &self.request.players {
                Selection::All => true,
                Selection::Only(ids) => steamid.is_some_and(|id| ids.contains(&id)),
            };
            if !wanted {
                continue;
            }
            let names = field_list(
                &self.request.tick_fields,
                state,
                controller,
                &mut self.field_names,
            );
            let mut fields = Fields::new();
            for name in names {
                let value = state.player_property(controller, &name);
                unresolved += u64::from(value.is_none());
                fields.insert(name, value);
            }
            self.pending.push_back(Row::Snapshot(SnapshotRow {
                tick: tick.raw(),
                entity_id: controller.id().raw(),
                steamid,
                name: state.player_name(controller),
                fields,
            }));
        }
        self.parser.note_unresolved(unresolved);
    }

    fn grenade_rows(&mut self, tick: Tick) {
        let state = self.parser.state();
        for entity in state.entities().iter() {
            let Some(class) = state.class_name(entity) else {
                continue;
            };
            if !class.contains(PROJECTILE_MARKER) {
                continue;
            }
            let origin = state.origin(entity);
            let thrower = thrower_of(state, entity);
            self.pending.push_back(Row::Grenade(GrenadeRow {
                tick: tick.raw(),
                entity_id: entity.id().raw(),
                grenade_type: class.to_string(),
                x: origin.map(|o| o[0]),
                y: origin.map(|o| o[1]),
                z: origin.map(|o| o[2]),
                thrower_name: thrower.and_then(|c| state.player_name(c)),
                thrower_steamid: thrower.and_then(|c| state.steamid(c)),
            }));
        }
    }

    fn event_row(&mut self, event: GameEvent) -> EventRow {
        let state = self.parser.state();
        let mut unresolved = 0;
        let mut fields = Fields::new();

        match &self.request.event_fields {
            Selection::All => {
                for field in &event.fields {
                    if INTERNAL_PLAYER_KEYS.contains(&field.name.as_str()) {
                        continue;
                    }
                    fields.insert(field.name.clone(), Some(field.value.clone()));
                }
            }
            Selection::Only(names) => {
                for name in names {
                    let value = event.get(name).cloned();
                    unresolved += u64::from(value.is_none());
                    fields.insert(name.clone(), value);
                }
            }
        }

        for field in &event.fields {
            let Some((prefix, reference)) = player_key(&event, field) else {
                continue;
            };
            let controller = resolve_player(state, field, reference);
            fields.insert(
                format!("{prefix}_name"),
                controller
                    .and_then(|c| state.player_name(c))
                    .map(FieldValue::String),
            );
            fields.insert(
                format!("{prefix}_steamid"),
                controller
                    .and_then(|c| state.steamid(c))
                    .map(FieldValue::U64),
            );
            let names = match controller {
                Some(controller) => field_list(
                    &self.request.player_fields,
                    state,
                    controller,
                    &mut self.field_names,
                ),
                None => self
                    .request
                    .player_fields
                    .items()
                    .map(|items| items.iter().cloned().collect())
                    .unwrap_or_default(),
            };
            for name in names {
                let value = controller.and_then(|c| state.player_property(c, &name));
                unresolved += u64::from(value.is_none());
                fields.insert(format!("{prefix}_{name}"), value);
            }
        }

        if !self.request.other_fields.is_empty() {
            let rules = state.game_rules();
            let names: Vec<String> = match (&self.request.other_fields, rules) {
                (Selection::Only(names), _) => names.iter().cloned().collect(),
                (Selection::All, Some(rules)) => state.property_names(rules),
                (Selection::All, None) => Vec::new(),
            };
            for name in names {
                let value = rules.and_then(|rules| state.entity_property(rules, &name));
                unresolved += u64::from(value.is_none());
                fields.insert(name, value);
            }
        }

        self.parser.note_unresolved(unresolved);
        EventRow {
            tick: event.tick.raw(),
            name: event.name,
            fields,
        }
    }
}

impl Iterator for Projection<'_> {
    type Item = DemoResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.advance() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

/// The field names a selection expands to for one player.
fn field_list(
    selection: &Selection<String>,
    state: &DemoState,
    controller: &Entity,
    cache: &mut AHashMap<(u32, Option<u32>), Vec<String>>,
) -> Vec<String> {
    match selection {
        Selection::Only(names) => names.iter().cloned().collect(),
        Selection::All => {
            let key = (
                controller.class_id(),
                state.pawn_of(controller).map(Entity::class_id),
            );
            cache
                .entry(key)
                .or_insert_with(|| state.player_property_names(controller))
                .clone()
        }
    }
}

/// Column prefix for a player key, and how its value resolves.
///
/// A `<key>_pawn` key only stands in for `<key>` when the event lacks it,
/// and `entityid` only stands in for `userid`. Every player is enriched
/// once per event.
fn player_key<'e>(event: &GameEvent, field: &'e EventField) -> Option<(&'e str, PlayerRef)> {
    let name = field.name.as_str();
    let has = |key: &str| event.get(key).is_some();
    let by_type = if field.key_type == EventKeyType::PlayerPawn {
        PlayerRef::Pawn
    } else {
        PlayerRef::Slot
    };
    if PLAYER_KEY_NAMES.contains(&name) {
        return Some((column_prefix(name), by_type));
    }
    if name == PROJECTILE_KEY {
        return (!has("userid")).then_some(("user", PlayerRef::Projectile));
    }
    if let Some(base) = name.strip_suffix("_pawn").filter(|base| !base.is_empty()) {
        if has(base) || (base == "userid" && has(PROJECTILE_KEY)) {
            return None;
        }
        return Some((column_prefix(base), PlayerRef::Pawn));
    }
    field.key_type.is_player().then_some((name, by_type))
}

fn column_prefix(key: &str) -> &str {
    if key == "userid" {
        "user"
    } else {
        key
    }
}

/// The controller an event key points at.
fn resolve_player<'s>(
    state: &'s DemoState,
    field: &EventField,
    reference: PlayerRef,
) -> Option<&'s Entity> {
    match reference {
        PlayerRef::Pawn => {
            let handle = u32::try_from(field.value.as_u64()?).ok()?;
            state.controller_of_pawn(EntityId::from_handle(handle)?)
        }
        PlayerRef::Projectile => {
            let id = u32::try_from(field.value.as_i64()?).ok()?;
            let projectile = state.entities().get(EntityId::new(id))?;
            thrower_of(state, projectile)
        }
        PlayerRef::Slot => {
            let slot = u32::try_from(field.value.as_i64()?).ok()?;
            state.controller_for_slot(slot)
        }
    }
}

/// The controller that threw a projectile.
fn thrower_of<'s>(state: &'s DemoState, projectile: &Entity) -> Option<&'s Entity> {
    let handle = u32::try_from(
        state
            .entity_property(projectile, THROWER_PROPERTY)?
            .as_u64()?,
    )
    .ok()?;
    let id = EntityId::from_handle(handle)?;
    let entity = state.entities().get(id)?;
    if state.is_controller(entity) {
        Some(entity)
    } else {
        state.controller_of_pawn(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, key_type: EventKeyType) -> EventField {
        EventField {
            name: name.into(),
            key_type,
            value: FieldValue::I32(0),
        }
    }

    fn event(keys: &[(&str, EventKeyType)]) -> GameEvent {
        GameEvent {
            id: 1,
            name: "test".into(),
            tick: Tick::new(0),
            fields: keys.iter().map(|(name, kind)| field(name, *kind)).collect(),
        }
    }

    fn keys_of(event: &GameEvent) -> Vec<(&str, PlayerRef)> {
        event
            .fields
            .iter()
            .filter_map(|field| player_key(event, field))
            .collect()
    }

    #[test]
    fn player_prefixes() {
        let death = event(&[
            ("userid", EventKeyType::Short),
            ("attacker", EventKeyType::Short),
            ("weapon", EventKeyType::String),
            ("player", EventKeyType::PlayerController),
        ]);
        assert_eq!(
            keys_of(&death),
            [
                ("user", PlayerRef::Slot),
                ("attacker", PlayerRef::Slot),
                ("player", PlayerRef::Slot),
            ]
        );
    }

    #[test]
    fn pawn_keys_stand_in_only_when_the_slot_key_is_missing() {
        let alone = event(&[("userid_pawn", EventKeyType::PlayerPawn)]);
        assert_eq!(keys_of(&alone), [("user", PlayerRef::Pawn)]);

        let both = event(&[
            ("userid", EventKeyType::Short),
            ("userid_pawn", EventKeyType::PlayerPawn),
            ("attacker_pawn", EventKeyType::PlayerPawn),
        ]);
        assert_eq!(
            keys_of(&both),
            [("user", PlayerRef::Slot), ("attacker", PlayerRef::Pawn)]
        );
    }

    #[test]
    fn projectile_key_names_the_thrower() {
        let detonate = event(&[
            ("entityid", EventKeyType::Short),
            ("userid_pawn", EventKeyType::PlayerPawn),
        ]);
        assert_eq!(keys_of(&detonate), [("user", PlayerRef::Projectile)]);

        let with_user = event(&[
            ("userid", EventKeyType::Short),
            ("entityid", EventKeyType::Short),
        ]);
        assert_eq!(keys_of(&with_user), [("user", PlayerRef::Slot)]);
    }

    #[test]
    fn unresolved_player_yields_nulls() {
        let state = DemoState::default();
        let userid = field("userid", EventKeyType::Short);
        assert!(resolve_player(&state, &userid, PlayerRef::Slot).is_none());
        let negative = EventField {
            name: "userid".into(),
            key_type: EventKeyType::Short,
            value: FieldValue::I32(-1),
        };
        assert!(resolve_player(&state, &negative, PlayerRef::Slot).is_none());
        let entityid = field("entityid", EventKeyType::Short);
        assert!(resolve_player(&state, &entityid, PlayerRef::Projectile).is_none());
    }
}
