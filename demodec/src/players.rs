//! The players of a recording.

use codec::{FieldValue, UserInfo, USER_INFO_TABLE};
use serde::Serialize;

use crate::state::{DemoState, TEAM_PROPERTY};

/// One player, merged from their controller entity and `userinfo` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub slot: u32,
    /// Controller entity id, when the controller is live.
    pub entity_id: Option<u32>,
    pub name: Option<String>,
    pub steamid: Option<u64>,
    pub userid: Option<u32>,
    pub team: Option<i64>,
    pub is_hltv: bool,
}

/// Players ordered by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PlayerRoster {
    players: Vec<PlayerInfo>,
}

impl PlayerRoster {
    /// Collects every player the state knows about.
    ///
    /// Live controllers come first in each slot; `userinfo` entries fill in
    /// what controllers lack and add players without a live controller.
    #[must_use]
    pub fn collect(state: &DemoState) -> Self {
        let mut players: Vec<PlayerInfo> = state
            .controllers()
            .map(|controller| {
                let slot = DemoState::slot_of(controller);
                let user = state.user_info(slot);
                PlayerInfo {
                    slot,
                    entity_id: Some(controller.id().raw()),
                    name: state.player_name(controller),
                    steamid: state.steamid(controller),
                    userid: user.as_ref().map(|user| user.userid),
                    team: state
                        .player_property(controller, TEAM_PROPERTY)
                        .as_ref()
                        .and_then(FieldValue::as_i64),
                    is_hltv: user.is_some_and(|user| user.is_hltv),
                }
            })
            .collect();

        if let Some(table) = state.string_tables().get(USER_INFO_TABLE) {
            for (slot, entry) in table.entries() {
                if players.iter().any(|player| player.slot == slot) {
                    continue;
                }
                let Ok(user) = UserInfo::decode(&entry.value, &state.limits) else {
                    tracing::debug!(slot, "skipping unreadable userinfo entry");
                    continue;
                };
                players.push(PlayerInfo {
                    slot,
                    entity_id: None,
                    name: Some(user.name),
                    steamid: Some(user.steamid),
                    userid: Some(user.userid),
                    team: None,
                    is_hltv: user.is_hltv,
                });
            }
        }
        players.sort_by_key(|player| player.slot);
        Self { players }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.players.iter()
    }

    #[must_use]
    pub fn by_slot(&self, slot: u32) -> Option<&PlayerInfo> {
        self.players.iter().find(|player| player.slot == slot)
    }

    #[must_use]
    pub fn by_steamid(&self, steamid: u64) -> Option<&PlayerInfo> {
        self.players
            .iter()
            .find(|player| player.steamid == Some(steamid))
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<PlayerInfo> {
        self.players
    }
}

impl<'a> IntoIterator for &'a PlayerRoster {
    type Item = &'a PlayerInfo;
    type IntoIter = std::slice::Iter<'a, PlayerInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.players.iter()
    }
}
