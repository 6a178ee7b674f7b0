//! Core identifier types.

/// A server tick number.
///
/// Frames arrive in non-decreasing tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct Tick(u32);

impl Tick {
    #[must_use]
    pub const fn new(tick: u32) -> Self {
        Self(tick)
    }

    /// Returns the raw tick value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for Tick {
    fn from(tick: u32) -> Self {
        Self(tick)
    }
}

impl From<Tick> for u32 {
    fn from(tick: Tick) -> Self {
        tick.0
    }
}

/// Mask selecting the entity index from an entity handle.
pub const ENTITY_HANDLE_MASK: u32 = 0x7FF;

/// Handle value meaning "no entity".
pub const INVALID_HANDLE: u32 = 0xFF_FFFF;

/// An entity slot index.
///
/// Ids are reused after a delete; a reused id carries no identity from its
/// previous lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct EntityId(u32);

impl EntityId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw entity id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Extracts the entity index from a handle, or `None` for the invalid handle.
    #[must_use]
    pub const fn from_handle(handle: u32) -> Option<Self> {
        if handle == INVALID_HANDLE {
            return None;
        }
        Some(Self(handle & ENTITY_HANDLE_MASK))
    }

    /// The controller entity for a player slot.
    #[must_use]
    pub const fn from_player_slot(slot: u32) -> Self {
        Self((slot & 0xFF) + 1)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}
