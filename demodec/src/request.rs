//! What a projection pass should produce.

use std::borrow::Borrow;
use std::collections::BTreeSet;

/// A set of wanted items, or every item the recording has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T: Ord> {
    All,
    Only(BTreeSet<T>),
}

impl<T: Ord> Selection<T> {
    /// Selects exactly the given items.
    pub fn only<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<T>,
    {
        Self::Only(items.into_iter().map(Into::into).collect())
    }

    /// Selects nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self::Only(BTreeSet::new())
    }

    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self {
            Self::All => true,
            Self::Only(items) => items.contains(item),
        }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Returns `true` when nothing can match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(items) if items.is_empty())
    }

    /// The explicit items, or `None` for [`Selection::All`].
    #[must_use]
    pub const fn items(&self) -> Option<&BTreeSet<T>> {
        match self {
            Self::All => None,
            Self::Only(items) => Some(items),
        }
    }
}

impl<T: Ord> Default for Selection<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// The outputs of one projection pass.
///
/// Everything defaults to "nothing" except `event_fields` and `players`,
/// which default to all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRequest {
    pub(crate) events: Selection<String>,
    pub(crate) event_fields: Selection<String>,
    pub(crate) player_fields: Selection<String>,
    pub(crate) other_fields: Selection<String>,
    pub(crate) ticks: Selection<u32>,
    pub(crate) tick_fields: Selection<String>,
    pub(crate) players: Selection<u64>,
    pub(crate) grenades: bool,
}

impl Default for ProjectionRequest {
    fn default() -> Self {
        Self {
            events: Selection::none(),
            event_fields: Selection::All,
            player_fields: Selection::none(),
            other_fields: Selection::none(),
            ticks: Selection::none(),
            tick_fields: Selection::none(),
            players: Selection::All,
            grenades: false,
        }
    }
}

impl ProjectionRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names to emit rows for.
    #[must_use]
    pub fn events(mut self, events: Selection<String>) -> Self {
        self.events = events;
        self
    }

    /// Raw event keys kept on each event row.
    #[must_use]
    pub fn event_fields(mut self, fields: Selection<String>) -> Self {
        self.event_fields = fields;
        self
    }

    /// Player properties attached to event rows for each player key.
    #[must_use]
    pub fn player_fields(mut self, fields: Selection<String>) -> Self {
        self.player_fields = fields;
        self
    }

    /// Game rules properties attached to every event row.
    #[must_use]
    pub fn other_fields(mut self, fields: Selection<String>) -> Self {
        self.other_fields = fields;
        self
    }

    /// Ticks at which player snapshots are taken.
    #[must_use]
    pub fn ticks(mut self, ticks: Selection<u32>) -> Self {
        self.ticks = ticks;
        self
    }

    /// Player properties on each snapshot row.
    #[must_use]
    pub fn tick_fields(mut self, fields: Selection<String>) -> Self {
        self.tick_fields = fields;
        self
    }

    /// Steam ids of the players that get snapshot rows.
    #[must_use]
    pub fn players(mut self, players: Selection<u64>) -> Self {
        self.players = players;
        self
    }

    /// Emits one row per live projectile per tick.
    #[must_use]
    pub fn grenades(mut self, grenades: bool) -> Self {
        self.grenades = grenades;
        self
    }

    pub(crate) fn wants_snapshot(&self, tick: u32) -> bool {
        self.ticks.contains(&tick)
    }

    /// Returns `true` when per-tick work is needed at all.
    pub(crate) fn wants_tick_rows(&self) -> bool {
        self.grenades || !self.ticks.is_empty()
    }
}
