//! Single-pass decoder for replay recordings.
//!
//! A recording is a preamble followed by frames. Frames carry the schema,
//! string tables, entity deltas, game events and voice. This crate folds
//! them into state with one forward pass per request and projects the rows
//! a caller asked for:
//!
//! - [`parse_events`] / [`parse_event`]: game events, with player and game
//!   rules properties attached
//! - [`parse_ticks`]: player snapshots at chosen ticks, as rows or columns
//! - [`parse_player_info`], [`parse_grenades`], [`parse_header`],
//!   [`list_game_events`], [`parse_voice`], [`parse_item_drops`],
//!   [`parse_skins`]
//!
//! Lower-level access goes through [`Projection`] (a lazy row iterator) and
//! [`DemoParser`] (the frame state machine). [`Dispatcher`] spreads many
//! recordings over a worker pool.
//!
//! # Design Principles
//!
//! - **One pass** - Every request decodes the recording at most once, front to back.
//! - **Lazy** - Rows are produced as frames are decoded; dropping a projection stops decoding.
//! - **Lenient** - Corrupt messages are skipped and counted unless [`ParseOptions::strict`] is set.
//! - **No shared state** - Nothing persists between requests.

pub mod api;
pub mod dispatch;
pub mod error;
pub mod options;
pub mod parser;
pub mod players;
pub mod projection;
pub mod request;
pub mod row;
pub mod state;
pub mod writer;

pub use api::{
    list_game_events, parse_event, parse_events, parse_grenades, parse_header, parse_item_drops,
    parse_player_info, parse_skins, parse_ticks, parse_voice, Demo, DemoHeader, TickOutput,
};
pub use dispatch::Dispatcher;
pub use error::{DemoError, DemoResult};
pub use options::ParseOptions;
pub use parser::DemoParser;
pub use players::{PlayerInfo, PlayerRoster};
pub use projection::Projection;
pub use request::{ProjectionRequest, Selection};
pub use row::{Columns, EventRow, Fields, GrenadeRow, Row, SnapshotRow};
pub use state::{DemoState, ParseSummary};

pub use codec;
pub use schema;
pub use wire;
