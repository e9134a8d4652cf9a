//! Tank arena simulation
//!
//! The [`world::World`] owns all game state and is advanced one tick at a
//! time by the [`systems`]. [`GameMatch`] wraps it with the lobby lifecycle
//! and the broadcast loop.

pub mod ability;
pub mod action;
pub mod direction;
pub mod entity;
pub mod events;
pub mod grid;
pub mod r#match;
pub mod pathfinding;
pub mod player;
pub mod ruleset;
pub mod snapshot;
pub mod systems;
pub mod tank;
pub mod world;
pub mod zone;

pub use r#match::{GameMatch, GameStatus, JoinRequest, MatchCommand, MatchHandle};
