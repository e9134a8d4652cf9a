//! Domain events emitted by the simulation
//!
//! The world collects events while a tick runs. The match loop drains them
//! after the tick and publishes them on a broadcast channel.

use serde::Serialize;

use super::ability::{AbilityType, SecondaryItemType};
use super::direction::Position;
use super::entity::BulletKind;
use super::player::PlayerId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    TankDied {
        tick: u64,
        player_id: PlayerId,
        killer: Option<PlayerId>,
    },
    TankRespawned {
        tick: u64,
        player_id: PlayerId,
        position: Position,
    },
    BulletFired {
        tick: u64,
        bullet_id: u32,
        shooter: PlayerId,
        kind: BulletKind,
    },
    LaserFired {
        tick: u64,
        shooter: PlayerId,
        cells: usize,
    },
    MineDropped {
        tick: u64,
        mine_id: u32,
        layer: PlayerId,
        position: Position,
    },
    MineExploded {
        tick: u64,
        mine_id: u32,
        position: Position,
        victim: Option<PlayerId>,
    },
    AbilityUsed {
        tick: u64,
        player_id: PlayerId,
        ability: AbilityType,
    },
    ZoneStateChanged {
        tick: u64,
        zone: char,
        from: &'static str,
        to: &'static str,
    },
    ItemPickedUp {
        tick: u64,
        player_id: PlayerId,
        item: SecondaryItemType,
    },
}

impl GameEvent {
    pub fn tick(&self) -> u64 {
        match self {
            GameEvent::TankDied { tick, .. }
            | GameEvent::TankRespawned { tick, .. }
            | GameEvent::BulletFired { tick, .. }
            | GameEvent::LaserFired { tick, .. }
            | GameEvent::MineDropped { tick, .. }
            | GameEvent::MineExploded { tick, .. }
            | GameEvent::AbilityUsed { tick, .. }
            | GameEvent::ZoneStateChanged { tick, .. }
            | GameEvent::ItemPickedUp { tick, .. } => *tick,
        }
    }
}
