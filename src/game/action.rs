//! Player intents applied to the world at the start of a tick

use thiserror::Error;

use super::ability::AbilityType;
use super::direction::{MovementDirection, Rotation};
use super::pathfinding::GoToRequest;
use super::player::PlayerId;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move(MovementDirection),
    Rotate {
        tank: Option<Rotation>,
        turret: Option<Rotation>,
    },
    UseAbility(AbilityType),
    Pass,
    /// Navigation assist, resolved to a single move or rotation
    GoTo(GoToRequest),
    /// Debug only: instantly recharge an ability
    ChargeAbility(AbilityType),
}

impl Action {
    pub fn is_pass(&self) -> bool {
        matches!(self, Action::Pass)
    }

    pub fn is_go_to(&self) -> bool {
        matches!(self, Action::GoTo(_))
    }
}

/// Validation failures, reported back to the sender
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("player {0} has no tank")]
    UnknownPlayer(PlayerId),

    #[error("tank is dead")]
    TankDead,

    #[error("goto coordinates ({x}, {y}) are out of bounds")]
    TargetOutOfBounds { x: i32, y: i32 },

    #[error("goto coordinates ({x}, {y}) lead to a wall")]
    TargetIsWall { x: i32, y: i32 },
}
