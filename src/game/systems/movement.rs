//! Hull movement and rotation

use super::StunEffect;
use crate::game::direction::{MovementDirection, Rotation};
use crate::game::player::PlayerId;
use crate::game::world::World;

pub struct MovementSystem;

impl MovementSystem {
    /// Step one cell forward or backward. Blocked moves are dropped.
    pub fn move_tank(world: &mut World, id: PlayerId, movement: MovementDirection) {
        if world.stuns.is_blocked(id, StunEffect::MOVEMENT) {
            return;
        }
        let Some(tank) = world.grid.tank(id) else {
            return;
        };
        let Some(position) = tank.position() else {
            return;
        };

        let steps = match movement {
            MovementDirection::Forward => 1,
            MovementDirection::Backward => -1,
        };
        let target = position.step(tank.direction, steps);
        if !world.grid.is_passable(target) {
            return;
        }
        if let Some(tank) = world.grid.tank_mut(id) {
            tank.set_position(target);
        }
    }

    /// Rotate the hull and turret independently, each subject to its own stun
    pub fn rotate(
        world: &mut World,
        id: PlayerId,
        hull: Option<Rotation>,
        turret: Option<Rotation>,
    ) {
        let hull = hull.filter(|_| !world.stuns.is_blocked(id, StunEffect::TANK_ROTATION));
        let turret = turret.filter(|_| !world.stuns.is_blocked(id, StunEffect::TURRET_ROTATION));
        let Some(tank) = world.grid.tank_mut(id) else {
            return;
        };
        if tank.is_dead() {
            return;
        }
        if let Some(rotation) = hull {
            tank.direction = tank.direction.rotate(rotation);
        }
        if let Some(rotation) = turret {
            tank.turret.rotate(rotation);
        }
    }
}
