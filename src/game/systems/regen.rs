//! Ability cooldowns and tank respawn

use super::SpawnSystem;
use crate::game::ability::Regenerable;
use crate::game::events::GameEvent;
use crate::game::world::World;

pub struct RegenSystem;

impl RegenSystem {
    pub fn update(world: &mut World) {
        for tank in &mut world.grid.tanks {
            tank.abilities.regenerate_tick();
            tank.regenerate_tick();
        }

        let ready: Vec<_> = world
            .grid
            .tanks
            .iter()
            .filter(|t| t.is_ready_to_respawn())
            .map(|t| t.owner)
            .collect();
        for owner in ready {
            if let Some(position) = SpawnSystem::respawn(world, owner) {
                world.emit(GameEvent::TankRespawned {
                    tick: world.tick(),
                    player_id: owner,
                    position,
                });
            }
        }
    }
}
