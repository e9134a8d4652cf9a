//! Ability activation

use tracing::trace;

use super::{BulletSystem, LaserSystem, MineSystem, StunEffect};
use crate::game::ability::AbilityType;
use crate::game::entity::BulletKind;
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::world::World;

pub struct AbilitySystem;

impl AbilitySystem {
    /// A tank can use an ability while alive, not stunned for ability use,
    /// and with the ability's resource available
    pub fn can_use(world: &World, id: PlayerId, kind: AbilityType) -> bool {
        let Some(tank) = world.grid.tank(id) else {
            return false;
        };
        !tank.is_dead()
            && !world.stuns.is_blocked(id, StunEffect::ABILITY_USE)
            && tank.abilities.is_ready(kind, tank.secondary_item)
    }

    /// Use the ability if possible, spending its charge. Returns whether it
    /// fired.
    pub fn use_ability(world: &mut World, id: PlayerId, kind: AbilityType) -> bool {
        if !Self::can_use(world, id, kind) {
            trace!(player_id = %id, ?kind, "ability not ready");
            return false;
        }

        match kind {
            AbilityType::FireBullet => {
                BulletSystem::fire(world, id, BulletKind::Basic);
            }
            AbilityType::FireDoubleBullet => {
                BulletSystem::fire(world, id, BulletKind::Double);
            }
            AbilityType::FireStunBullet => {
                BulletSystem::fire(world, id, BulletKind::Stun);
            }
            AbilityType::UseLaser => {
                LaserSystem::fire(world, id);
            }
            AbilityType::DropMine => {
                MineSystem::drop(world, id);
            }
            AbilityType::UseRadar => {
                if let Some(tank) = world.grid.tank_mut(id) {
                    tank.abilities.set_radar_active(true);
                }
            }
        }

        if let Some(tank) = world.grid.tank_mut(id) {
            if tank.abilities.consume(kind) {
                tank.secondary_item = None;
            }
        }
        world.emit(GameEvent::AbilityUsed {
            tick: world.tick(),
            player_id: id,
            ability: kind,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ability::{BulletAbility, SecondaryItemType};
    use crate::game::direction::{Direction, Position};
    use crate::game::grid::Grid;
    use crate::game::player::{Player, PlayerKind};
    use crate::game::ruleset::Ruleset;
    use uuid::Uuid;

    fn world_with_tank(ruleset: Ruleset) -> (World, PlayerId) {
        let mut world = World::with_grid(Grid::new(8), ruleset, 1);
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, "A".into(), PlayerKind::Human, 0));
        world
            .grid
            .tank_mut(id)
            .unwrap()
            .respawn_at(Position::new(4, 4), Direction::Up, Direction::Up);
        (world, id)
    }

    #[test]
    fn magazine_runs_dry() {
        let (mut world, id) = world_with_tank(Ruleset::Solo);
        for _ in 0..BulletAbility::MAX_BULLETS {
            assert!(AbilitySystem::use_ability(&mut world, id, AbilityType::FireBullet));
        }
        assert!(!AbilitySystem::use_ability(&mut world, id, AbilityType::FireBullet));
        assert_eq!(world.pending_bullets.len(), BulletAbility::MAX_BULLETS as usize);
    }

    #[test]
    fn radar_consumes_item_and_activates() {
        let (mut world, id) = world_with_tank(Ruleset::Solo);
        assert!(!AbilitySystem::use_ability(&mut world, id, AbilityType::UseRadar));

        world.grid.tank_mut(id).unwrap().secondary_item = Some(SecondaryItemType::Radar);
        assert!(AbilitySystem::use_ability(&mut world, id, AbilityType::UseRadar));
        let tank = world.grid.tank(id).unwrap();
        assert!(tank.abilities.radar_active());
        assert!(tank.secondary_item.is_none());

        world.reset_tick_properties();
        assert!(!world.grid.tank(id).unwrap().abilities.radar_active());
    }

    #[test]
    fn ability_stun_blocks_use() {
        let (mut world, id) = world_with_tank(Ruleset::Team);
        world.stuns.apply(id, StunEffect::ABILITY_USE, 3);
        assert!(!AbilitySystem::can_use(&world, id, AbilityType::FireBullet));
    }
}
