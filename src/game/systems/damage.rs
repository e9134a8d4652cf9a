//! Damage application and death handling

use tracing::debug;

use super::{HealSystem, ItemSystem};
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::world::World;

pub struct DamageSystem;

impl DamageSystem {
    /// Apply `amount` to the target's tank and return the damage actually
    /// dealt. A killing blow takes the tank off the grid, credits a kill to
    /// `source` unless it is the victim and, where the rules say so, heals
    /// the attacker by the damage dealt.
    pub fn apply(world: &mut World, target: PlayerId, amount: i32, source: Option<PlayerId>) -> i32 {
        let tick = world.tick();
        let Some(tank) = world.grid.tank_mut(target) else {
            return 0;
        };
        if tank.is_dead() || amount <= 0 {
            return 0;
        }

        let dealt = amount.min(tank.health);
        tank.health -= dealt;
        if tank.health > 0 {
            return dealt;
        }

        let last_position = tank.position();
        let held = tank.secondary_item.take();
        tank.kill();

        world.heal.forget(target);
        world.stuns.clear(target);
        if let (Some(item), Some(at)) = (held, last_position) {
            ItemSystem::drop_near(&mut world.grid, item, at);
        }

        let killer = source.filter(|s| *s != target);
        debug!(tick, victim = %target, killer = ?killer, "tank destroyed");
        world.emit(GameEvent::TankDied {
            tick,
            player_id: target,
            killer,
        });

        if let Some(attacker) = killer {
            if let Some(player) = world.player_mut(attacker) {
                player.kills += 1;
            }
            if world.rules().heals_attacker() {
                if let Some(tank) = world.grid.tank_mut(attacker) {
                    HealSystem::heal(tank, dealt);
                }
            }
        }

        dealt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::{Direction, Position};
    use crate::game::grid::Grid;
    use crate::game::player::{Player, PlayerKind};
    use crate::game::ruleset::Ruleset;
    use crate::game::tank::Tank;
    use uuid::Uuid;

    fn world_with_two(ruleset: Ruleset) -> (World, PlayerId, PlayerId) {
        let mut world = World::with_grid(Grid::new(8), ruleset, 3);
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        for (i, id) in ids.iter().enumerate() {
            world.add_player(Player::new(*id, format!("P{i}"), PlayerKind::Bot, 0));
            let at = Position::new(i as i32 * 4, 0);
            world
                .grid
                .tank_mut(*id)
                .unwrap()
                .respawn_at(at, Direction::Down, Direction::Down);
        }
        (world, ids[0], ids[1])
    }

    #[test]
    fn damage_is_clamped_and_kill_is_credited() {
        let (mut world, attacker, victim) = world_with_two(Ruleset::Solo);
        world.grid.tank_mut(victim).unwrap().health = 30;
        world.grid.tank_mut(attacker).unwrap().health = 40;

        let dealt = DamageSystem::apply(&mut world, victim, 50, Some(attacker));

        assert_eq!(dealt, 30);
        assert!(world.grid.tank(victim).unwrap().is_dead());
        assert_eq!(world.player(attacker).unwrap().kills, 1);
        assert_eq!(world.grid.tank(attacker).unwrap().health, 70);
    }

    #[test]
    fn team_rules_do_not_heal_the_attacker() {
        let (mut world, attacker, victim) = world_with_two(Ruleset::Team);
        world.grid.tank_mut(attacker).unwrap().health = 40;
        DamageSystem::apply(&mut world, victim, Tank::HEALTH_MAX, Some(attacker));
        assert_eq!(world.grid.tank(attacker).unwrap().health, 40);
        assert_eq!(world.player(attacker).unwrap().kills, 1);
    }

    #[test]
    fn self_damage_never_counts_as_kill() {
        let (mut world, attacker, _) = world_with_two(Ruleset::Solo);
        DamageSystem::apply(&mut world, attacker, 500, Some(attacker));
        assert!(world.grid.tank(attacker).unwrap().is_dead());
        assert_eq!(world.player(attacker).unwrap().kills, 0);
        assert_eq!(DamageSystem::apply(&mut world, attacker, 10, None), 0);
    }
}
