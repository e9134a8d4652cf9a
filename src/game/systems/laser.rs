//! Laser beams

use super::{DamageSystem, MineSystem, StunEffect};
use crate::game::entity::Laser;
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::world::World;

pub struct LaserSystem;

impl LaserSystem {
    /// Cast a beam from the muzzle cell until a wall or the border and
    /// stun the firer for the beam's lifetime. Returns the beam length.
    pub fn fire(world: &mut World, shooter: PlayerId) -> usize {
        let Some(tank) = world.grid.tank(shooter) else {
            return 0;
        };
        let Some(origin) = tank.position() else {
            return 0;
        };
        let direction = tank.turret.direction;

        let mut cells = Vec::new();
        let mut cell = origin.step(direction, 1);
        while world.grid.in_bounds(cell) && !world.grid.is_wall(cell) {
            cells.push(cell);
            cell = cell.step(direction, 1);
        }

        for &position in &cells {
            let id = world.grid.next_entity_id();
            world.grid.lasers.push(Laser {
                id,
                position,
                orientation: direction.orientation(),
                damage: Laser::DAMAGE,
                remaining_ticks: Laser::BLAST_TICKS,
                shooter: Some(shooter),
            });
        }

        world
            .stuns
            .apply(shooter, StunEffect::ALL, Laser::BLAST_TICKS);
        world.emit(GameEvent::LaserFired {
            tick: world.tick(),
            shooter,
            cells: cells.len(),
        });
        cells.len()
    }

    /// Age every beam cell, then damage tanks and detonate mines under the
    /// cells that are still active.
    pub fn update(world: &mut World) {
        for laser in &mut world.grid.lasers {
            laser.remaining_ticks = laser.remaining_ticks.saturating_sub(1);
        }
        world.grid.lasers.retain(|l| l.remaining_ticks > 0);

        let active: Vec<Laser> = world.grid.lasers.clone();
        for laser in active {
            for victim in world.grid.tanks_at(laser.position) {
                let dealt = DamageSystem::apply(world, victim, laser.damage, laser.shooter);
                if let Some(shooter) = laser.shooter {
                    if !world.same_team(shooter, victim) {
                        world.award_score(shooter, dealt);
                    }
                }
            }
            MineSystem::explode_at(world, laser.position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::{Direction, Position};
    use crate::game::entity::Mine;
    use crate::game::grid::Grid;
    use crate::game::player::{Player, PlayerKind};
    use crate::game::ruleset::Ruleset;
    use uuid::Uuid;

    fn spawn(world: &mut World, at: Position, facing: Direction) -> PlayerId {
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, "L".into(), PlayerKind::Bot, 0));
        world
            .grid
            .tank_mut(id)
            .unwrap()
            .respawn_at(at, facing, facing);
        id
    }

    #[test]
    fn beam_stops_at_wall_and_stuns_firer() {
        let mut grid = Grid::new(10);
        grid.set_wall(Position::new(6, 2), true);
        let mut world = World::with_grid(grid, Ruleset::Team, 1);
        let shooter = spawn(&mut world, Position::new(1, 2), Direction::Right);

        assert_eq!(LaserSystem::fire(&mut world, shooter), 4);
        assert!(world.stuns.is_blocked(shooter, StunEffect::MOVEMENT));
        assert!(world.stuns.is_blocked(shooter, StunEffect::ABILITY_USE));
    }

    #[test]
    fn beam_damages_tanks_and_detonates_mines() {
        let mut world = World::with_grid(Grid::new(10), Ruleset::Solo, 1);
        let shooter = spawn(&mut world, Position::new(0, 0), Direction::Down);
        let victim = spawn(&mut world, Position::new(0, 3), Direction::Up);
        world.grid.mines.push(Mine::new(50, Position::new(0, 6), None));

        LaserSystem::fire(&mut world, shooter);
        LaserSystem::update(&mut world);

        assert_eq!(world.grid.tank(victim).unwrap().health, 20);
        assert_eq!(world.player(shooter).unwrap().score, 80);
        assert!(world.grid.mines[0].is_exploded());
    }

    #[test]
    fn beam_expires_after_blast_ticks() {
        let mut world = World::with_grid(Grid::new(6), Ruleset::Solo, 1);
        let shooter = spawn(&mut world, Position::new(0, 0), Direction::Right);
        LaserSystem::fire(&mut world, shooter);
        for _ in 0..Laser::BLAST_TICKS {
            LaserSystem::update(&mut world);
        }
        assert!(world.grid.lasers.is_empty());
    }
}
