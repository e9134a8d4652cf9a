//! Bullet flight and firing

use std::collections::HashMap;

use super::{Collision, CollisionDetector, DamageSystem, StunEffect};
use crate::game::direction::Position;
use crate::game::entity::{Bullet, BulletKind};
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::tank::TankType;
use crate::game::world::World;

/// Ticks a stun bullet blocks its target for
pub const STUN_BULLET_TICKS: u32 = 10;

/// Cells crossed moving from `from` to `to`, in order, excluding `from`.
/// A bullet that did not leave its cell yields that cell alone.
pub fn trajectory(from: Position, to: Position) -> Vec<Position> {
    if from == to {
        return vec![from];
    }

    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut cells = Vec::with_capacity((dx.max(dy)) as usize);

    while (x, y) != (to.x, to.y) {
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
        cells.push(Position::new(x, y));
    }
    cells
}

pub struct BulletSystem;

impl BulletSystem {
    /// Queue a bullet at the muzzle cell. It joins the live set during the
    /// next bullet update.
    pub fn fire(world: &mut World, shooter: PlayerId, kind: BulletKind) -> Option<u32> {
        let tank = world.grid.tank(shooter)?;
        let position = tank.position()?;
        let direction = tank.turret.direction;
        let damage = match kind {
            BulletKind::Basic => Bullet::DAMAGE,
            BulletKind::Double => Bullet::DOUBLE_DAMAGE,
            BulletKind::Stun => 0,
        };

        let id = world.grid.next_entity_id();
        let bullet = Bullet::new(
            id,
            position.step(direction, 1),
            direction,
            Bullet::SPEED,
            damage,
            Some(shooter),
            kind,
        );
        world.pending_bullets.push(bullet);
        world.emit(GameEvent::BulletFired {
            tick: world.tick(),
            bullet_id: id,
            shooter,
            kind,
        });
        Some(id)
    }

    pub fn update(world: &mut World, delta: f32) {
        let mut trajectories = HashMap::with_capacity(world.grid.bullets.len());
        for bullet in &mut world.grid.bullets {
            let from = bullet.cell();
            bullet.advance(delta);
            trajectories.insert(bullet.id, trajectory(from, bullet.cell()));
        }
        Self::resolve_collisions(world, &trajectories);

        for bullet in std::mem::take(&mut world.pending_bullets) {
            trajectories.insert(bullet.id, vec![bullet.cell()]);
            world.grid.bullets.push(bullet);
        }
        Self::resolve_collisions(world, &trajectories);
    }

    fn resolve_collisions(world: &mut World, trajectories: &HashMap<u32, Vec<Position>>) {
        let ids: Vec<u32> = world.grid.bullets.iter().map(|b| b.id).collect();
        for id in ids {
            let Some(bullet) = world.grid.bullets.iter().find(|b| b.id == id) else {
                continue;
            };
            if let Some(collision) = CollisionDetector::check(bullet, &world.grid, trajectories) {
                Self::resolve(world, id, collision);
            }
        }
    }

    fn remove(world: &mut World, id: u32) -> Option<Bullet> {
        let index = world.grid.bullets.iter().position(|b| b.id == id)?;
        Some(world.grid.bullets.remove(index))
    }

    fn resolve(world: &mut World, id: u32, collision: Collision) {
        let Some(bullet) = Self::remove(world, id) else {
            return;
        };

        match collision {
            Collision::Border | Collision::Wall | Collision::Laser => {}
            Collision::Bullet(other_id) => {
                let Some(other) = Self::remove(world, other_id) else {
                    return;
                };
                // an absorbed double shot survives as a weaker bullet
                let survivor = match (bullet.is_double(), other.is_double()) {
                    (true, false) => Some(bullet),
                    (false, true) => Some(other),
                    _ => None,
                };
                if let Some(double) = survivor {
                    let id = world.grid.next_entity_id();
                    world.grid.bullets.push(Bullet::new(
                        id,
                        double.cell(),
                        double.direction,
                        double.speed,
                        double.damage / 2,
                        double.shooter,
                        BulletKind::Basic,
                    ));
                }
            }
            Collision::Tank(target) => {
                let dealt = match bullet.kind {
                    BulletKind::Basic | BulletKind::Double => {
                        DamageSystem::apply(world, target, bullet.damage, bullet.shooter)
                    }
                    BulletKind::Stun => {
                        let effect = bullet
                            .shooter
                            .and_then(|s| world.grid.tank(s))
                            .and_then(|t| t.kind)
                            .map(|kind| match kind {
                                TankType::Heavy => StunEffect::MOVEMENT,
                                TankType::Light => StunEffect::ABILITY_USE,
                            })
                            .unwrap_or(StunEffect::NONE);
                        world.stuns.apply(target, effect, STUN_BULLET_TICKS);
                        0
                    }
                };

                if let Some(shooter) = bullet.shooter {
                    if dealt > 0 && !world.same_team(shooter, target) {
                        world.award_score(shooter, dealt / 2);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ability::AbilityType;
    use crate::game::action::Action;
    use crate::game::direction::Direction;
    use crate::game::grid::Grid;
    use crate::game::player::{Player, PlayerKind};
    use crate::game::ruleset::Ruleset;
    use uuid::Uuid;

    fn spawn(world: &mut World, at: Position, turret: Direction) -> PlayerId {
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, "T".into(), PlayerKind::Bot, 0));
        world
            .grid
            .tank_mut(id)
            .unwrap()
            .respawn_at(at, turret, turret);
        id
    }

    fn loose_bullet(world: &mut World, at: Position, direction: Direction, kind: BulletKind) {
        let id = world.grid.next_entity_id();
        let damage = if kind == BulletKind::Double {
            Bullet::DOUBLE_DAMAGE
        } else {
            Bullet::DAMAGE
        };
        world
            .grid
            .bullets
            .push(Bullet::new(id, at, direction, Bullet::SPEED, damage, None, kind));
    }

    #[test]
    fn trajectory_is_gapless_and_skips_start() {
        let cases = [
            (Position::new(0, 0), Position::new(5, 0)),
            (Position::new(5, 5), Position::new(5, 1)),
            (Position::new(2, 2), Position::new(7, 4)),
            (Position::new(6, 1), Position::new(0, 9)),
        ];
        for (from, to) in cases {
            let cells = trajectory(from, to);
            assert!(!cells.contains(&from));
            assert_eq!(cells.last(), Some(&to));
            assert!(from.is_adjacent8(cells[0]));
            for pair in cells.windows(2) {
                assert!(pair[0].is_adjacent8(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
            }
        }
        assert_eq!(trajectory(Position::new(3, 3), Position::new(3, 3)), vec![Position::new(3, 3)]);
    }

    #[test]
    fn opposing_regular_bullets_destroy_each_other() {
        let mut world = World::with_grid(Grid::new(12), Ruleset::Solo, 1);
        loose_bullet(&mut world, Position::new(2, 5), Direction::Right, BulletKind::Basic);
        loose_bullet(&mut world, Position::new(6, 5), Direction::Left, BulletKind::Basic);

        world.update(1.0);
        assert!(world.grid.bullets.is_empty());
    }

    #[test]
    fn double_bullet_downgrades_when_absorbing_regular() {
        let mut world = World::with_grid(Grid::new(12), Ruleset::Solo, 1);
        loose_bullet(&mut world, Position::new(2, 5), Direction::Right, BulletKind::Double);
        loose_bullet(&mut world, Position::new(5, 5), Direction::Left, BulletKind::Basic);

        world.update(1.0);

        assert_eq!(world.grid.bullets.len(), 1);
        let survivor = &world.grid.bullets[0];
        assert_eq!(survivor.kind, BulletKind::Basic);
        assert_eq!(survivor.damage, Bullet::DOUBLE_DAMAGE / 2);
        assert_eq!(survivor.direction, Direction::Right);
    }

    #[test]
    fn perpendicular_bullets_pass_unless_same_step() {
        let mut world = World::with_grid(Grid::new(12), Ruleset::Solo, 1);
        // both reach (5, 5) on the second step
        loose_bullet(&mut world, Position::new(3, 5), Direction::Right, BulletKind::Basic);
        loose_bullet(&mut world, Position::new(5, 3), Direction::Down, BulletKind::Basic);
        world.update(1.0);
        assert!(world.grid.bullets.is_empty());

        let mut world = World::with_grid(Grid::new(12), Ruleset::Solo, 1);
        // (5, 5) is the first step of one and the second step of the other
        loose_bullet(&mut world, Position::new(4, 5), Direction::Right, BulletKind::Basic);
        loose_bullet(&mut world, Position::new(5, 3), Direction::Down, BulletKind::Basic);
        world.update(1.0);
        assert_eq!(world.grid.bullets.len(), 2);
    }

    #[test]
    fn bullets_stop_at_walls_and_borders() {
        let mut grid = Grid::new(8);
        grid.set_wall(Position::new(4, 1), true);
        let mut world = World::with_grid(grid, Ruleset::Solo, 1);
        loose_bullet(&mut world, Position::new(3, 1), Direction::Right, BulletKind::Basic);
        loose_bullet(&mut world, Position::new(1, 6), Direction::Left, BulletKind::Basic);

        world.update(1.0);
        assert!(world.grid.bullets.is_empty());
    }

    #[test]
    fn adjacent_target_is_hit_on_the_firing_tick() {
        let mut world = World::with_grid(Grid::new(8), Ruleset::Solo, 1);
        let shooter = spawn(&mut world, Position::new(2, 2), Direction::Down);
        let target = spawn(&mut world, Position::new(2, 3), Direction::Up);

        world
            .apply_action(shooter, Action::UseAbility(AbilityType::FireBullet))
            .unwrap();
        world.update(1.0);

        assert_eq!(world.grid.tank(target).unwrap().health, 80);
        assert_eq!(world.grid.tank(shooter).unwrap().abilities.bullet.count(), 2);
    }

    #[test]
    fn stun_bullet_blocks_by_shooter_chassis() {
        let mut world = World::with_grid(Grid::new(8), Ruleset::Team, 1);
        let shooter = Uuid::new_v4();
        let mut player = Player::new(shooter, "H".into(), PlayerKind::Bot, 0);
        player.team = Some("red".into());
        player.tank_type = Some(TankType::Heavy);
        world.add_player(player);
        world
            .grid
            .tank_mut(shooter)
            .unwrap()
            .respawn_at(Position::new(1, 1), Direction::Right, Direction::Right);
        let target = spawn(&mut world, Position::new(2, 1), Direction::Left);

        world
            .apply_action(shooter, Action::UseAbility(AbilityType::FireStunBullet))
            .unwrap();
        world.update(1.0);

        assert_eq!(world.grid.tank(target).unwrap().health, 100);
        assert!(world.stuns.is_blocked(target, StunEffect::MOVEMENT));
        assert!(!world.stuns.is_blocked(target, StunEffect::ABILITY_USE));
    }
}
