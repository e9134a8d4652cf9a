//! Bullet hit detection along per-tick trajectories

use std::collections::HashMap;

use crate::game::direction::Position;
use crate::game::entity::Bullet;
use crate::game::grid::Grid;
use crate::game::player::PlayerId;

/// What a bullet ran into first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Border,
    Wall,
    Laser,
    Bullet(u32),
    Tank(PlayerId),
}

pub struct CollisionDetector;

impl CollisionDetector {
    /// Walk the bullet's trajectory and report the first obstacle.
    ///
    /// Per cell the priority is border, wall, laser, another bullet, then a
    /// tank other than the shooter. Bullets without a trajectory this pass
    /// (spawned during resolution) are never checked.
    pub fn check(
        bullet: &Bullet,
        grid: &Grid,
        trajectories: &HashMap<u32, Vec<Position>>,
    ) -> Option<Collision> {
        let trajectory = trajectories.get(&bullet.id)?;

        for (step, &cell) in trajectory.iter().enumerate() {
            if !grid.in_bounds(cell) {
                return Some(Collision::Border);
            }
            if grid.is_wall(cell) {
                return Some(Collision::Wall);
            }
            if grid.lasers.iter().any(|l| l.position == cell) {
                return Some(Collision::Laser);
            }
            if let Some(other) = Self::bullet_at(bullet, trajectory, step, cell, grid, trajectories) {
                return Some(Collision::Bullet(other));
            }
            if let Some(owner) = Self::tank_at(bullet, trajectory, cell, grid) {
                return Some(Collision::Tank(owner));
            }
        }
        None
    }

    fn bullet_at(
        bullet: &Bullet,
        trajectory: &[Position],
        step: usize,
        cell: Position,
        grid: &Grid,
        trajectories: &HashMap<u32, Vec<Position>>,
    ) -> Option<u32> {
        for other in grid.bullets.iter().filter(|b| b.id != bullet.id) {
            let Some(other_path) = trajectories.get(&other.id) else {
                continue;
            };

            let hit = if bullet.direction.is_perpendicular(other.direction) {
                other_path.get(step) == Some(&cell)
            } else {
                other_path.contains(&cell)
            };
            if hit {
                return Some(other.id);
            }

            // head-on bullets that swapped cells without sharing one
            if bullet.direction.opposite() == other.direction {
                let (Some(&first), Some(&other_first)) = (trajectory.first(), other_path.first())
                else {
                    continue;
                };
                let before = first.step(bullet.direction, -1);
                let other_before = other_first.step(other.direction, -1);
                if trajectory.contains(&other_before) && other_path.contains(&before) {
                    return Some(other.id);
                }
            }
        }
        None
    }

    fn tank_at(
        bullet: &Bullet,
        trajectory: &[Position],
        cell: Position,
        grid: &Grid,
    ) -> Option<PlayerId> {
        for tank in grid.tanks.iter().filter(|t| Some(t.owner) != bullet.shooter) {
            let Some(position) = tank.position() else {
                continue;
            };
            if position == cell {
                return Some(tank.owner);
            }

            // tank drove through the bullet towards the cell it came from
            if trajectory.len() < 2 {
                continue;
            }
            let Some(previous) = tank.previous_position() else {
                continue;
            };
            let first = trajectory[0];
            if previous == first && position == first.step(bullet.direction, -1) {
                return Some(tank.owner);
            }
        }
        None
    }
}
