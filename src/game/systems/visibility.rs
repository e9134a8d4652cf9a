//! Fog of war
//!
//! Every tick each live tank gets a boolean grid of the cells it can see.
//! Vision spreads outward from the tank cell through open cells that lie
//! inside the hull's view cone with a clear line of sight, and the turret
//! additionally reveals a straight corridor up to the first wall.

use std::collections::{HashMap, VecDeque};

use crate::game::direction::{Direction, Position};
use crate::game::grid::Grid;
use crate::game::player::PlayerId;
use crate::game::tank::Tank;

/// Full cone width in degrees, centred on the hull direction
pub const VIEW_ANGLE: f32 = 144.0;

const SIGHT_STEP: f32 = 0.1;
const SAMPLE_OFFSETS: [(f32, f32); 4] = [(0.25, 0.25), (0.25, 0.75), (0.75, 0.75), (0.75, 0.25)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityGrid {
    dim: usize,
    cells: Vec<bool>,
}

impl VisibilityGrid {
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            cells: vec![false; dim * dim],
        }
    }

    pub fn full(dim: usize) -> Self {
        Self {
            dim,
            cells: vec![true; dim * dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn index(&self, p: Position) -> Option<usize> {
        let in_bounds =
            p.x >= 0 && p.y >= 0 && (p.x as usize) < self.dim && (p.y as usize) < self.dim;
        in_bounds.then(|| p.y as usize * self.dim + p.x as usize)
    }

    pub fn is_visible(&self, p: Position) -> bool {
        self.index(p).is_some_and(|i| self.cells[i])
    }

    pub fn set_visible(&mut self, p: Position) {
        if let Some(i) = self.index(p) {
            self.cells[i] = true;
        }
    }

    pub fn union(&mut self, other: &VisibilityGrid) {
        for (cell, seen) in self.cells.iter_mut().zip(&other.cells) {
            *cell |= *seen;
        }
    }

    pub fn visible_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// One '0'/'1' string per row
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .chunks(self.dim.max(1))
            .map(|row| row.iter().map(|&c| if c { '1' } else { '0' }).collect())
            .collect()
    }
}

#[derive(Debug)]
pub struct VisibilitySystem {
    dim: usize,
    views: HashMap<PlayerId, VisibilityGrid>,
}

impl VisibilitySystem {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            views: HashMap::new(),
        }
    }

    pub fn update(&mut self, grid: &Grid) {
        self.views = grid
            .tanks
            .iter()
            .map(|tank| (tank.owner, Self::compute(grid, tank)))
            .collect();
    }

    /// Last computed view, empty for unknown or dead tanks
    pub fn view(&self, owner: PlayerId) -> VisibilityGrid {
        self.views
            .get(&owner)
            .cloned()
            .unwrap_or_else(|| VisibilityGrid::empty(self.dim))
    }

    /// Union over the given members
    pub fn team_view(&self, members: &[PlayerId]) -> VisibilityGrid {
        let mut combined = VisibilityGrid::empty(self.dim);
        for member in members {
            if let Some(view) = self.views.get(member) {
                combined.union(view);
            }
        }
        combined
    }

    pub fn is_visible_by_any(&self, p: Position) -> bool {
        self.views.values().any(|v| v.is_visible(p))
    }

    pub fn forget(&mut self, owner: PlayerId) {
        self.views.remove(&owner);
    }

    pub fn compute(grid: &Grid, tank: &Tank) -> VisibilityGrid {
        let mut view = VisibilityGrid::empty(grid.dim());
        let Some(origin) = tank.position() else {
            return view;
        };

        let eye = (origin.x as f32 + 0.5, origin.y as f32 + 0.5);
        let facing = tank.direction.degrees();
        let mut visited = vec![false; grid.dim() * grid.dim()];
        let mut queue = VecDeque::from([origin]);

        while let Some(cell) = queue.pop_front() {
            let index = cell.y as usize * grid.dim() + cell.x as usize;
            if visited[index] || grid.is_wall(cell) {
                continue;
            }
            visited[index] = true;

            let seen = cell == origin
                || SAMPLE_OFFSETS.iter().any(|(ox, oy)| {
                    let target = (cell.x as f32 + ox, cell.y as f32 + oy);
                    in_cone(eye, target, facing) && line_of_sight(grid, eye, target)
                });
            if !seen {
                continue;
            }
            view.set_visible(cell);
            for direction in Direction::ALL {
                let next = cell.step(direction, 1);
                if grid.in_bounds(next) {
                    queue.push_back(next);
                }
            }
        }

        let mut cell = origin;
        while grid.in_bounds(cell) && !grid.is_wall(cell) {
            view.set_visible(cell);
            cell = cell.step(tank.turret.direction, 1);
        }
        view
    }
}

fn normalize_angle(mut angle: f32) -> f32 {
    while angle < -180.0 {
        angle += 360.0;
    }
    while angle > 180.0 {
        angle -= 360.0;
    }
    angle
}

fn in_cone(eye: (f32, f32), target: (f32, f32), facing: f32) -> bool {
    let (dx, dy) = (target.0 - eye.0, target.1 - eye.1);
    let angle = dy.atan2(dx).to_degrees() + 90.0;
    normalize_angle(angle - facing).abs() <= VIEW_ANGLE / 2.0
}

/// Sample the segment at fixed intervals and fail on the first wall cell
fn line_of_sight(grid: &Grid, from: (f32, f32), to: (f32, f32)) -> bool {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = ((dx * dx + dy * dy).sqrt() / SIGHT_STEP).ceil() as usize;
    (0..=steps).all(|i| {
        let t = if steps == 0 { 1.0 } else { i as f32 / steps as f32 };
        let cell = Position::new(
            (from.0 + dx * t).floor() as i32,
            (from.1 + dy * t).floor() as i32,
        );
        !grid.is_wall(cell)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ability::AbilitySet;
    use uuid::Uuid;

    fn tank_at(at: Position, hull: Direction, turret: Direction) -> Tank {
        Tank::new(Uuid::new_v4(), at, hull, turret, AbilitySet::new(Vec::new()))
    }

    #[test]
    fn cone_faces_hull_direction() {
        let grid = Grid::new(9);
        let tank = tank_at(Position::new(4, 4), Direction::Up, Direction::Up);
        let view = VisibilitySystem::compute(&grid, &tank);

        assert!(view.is_visible(Position::new(4, 0)));
        assert!(view.is_visible(Position::new(1, 2)));
        assert!(!view.is_visible(Position::new(4, 7)));
        assert!(!view.is_visible(Position::new(2, 8)));
    }

    #[test]
    fn walls_block_sight() {
        let mut grid = Grid::new(9);
        grid.set_wall(Position::new(4, 3), true);
        let tank = tank_at(Position::new(4, 4), Direction::Up, Direction::Up);
        let view = VisibilitySystem::compute(&grid, &tank);

        assert!(!view.is_visible(Position::new(4, 3)));
        assert!(!view.is_visible(Position::new(4, 2)));
        assert!(!view.is_visible(Position::new(4, 0)));
        assert!(view.is_visible(Position::new(2, 2)));
    }

    #[test]
    fn own_cell_and_turret_corridor_are_visible() {
        let mut grid = Grid::new(9);
        grid.set_wall(Position::new(4, 7), true);
        let tank = tank_at(Position::new(4, 4), Direction::Up, Direction::Down);
        let view = VisibilitySystem::compute(&grid, &tank);

        assert!(view.is_visible(Position::new(4, 4)));
        assert!(view.is_visible(Position::new(4, 5)));
        assert!(view.is_visible(Position::new(4, 6)));
        assert!(!view.is_visible(Position::new(4, 8)));
    }

    #[test]
    fn dead_tanks_see_nothing_and_team_view_is_union() {
        let mut grid = Grid::new(9);
        let mut dead = tank_at(Position::new(1, 1), Direction::Up, Direction::Up);
        dead.kill();
        let left = tank_at(Position::new(0, 4), Direction::Left, Direction::Left);
        let right = tank_at(Position::new(8, 4), Direction::Right, Direction::Right);
        let ids = [dead.owner, left.owner, right.owner];
        grid.tanks.extend([dead, left, right]);

        let mut system = VisibilitySystem::new(9);
        system.update(&grid);
        assert_eq!(system.view(ids[0]).visible_count(), 0);

        let team = system.team_view(&ids[1..]);
        assert!(team.is_visible(Position::new(0, 4)));
        assert!(team.is_visible(Position::new(8, 4)));
        assert!(system.is_visible_by_any(Position::new(8, 4)));
        assert!(!system.is_visible_by_any(Position::new(4, 4)));

        system.forget(ids[2]);
        assert!(!system.is_visible_by_any(Position::new(8, 4)));
    }

    #[test]
    fn rows_encode_one_string_per_row() {
        let mut view = VisibilityGrid::empty(3);
        view.set_visible(Position::new(2, 0));
        view.set_visible(Position::new(0, 1));
        assert_eq!(view.to_rows(), vec!["001", "100", "000"]);
    }
}
