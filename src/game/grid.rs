//! Canonical world state: walls and every dynamic entity

use super::direction::Position;
use super::entity::{Bullet, Laser, Mine, SecondaryItem};
use super::player::PlayerId;
use super::tank::Tank;
use super::zone::Zone;

/// Square arena. Walls are static after generation.
#[derive(Debug, Clone)]
pub struct Grid {
    dim: usize,
    walls: Vec<bool>,
    pub tanks: Vec<Tank>,
    pub bullets: Vec<Bullet>,
    pub lasers: Vec<Laser>,
    pub mines: Vec<Mine>,
    pub items: Vec<SecondaryItem>,
    pub zones: Vec<Zone>,
    next_entity_id: u32,
}

impl Grid {
    /// Open arena without walls or zones
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            walls: vec![false; dim * dim],
            tanks: Vec::new(),
            bullets: Vec::new(),
            lasers: Vec::new(),
            mines: Vec::new(),
            items: Vec::new(),
            zones: Vec::new(),
            next_entity_id: 0,
        }
    }

    pub fn with_layout(dim: usize, walls: Vec<bool>, zones: Vec<Zone>) -> Self {
        debug_assert_eq!(walls.len(), dim * dim);
        let mut grid = Self::new(dim);
        grid.walls = walls;
        grid.zones = zones;
        grid
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn in_bounds(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as usize) < self.dim && (p.y as usize) < self.dim
    }

    fn index(&self, p: Position) -> usize {
        p.y as usize * self.dim + p.x as usize
    }

    /// Out-of-bounds cells are not walls, check bounds separately
    pub fn is_wall(&self, p: Position) -> bool {
        self.in_bounds(p) && self.walls[self.index(p)]
    }

    pub fn set_wall(&mut self, p: Position, wall: bool) {
        if self.in_bounds(p) {
            let idx = self.index(p);
            self.walls[idx] = wall;
        }
    }

    pub fn walls(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.dim).flat_map(move |y| {
            (0..self.dim).filter_map(move |x| {
                let p = Position::new(x as i32, y as i32);
                self.is_wall(p).then_some(p)
            })
        })
    }

    pub fn next_entity_id(&mut self) -> u32 {
        self.next_entity_id += 1;
        self.next_entity_id
    }

    pub fn tank(&self, owner: PlayerId) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.owner == owner)
    }

    pub fn tank_mut(&mut self, owner: PlayerId) -> Option<&mut Tank> {
        self.tanks.iter_mut().find(|t| t.owner == owner)
    }

    pub fn tank_at(&self, p: Position) -> Option<&Tank> {
        self.tanks.iter().find(|t| t.is_at(p))
    }

    pub fn tanks_at(&self, p: Position) -> Vec<PlayerId> {
        self.tanks
            .iter()
            .filter(|t| t.is_at(p))
            .map(|t| t.owner)
            .collect()
    }

    pub fn zone_at(&self, p: Position) -> Option<&Zone> {
        self.zones.iter().find(|z| z.contains(p))
    }

    /// Walkable: inside the arena, no wall and no tank
    pub fn is_passable(&self, p: Position) -> bool {
        self.in_bounds(p) && !self.is_wall(p) && self.tank_at(p).is_none()
    }

    /// Holds nothing at all, the requirement for spawning things
    pub fn is_empty_cell(&self, p: Position) -> bool {
        self.is_passable(p)
            && !self.bullets.iter().any(|b| b.cell() == p)
            && !self.lasers.iter().any(|l| l.position == p)
            && !self.mines.iter().any(|m| m.position == p)
            && !self.items.iter().any(|i| i.position == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_and_walls() {
        let mut grid = Grid::new(4);
        let p = Position::new(1, 2);
        assert!(grid.in_bounds(p));
        assert!(!grid.in_bounds(Position::new(4, 0)));
        assert!(!grid.in_bounds(Position::new(-1, 0)));

        grid.set_wall(p, true);
        assert!(grid.is_wall(p));
        assert!(!grid.is_passable(p));
        assert!(!grid.is_wall(Position::new(9, 9)));
        assert_eq!(grid.walls().collect::<Vec<_>>(), vec![p]);
    }

    #[test]
    fn entity_ids_are_monotonic() {
        let mut grid = Grid::new(2);
        let a = grid.next_entity_id();
        let b = grid.next_entity_id();
        assert!(b > a);
    }
}
