//! Seeded arena generation
//!
//! Walls start as dense noise, get cleared out of the zones and are then
//! carved until every open cell is reachable from every other one.

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::game::direction::{Direction, Position};
use crate::game::zone::Zone;

pub const ZONE_SIZE: i32 = 4;
const ZONE_ATTEMPTS: usize = 10_000;
const WALL_DENSITY_PERCENT: usize = 75;

pub struct MapGenerator<'a> {
    dim: usize,
    rng: &'a mut ChaCha8Rng,
}

impl<'a> MapGenerator<'a> {
    pub fn new(dim: usize, rng: &'a mut ChaCha8Rng) -> Self {
        Self { dim, rng }
    }

    /// Place up to `count` square zones, apart from each other on both axes
    pub fn generate_zones(&mut self, count: usize) -> Vec<Zone> {
        let dim = self.dim as i32;
        let mut zones: Vec<Zone> = Vec::with_capacity(count);
        if dim - ZONE_SIZE <= 1 {
            warn!(dim, "arena too small for zones");
            return zones;
        }
        let min_distance = (dim - ZONE_SIZE) / 2 - ZONE_SIZE;

        for i in 0..count {
            let mut placed = None;
            for _ in 0..ZONE_ATTEMPTS {
                let x = self.rng.gen_range(1..dim - ZONE_SIZE);
                let y = self.rng.gen_range(1..dim - ZONE_SIZE);
                let fits = zones.iter().all(|z| {
                    let gap_x = (z.x - (x + ZONE_SIZE)).max(x - (z.x + z.width));
                    let gap_y = (z.y - (y + ZONE_SIZE)).max(y - (z.y + z.height));
                    gap_x >= 0.max(min_distance) && gap_y >= 0.max(min_distance)
                });
                if fits {
                    placed = Some((x, y));
                    break;
                }
            }

            let Some((x, y)) = placed else {
                warn!(generated = zones.len(), requested = count, "zone placement gave up");
                break;
            };
            let index = char::from(b'A' + i as u8);
            zones.push(Zone::new(index, x, y, ZONE_SIZE, ZONE_SIZE));
        }
        zones
    }

    /// Wall mask indexed `y * dim + x`
    pub fn generate_walls(&mut self, zones: &[Zone]) -> Vec<bool> {
        let mut walls = vec![false; self.dim * self.dim];
        for _ in 0..self.dim * self.dim * WALL_DENSITY_PERCENT / 100 {
            let x = self.rng.gen_range(0..self.dim);
            let y = self.rng.gen_range(0..self.dim);
            walls[y * self.dim + x] = true;
        }

        self.thin_zones(&mut walls, zones);
        let mut passes = 0;
        while self.connect_areas(&mut walls) {
            passes += 1;
        }
        self.open_next_to_corridors(&mut walls, self.dim * self.dim / 2);
        self.fill_open_space(&mut walls, self.dim * self.dim / 2);
        self.thin_zones(&mut walls, zones);

        debug!(dim = self.dim, passes, walls = walls.iter().filter(|w| **w).count(), "map generated");
        walls
    }

    fn index(&self, p: Position) -> Option<usize> {
        let dim = self.dim as i32;
        (p.x >= 0 && p.y >= 0 && p.x < dim && p.y < dim).then(|| p.y as usize * self.dim + p.x as usize)
    }

    /// Keep only 10 to 20 percent of each zone's cells as walls
    fn thin_zones(&mut self, walls: &mut [bool], zones: &[Zone]) {
        for zone in zones {
            let percent = self.rng.gen_range(10..20) as f32;
            let allowed = (zone.width * zone.height) as f32 * percent / 100.0;
            let mut inside: Vec<usize> = zone
                .cells()
                .filter_map(|p| self.index(p))
                .filter(|&i| walls[i])
                .collect();
            while inside.len() as f32 > allowed {
                let pick = self.rng.gen_range(0..inside.len());
                walls[inside.swap_remove(pick)] = false;
            }
        }
    }

    fn components(&self, walls: &[bool]) -> Vec<Vec<usize>> {
        let mut seen = vec![false; walls.len()];
        let mut components = Vec::new();
        for start in 0..walls.len() {
            if walls[start] || seen[start] {
                continue;
            }
            seen[start] = true;
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(cell) = queue.pop_front() {
                for next in self.neighbours(cell) {
                    if !walls[next] && !seen[next] {
                        seen[next] = true;
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    fn neighbours(&self, cell: usize) -> impl Iterator<Item = usize> + '_ {
        let p = Position::new((cell % self.dim) as i32, (cell / self.dim) as i32);
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.index(p.step(d, 1)))
    }

    /// Carve one tunnel from every detached area to its nearest outside
    /// open cell. Returns whether anything was carved.
    fn connect_areas(&self, walls: &mut [bool]) -> bool {
        let mut components = self.components(walls);
        if components.len() <= 1 {
            return false;
        }
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        let mut owner = vec![usize::MAX; walls.len()];
        for (id, component) in components.iter().enumerate() {
            for &cell in component {
                owner[cell] = id;
            }
        }

        for (id, component) in components.iter().enumerate().skip(1) {
            let mut parent: HashMap<usize, usize> = HashMap::new();
            let mut queue: VecDeque<usize> = component.iter().copied().collect();
            let mut visited = vec![false; walls.len()];
            for &cell in component {
                visited[cell] = true;
            }

            let mut reached = None;
            while let Some(cell) = queue.pop_front() {
                if !walls[cell] && owner[cell] != id {
                    reached = Some(cell);
                    break;
                }
                for next in self.neighbours(cell) {
                    if !visited[next] {
                        visited[next] = true;
                        parent.insert(next, cell);
                        queue.push_back(next);
                    }
                }
            }

            let mut cursor = reached;
            while let Some(cell) = cursor {
                walls[cell] = false;
                cursor = parent.get(&cell).copied();
            }
        }
        true
    }

    /// Random erosion of walls touching open cells
    fn open_next_to_corridors(&mut self, walls: &mut [bool], attempts: usize) {
        for _ in 0..attempts {
            let cell = self.rng.gen_range(0..walls.len());
            if self.neighbours(cell).any(|n| !walls[n]) {
                walls[cell] = false;
            }
        }
    }

    /// Random pillars in the middle of open space
    fn fill_open_space(&mut self, walls: &mut [bool], attempts: usize) {
        if self.dim < 3 {
            return;
        }
        let dim = self.dim as i32;
        for _ in 0..attempts {
            let x = self.rng.gen_range(1..dim - 1);
            let y = self.rng.gen_range(1..dim - 1);
            let open = (-1..=1)
                .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                .filter(|&offset| offset != (0, 0))
                .filter_map(|(dx, dy)| self.index(Position::new(x + dx, y + dy)))
                .all(|i| !walls[i]);
            if open {
                walls[y as usize * self.dim + x as usize] = true;
            }
        }
    }
}
