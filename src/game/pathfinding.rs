//! Navigation assist for `GoTo` requests
//!
//! The search runs over (cell, hull direction) states with move and rotate
//! edges, and is repeated for every request since the arena changes every
//! tick. Only the first step of the cheapest route is returned. The player
//! knows only what it can see, so the search is seeded with walls and the
//! entities inside the player's current view.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use super::direction::{Direction, Position, Rotation};
use super::player::PlayerId;
use super::systems::VisibilityGrid;
use super::world::World;

/// First step of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathAction {
    MoveForward,
    MoveBackward,
    RotateLeft,
    RotateRight,
}

/// Base cost of each kind of step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Costs {
    pub forward: f32,
    pub backward: f32,
    pub rotate: f32,
}

impl Default for Costs {
    fn default() -> Self {
        Self {
            forward: 1.0,
            backward: 1.5,
            rotate: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPenalty {
    pub x: i32,
    pub y: i32,
    pub penalty: f32,
}

/// Extra cost of ending a step on a dangerous cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Penalties {
    /// Stepping into a cell outside the current view, first step only
    pub blindly: f32,
    pub bullet: f32,
    pub mine: f32,
    pub laser: f32,
    pub per_tile: Vec<CustomPenalty>,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            blindly: 5.0,
            bullet: 20.0,
            mine: 20.0,
            laser: 20.0,
            per_tile: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoToRequest {
    pub x: i32,
    pub y: i32,
    /// Applied alongside any hull rotation the route starts with
    pub turret_rotation: Option<Rotation>,
    pub costs: Costs,
    pub penalties: Penalties,
}

impl GoToRequest {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            turret_rotation: None,
            costs: Costs::default(),
            penalties: Penalties::default(),
        }
    }

    pub fn target(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Bullet as the player saw it, projected forward analytically
#[derive(Debug, Clone, Copy)]
struct KnownBullet {
    cell: Position,
    direction: Direction,
    speed: f32,
}

impl KnownBullet {
    fn cell_at(&self, depth: u32) -> Position {
        self.cell
            .step(self.direction, (self.speed * depth as f32).round() as i32)
    }
}

#[derive(Debug, Clone, Copy)]
struct Hazard {
    cell: Position,
    /// Ticks the hazard stays, `None` when permanent
    lasts: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    cost: f32,
    position: Position,
    direction: Direction,
    depth: u32,
    first: Option<PathAction>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    // min-heap on cost, shallower first on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.depth.cmp(&self.depth))
    }
}

pub struct PathFinder {
    dim: usize,
    walls: Vec<bool>,
    visibility: VisibilityGrid,
    bullets: Vec<KnownBullet>,
    mines: Vec<Hazard>,
    lasers: Vec<Hazard>,
    start: Position,
    facing: Direction,
}

impl PathFinder {
    /// Snapshot the player's knowledge. `None` when the tank is gone or dead.
    pub fn new(world: &World, player: PlayerId) -> Option<Self> {
        let tank = world.grid.tank(player)?;
        let start = tank.position()?;
        let visibility = world.view_of(player);
        let dim = world.grid.dim();

        let mut walls = vec![false; dim * dim];
        for wall in world.grid.walls() {
            walls[wall.y as usize * dim + wall.x as usize] = true;
        }

        let bullets = world
            .grid
            .bullets
            .iter()
            .filter(|b| visibility.is_visible(b.cell()))
            .map(|b| KnownBullet {
                cell: b.cell(),
                direction: b.direction,
                speed: b.speed,
            })
            .collect();
        let mines = world
            .grid
            .mines
            .iter()
            .filter(|m| visibility.is_visible(m.position))
            .map(|m| Hazard {
                cell: m.position,
                lasts: m.explosion_remaining_ticks,
            })
            .collect();
        let lasers = world
            .grid
            .lasers
            .iter()
            .filter(|l| visibility.is_visible(l.position))
            .map(|l| Hazard {
                cell: l.position,
                lasts: Some(l.remaining_ticks),
            })
            .collect();

        Some(Self {
            dim,
            walls,
            visibility,
            bullets,
            mines,
            lasers,
            start,
            facing: tank.direction,
        })
    }

    fn is_open(&self, p: Position) -> bool {
        let dim = self.dim as i32;
        p.x >= 0 && p.y >= 0 && p.x < dim && p.y < dim && !self.walls[p.y as usize * self.dim + p.x as usize]
    }

    fn danger(&self, cell: Position, depth: u32, penalties: &Penalties) -> f32 {
        let active = |h: &&Hazard| h.cell == cell && h.lasts.map_or(true, |t| t >= depth);

        let bullets = self.bullets.iter().filter(|b| b.cell_at(depth) == cell).count();
        let mines = self.mines.iter().filter(active).count();
        let lasers = self.lasers.iter().filter(active).count();

        let mut penalty = penalties.bullet * bullets as f32
            + penalties.mine * mines as f32
            + penalties.laser * lasers as f32;
        if depth == 1 && !self.visibility.is_visible(cell) {
            penalty += penalties.blindly;
        }
        penalty
            + penalties
                .per_tile
                .iter()
                .filter(|p| p.x == cell.x && p.y == cell.y)
                .map(|p| p.penalty)
                .sum::<f32>()
    }

    /// First step of the cheapest route, `None` when already there or the
    /// target cannot be reached
    pub fn next_action(&self, request: &GoToRequest) -> Option<PathAction> {
        let target = request.target();
        if target == self.start || !self.is_open(target) {
            return None;
        }

        let mut visited = HashSet::new();
        let mut queue = BinaryHeap::new();
        queue.push(Node {
            cost: 0.0,
            position: self.start,
            direction: self.facing,
            depth: 0,
            first: None,
        });

        while let Some(node) = queue.pop() {
            if node.position == target {
                return node.first;
            }
            if !visited.insert((node.position, node.direction)) {
                continue;
            }

            let depth = node.depth + 1;
            let mut push = |position: Position, direction: Direction, step: f32, action: PathAction| {
                queue.push(Node {
                    cost: node.cost + step + self.danger(position, depth, &request.penalties),
                    position,
                    direction,
                    depth,
                    first: node.first.or(Some(action)),
                });
            };

            let ahead = node.position.step(node.direction, 1);
            if self.is_open(ahead) {
                push(ahead, node.direction, request.costs.forward, PathAction::MoveForward);
            }
            let behind = node.position.step(node.direction, -1);
            if self.is_open(behind) {
                push(behind, node.direction, request.costs.backward, PathAction::MoveBackward);
            }
            push(
                node.position,
                node.direction.rotate(Rotation::Left),
                request.costs.rotate,
                PathAction::RotateLeft,
            );
            push(
                node.position,
                node.direction.rotate(Rotation::Right),
                request.costs.rotate,
                PathAction::RotateRight,
            );
        }
        None
    }
}
