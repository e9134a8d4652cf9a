//! Grid directions, rotations and cell positions

use serde::{Deserialize, Serialize};

/// Facing direction of a tank body, turret or projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Unit step for this direction (y grows downwards)
    pub fn normal(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    /// Heading in degrees, clockwise from `Up`
    pub fn degrees(self) -> f32 {
        match self {
            Direction::Up => 0.0,
            Direction::Right => 90.0,
            Direction::Down => 180.0,
            Direction::Left => 270.0,
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % 4]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self as usize + 3) % 4]
    }

    pub fn opposite(self) -> Self {
        Self::ALL[(self as usize + 2) % 4]
    }

    pub fn rotate(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Left => self.previous(),
            Rotation::Right => self.next(),
        }
    }

    pub fn is_perpendicular(self, other: Direction) -> bool {
        (self as u8) % 2 != (other as u8) % 2
    }

    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Up | Direction::Down => Orientation::Vertical,
            Direction::Left | Direction::Right => Orientation::Horizontal,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Rotation applied to a tank body or turret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rotation {
    Left = 0,
    Right = 1,
}

/// Axis of a laser beam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Horizontal = 0,
    Vertical = 1,
}

/// Movement relative to the tank's facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovementDirection {
    Forward = 0,
    Backward = 1,
}

/// Integer cell coordinate. May lie outside the grid, callers bound-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position `steps` cells along `direction`
    pub fn step(self, direction: Direction, steps: i32) -> Self {
        let (nx, ny) = direction.normal();
        Self::new(self.x + nx * steps, self.y + ny * steps)
    }

    /// True when the two cells touch, diagonals included
    pub fn is_adjacent8(self, other: Position) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycles_through_all_directions() {
        let mut dir = Direction::Up;
        for _ in 0..4 {
            dir = dir.rotate(Rotation::Right);
        }
        assert_eq!(dir, Direction::Up);
        assert_eq!(Direction::Up.rotate(Rotation::Left), Direction::Left);
        assert_eq!(Direction::Left.rotate(Rotation::Right), Direction::Up);
    }

    #[test]
    fn perpendicular_and_orientation() {
        assert!(Direction::Up.is_perpendicular(Direction::Left));
        assert!(!Direction::Up.is_perpendicular(Direction::Down));
        assert_eq!(Direction::Down.orientation(), Orientation::Vertical);
        assert_eq!(Direction::Right.orientation(), Orientation::Horizontal);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn step_follows_screen_coordinates() {
        let p = Position::new(3, 3);
        assert_eq!(p.step(Direction::Up, 1), Position::new(3, 2));
        assert_eq!(p.step(Direction::Right, -1), Position::new(2, 3));
        assert!(p.is_adjacent8(Position::new(4, 4)));
        assert!(!p.is_adjacent8(p));
    }
}
