//! Projectiles, beams, mines and pickups living on the grid

use serde::{Deserialize, Serialize};

use super::ability::SecondaryItemType;
use super::direction::{Direction, Orientation, Position};
use super::player::PlayerId;

/// Projectile flavour, decides what a hit does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulletKind {
    Basic,
    Double,
    Stun,
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    x: f32,
    y: f32,
    start: Position,
    pub direction: Direction,
    pub speed: f32,
    pub damage: i32,
    pub shooter: Option<PlayerId>,
    pub kind: BulletKind,
}

impl PartialEq for Bullet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Bullet {
    pub const SPEED: f32 = 2.0;
    pub const DAMAGE: i32 = 20;
    pub const DOUBLE_DAMAGE: i32 = 40;

    pub fn new(
        id: u32,
        at: Position,
        direction: Direction,
        speed: f32,
        damage: i32,
        shooter: Option<PlayerId>,
        kind: BulletKind,
    ) -> Self {
        Self {
            id,
            x: at.x as f32,
            y: at.y as f32,
            start: at,
            direction,
            speed,
            damage,
            shooter,
            kind,
        }
    }

    /// Cell currently occupied
    pub fn cell(&self) -> Position {
        Position::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    /// Cell occupied before the last [`Bullet::advance`]
    pub fn previous_cell(&self) -> Position {
        self.start
    }

    /// Move `speed * delta` along the facing direction
    pub fn advance(&mut self, delta: f32) {
        self.start = self.cell();
        let (nx, ny) = self.direction.normal();
        self.x += nx as f32 * self.speed * delta;
        self.y += ny as f32 * self.speed * delta;
    }

    pub fn is_double(&self) -> bool {
        self.kind == BulletKind::Double
    }
}

/// One cell of an active beam
#[derive(Debug, Clone, PartialEq)]
pub struct Laser {
    pub id: u32,
    pub position: Position,
    pub orientation: Orientation,
    pub damage: i32,
    pub remaining_ticks: u32,
    pub shooter: Option<PlayerId>,
}

impl Laser {
    pub const DAMAGE: i32 = 80;
    pub const BLAST_TICKS: u32 = 10;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mine {
    pub id: u32,
    pub position: Position,
    pub damage: i32,
    pub layer: Option<PlayerId>,
    pub explosion_remaining_ticks: Option<u32>,
    /// Marked by a neighbouring blast, detonates on the next update
    pub explode_next_tick: bool,
}

impl Mine {
    pub const DAMAGE: i32 = 50;
    pub const EXPLOSION_TICKS: u32 = 10;

    pub fn new(id: u32, position: Position, layer: Option<PlayerId>) -> Self {
        Self {
            id,
            position,
            damage: Self::DAMAGE,
            layer,
            explosion_remaining_ticks: None,
            explode_next_tick: false,
        }
    }

    pub fn is_exploded(&self) -> bool {
        self.explosion_remaining_ticks.is_some()
    }

    pub fn is_fully_exploded(&self) -> bool {
        self.explosion_remaining_ticks == Some(0)
    }
}

/// Pickup tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryItem {
    pub position: Position,
    pub kind: SecondaryItemType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_advances_and_remembers_start() {
        let mut bullet = Bullet::new(
            1,
            Position::new(4, 4),
            Direction::Left,
            Bullet::SPEED,
            Bullet::DAMAGE,
            None,
            BulletKind::Basic,
        );
        bullet.advance(1.0);
        assert_eq!(bullet.cell(), Position::new(2, 4));
        assert_eq!(bullet.previous_cell(), Position::new(4, 4));

        bullet.advance(0.25);
        assert_eq!(bullet.cell(), Position::new(1, 4));
    }

    #[test]
    fn mine_explosion_state() {
        let mut mine = Mine::new(1, Position::new(0, 0), None);
        assert!(!mine.is_exploded());
        mine.explosion_remaining_ticks = Some(3);
        assert!(mine.is_exploded() && !mine.is_fully_exploded());
        mine.explosion_remaining_ticks = Some(0);
        assert!(mine.is_fully_exploded());
    }
}
