//! Tanks and turrets

use serde::{Deserialize, Serialize};

use super::ability::{AbilitySet, AbilityType, Cooldown, Regenerable, SecondaryItemType};
use super::direction::{Direction, Position, Rotation};
use super::player::PlayerId;

/// Chassis class, only meaningful under team rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TankType {
    Light = 0,
    Heavy = 1,
}

impl TankType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "light" | "0" => Some(TankType::Light),
            "heavy" | "1" => Some(TankType::Heavy),
            _ => None,
        }
    }
}

/// Independently rotating weapon mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turret {
    pub direction: Direction,
}

impl Turret {
    pub fn rotate(&mut self, rotation: Rotation) {
        self.direction = self.direction.rotate(rotation);
    }
}

/// A player's tank. Equality is by owner.
#[derive(Debug, Clone)]
pub struct Tank {
    pub owner: PlayerId,
    pub team: Option<String>,
    pub kind: Option<TankType>,
    position: Option<Position>,
    previous_position: Option<Position>,
    pub direction: Direction,
    pub health: i32,
    pub turret: Turret,
    pub abilities: AbilitySet,
    pub secondary_item: Option<SecondaryItemType>,
    respawn: Cooldown,
}

impl PartialEq for Tank {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
    }
}

impl Eq for Tank {}

impl Tank {
    pub const HEALTH_MAX: i32 = 100;
    pub const RESPAWN_TICKS: u32 = 50;

    pub fn new(
        owner: PlayerId,
        position: Position,
        direction: Direction,
        turret_direction: Direction,
        abilities: AbilitySet,
    ) -> Self {
        Self {
            owner,
            team: None,
            kind: None,
            position: Some(position),
            previous_position: Some(position),
            direction,
            health: Self::HEALTH_MAX,
            turret: Turret {
                direction: turret_direction,
            },
            abilities,
            secondary_item: None,
            respawn: Cooldown::ready(Self::RESPAWN_TICKS),
        }
    }

    pub fn with_team(mut self, team: Option<String>, kind: Option<TankType>) -> Self {
        self.team = team;
        self.kind = kind;
        self
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn previous_position(&self) -> Option<Position> {
        self.previous_position
    }

    pub fn is_at(&self, cell: Position) -> bool {
        self.position == Some(cell)
    }

    pub fn is_dead(&self) -> bool {
        self.position.is_none()
    }

    pub fn set_position(&mut self, position: Position) {
        self.previous_position = self.position;
        self.position = Some(position);
    }

    /// Forget the previous position so stale movement cannot be matched
    pub fn settle(&mut self) {
        self.previous_position = self.position;
    }

    /// Take the tank off the grid and start the respawn countdown
    pub fn kill(&mut self) {
        self.health = 0;
        self.previous_position = None;
        self.position = None;
        self.respawn.start();
    }

    /// Back on the grid with full health
    pub fn respawn_at(&mut self, position: Position, direction: Direction, turret: Direction) {
        self.health = Self::HEALTH_MAX;
        self.position = Some(position);
        self.previous_position = Some(position);
        self.direction = direction;
        self.turret.direction = turret;
        self.respawn.regenerate_full();
    }

    /// True once a dead tank's respawn countdown has finished
    pub fn is_ready_to_respawn(&self) -> bool {
        self.is_dead() && self.respawn.is_ready()
    }

    pub fn same_team(&self, other: &Tank) -> bool {
        matches!((&self.team, &other.team), (Some(a), Some(b)) if a == b)
    }

    pub fn has_ability(&self, kind: AbilityType) -> bool {
        self.abilities.has(kind)
    }
}

impl Regenerable for Tank {
    fn total_regeneration_ticks(&self) -> u32 {
        Self::RESPAWN_TICKS
    }

    fn remaining_regeneration_ticks(&self) -> Option<u32> {
        self.respawn.remaining_regeneration_ticks()
    }

    fn regenerate_tick(&mut self) {
        if self.is_dead() {
            self.respawn.regenerate_tick();
        }
    }

    fn regenerate_full(&mut self) {
        self.respawn.regenerate_full();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn tank() -> Tank {
        Tank::new(
            Uuid::new_v4(),
            Position::new(2, 2),
            Direction::Up,
            Direction::Up,
            AbilitySet::new(Vec::new()),
        )
    }

    #[test]
    fn killed_tank_counts_down_before_respawn() {
        let mut t = tank();
        t.kill();
        assert!(t.is_dead());
        assert_eq!(t.health, 0);
        assert!(!t.is_ready_to_respawn());

        for _ in 0..Tank::RESPAWN_TICKS {
            t.regenerate_tick();
        }
        assert!(t.is_ready_to_respawn());

        t.respawn_at(Position::new(1, 1), Direction::Left, Direction::Down);
        assert_eq!(t.health, Tank::HEALTH_MAX);
        assert_eq!(t.position(), Some(Position::new(1, 1)));
        assert!(!t.is_ready_to_respawn());
    }

    #[test]
    fn set_position_tracks_previous_cell() {
        let mut t = tank();
        t.set_position(Position::new(2, 1));
        assert_eq!(t.previous_position(), Some(Position::new(2, 2)));
        t.settle();
        assert_eq!(t.previous_position(), Some(Position::new(2, 1)));
    }
}
