//! Healing with fractional accumulation

use std::collections::HashMap;

use crate::game::player::PlayerId;
use crate::game::tank::Tank;

/// Sub-point heals are buffered per tank until they add up to one point
#[derive(Debug, Default)]
pub struct HealSystem {
    fractional: HashMap<PlayerId, f32>,
}

impl HealSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heal whole points, capped at full health. Dead tanks are ignored.
    pub fn heal(tank: &mut Tank, points: i32) {
        if tank.is_dead() || points <= 0 {
            return;
        }
        tank.health = (tank.health + points).clamp(0, Tank::HEALTH_MAX);
    }

    pub fn heal_fractional(&mut self, tank: &mut Tank, points: f32) {
        if tank.is_dead() || points <= 0.0 {
            return;
        }
        let buffer = self.fractional.entry(tank.owner).or_insert(0.0);
        *buffer += points;

        let whole = buffer.trunc();
        if whole >= 1.0 {
            *buffer -= whole;
            Self::heal(tank, whole as i32);
        }
    }

    pub fn forget(&mut self, owner: PlayerId) {
        self.fractional.remove(&owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ability::AbilitySet;
    use crate::game::direction::{Direction, Position};
    use uuid::Uuid;

    #[test]
    fn quarter_points_heal_every_fourth_call() {
        let mut tank = Tank::new(
            Uuid::new_v4(),
            Position::new(0, 0),
            Direction::Up,
            Direction::Up,
            AbilitySet::new(Vec::new()),
        );
        tank.health = 50;
        let mut heal = HealSystem::new();

        for _ in 0..3 {
            heal.heal_fractional(&mut tank, 0.25);
        }
        assert_eq!(tank.health, 50);
        heal.heal_fractional(&mut tank, 0.25);
        assert_eq!(tank.health, 51);

        HealSystem::heal(&mut tank, 500);
        assert_eq!(tank.health, Tank::HEALTH_MAX);
    }
}
