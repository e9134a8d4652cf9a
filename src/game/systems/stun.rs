//! Timed action blocks

use std::collections::HashMap;
use std::ops::BitOr;

use crate::game::player::PlayerId;

/// Set of blocked action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StunEffect(u8);

impl StunEffect {
    pub const NONE: StunEffect = StunEffect(0);
    pub const MOVEMENT: StunEffect = StunEffect(1);
    pub const TANK_ROTATION: StunEffect = StunEffect(2);
    pub const TURRET_ROTATION: StunEffect = StunEffect(4);
    pub const ABILITY_USE: StunEffect = StunEffect(8);
    pub const ALL: StunEffect = StunEffect(15);

    pub fn intersects(self, other: StunEffect) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StunEffect {
    type Output = StunEffect;

    fn bitor(self, rhs: Self) -> Self::Output {
        StunEffect(self.0 | rhs.0)
    }
}

/// Active stuns per player
#[derive(Debug, Default)]
pub struct StunSystem {
    stuns: HashMap<PlayerId, Vec<(StunEffect, u32)>>,
}

impl StunSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-applying an effect keeps the longer of the two durations
    pub fn apply(&mut self, target: PlayerId, effect: StunEffect, ticks: u32) {
        if effect.is_none() || ticks == 0 {
            return;
        }
        let effects = self.stuns.entry(target).or_default();
        match effects.iter_mut().find(|(e, _)| *e == effect) {
            Some((_, remaining)) => *remaining = (*remaining).max(ticks),
            None => effects.push((effect, ticks)),
        }
    }

    pub fn update(&mut self) {
        for effects in self.stuns.values_mut() {
            for (_, remaining) in effects.iter_mut() {
                *remaining = remaining.saturating_sub(1);
            }
            effects.retain(|(_, remaining)| *remaining > 0);
        }
        self.stuns.retain(|_, effects| !effects.is_empty());
    }

    pub fn is_blocked(&self, target: PlayerId, effect: StunEffect) -> bool {
        self.stuns
            .get(&target)
            .is_some_and(|effects| effects.iter().any(|(e, _)| e.intersects(effect)))
    }

    pub fn clear(&mut self, target: PlayerId) {
        self.stuns.remove(&target);
    }
}
