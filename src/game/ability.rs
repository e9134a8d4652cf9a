//! Tank abilities and their regeneration counters
//!
//! Every ability exposes the same regeneration contract through [`Regenerable`].
//! Progress is never stored, it is derived from the remaining and total ticks.

use serde::{Deserialize, Serialize};

/// Ability a player can request through an `abilityUse` packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbilityType {
    FireBullet = 0,
    UseLaser = 1,
    FireDoubleBullet = 2,
    UseRadar = 3,
    DropMine = 4,
    FireStunBullet = 5,
}

impl AbilityType {
    pub const ALL: [AbilityType; 6] = [
        AbilityType::FireBullet,
        AbilityType::UseLaser,
        AbilityType::FireDoubleBullet,
        AbilityType::UseRadar,
        AbilityType::DropMine,
        AbilityType::FireStunBullet,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Item that unlocks this ability under item-gated rules
    pub fn required_item(self) -> Option<SecondaryItemType> {
        match self {
            AbilityType::UseLaser => Some(SecondaryItemType::Laser),
            AbilityType::FireDoubleBullet => Some(SecondaryItemType::DoubleBullet),
            AbilityType::UseRadar => Some(SecondaryItemType::Radar),
            AbilityType::DropMine => Some(SecondaryItemType::Mine),
            AbilityType::FireBullet | AbilityType::FireStunBullet => None,
        }
    }
}

/// Pickup lying on the map, held by at most one tank at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecondaryItemType {
    Laser = 1,
    DoubleBullet = 2,
    Radar = 3,
    Mine = 4,
}

impl SecondaryItemType {
    pub const ALL: [SecondaryItemType; 4] = [
        SecondaryItemType::Laser,
        SecondaryItemType::DoubleBullet,
        SecondaryItemType::Radar,
        SecondaryItemType::Mine,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u8 == index)
    }
}

/// Uniform regeneration contract shared by abilities and tank respawn
pub trait Regenerable {
    fn total_regeneration_ticks(&self) -> u32;

    /// `None` means fully charged
    fn remaining_regeneration_ticks(&self) -> Option<u32>;

    fn regenerate_tick(&mut self);

    fn regenerate_full(&mut self);

    /// `1 - remaining / total`, `None` once fully regenerated
    fn regeneration_progress(&self) -> Option<f32> {
        let total = self.total_regeneration_ticks();
        self.remaining_regeneration_ticks().map(|remaining| {
            if total == 0 {
                1.0
            } else {
                1.0 - remaining as f32 / total as f32
            }
        })
    }
}

/// Countdown that is `None` when ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    total: u32,
    remaining: Option<u32>,
}

impl Cooldown {
    pub const fn ready(total: u32) -> Self {
        Self {
            total,
            remaining: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.remaining.is_none()
    }

    pub fn start(&mut self) {
        self.remaining = (self.total > 0).then_some(self.total);
    }
}

impl Regenerable for Cooldown {
    fn total_regeneration_ticks(&self) -> u32 {
        self.total
    }

    fn remaining_regeneration_ticks(&self) -> Option<u32> {
        self.remaining
    }

    fn regenerate_tick(&mut self) {
        if let Some(remaining) = self.remaining {
            let remaining = remaining.saturating_sub(1);
            self.remaining = (remaining > 0).then_some(remaining);
        }
    }

    fn regenerate_full(&mut self) {
        self.remaining = None;
    }
}

/// Basic cannon with a small magazine refilled one shell at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulletAbility {
    count: u32,
    cooldown: Cooldown,
}

impl BulletAbility {
    pub const MAX_BULLETS: u32 = 3;
    pub const REGENERATION_TICKS: u32 = 10;

    pub fn new() -> Self {
        Self {
            count: Self::MAX_BULLETS,
            cooldown: Cooldown::ready(Self::REGENERATION_TICKS),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn has_ammo(&self) -> bool {
        self.count > 0
    }

    pub fn consume(&mut self) {
        self.count = self.count.saturating_sub(1);
        self.cooldown.start();
    }
}

impl Default for BulletAbility {
    fn default() -> Self {
        Self::new()
    }
}

impl Regenerable for BulletAbility {
    fn total_regeneration_ticks(&self) -> u32 {
        Self::REGENERATION_TICKS
    }

    fn remaining_regeneration_ticks(&self) -> Option<u32> {
        self.cooldown.remaining
    }

    fn regenerate_tick(&mut self) {
        if self.count >= Self::MAX_BULLETS {
            self.cooldown.regenerate_full();
            return;
        }

        self.cooldown.regenerate_tick();
        if self.cooldown.is_ready() {
            self.count += 1;
            if self.count < Self::MAX_BULLETS {
                self.cooldown.start();
            }
        }
    }

    fn regenerate_full(&mut self) {
        self.count = Self::MAX_BULLETS;
        self.cooldown.regenerate_full();
    }
}

/// How a secondary ability becomes usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Charge {
    /// Recharges on its own after each use
    Cooldown(Cooldown),
    /// Usable while the tank holds the matching item, consuming it
    Item(SecondaryItemType),
}

/// Any ability other than the basic cannon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryAbility {
    pub kind: AbilityType,
    pub charge: Charge,
}

impl SecondaryAbility {
    pub fn timed(kind: AbilityType, total_ticks: u32) -> Self {
        Self {
            kind,
            charge: Charge::Cooldown(Cooldown::ready(total_ticks)),
        }
    }

    pub fn item_gated(kind: AbilityType, item: SecondaryItemType) -> Self {
        Self {
            kind,
            charge: Charge::Item(item),
        }
    }

    pub fn is_ready(&self, held: Option<SecondaryItemType>) -> bool {
        match &self.charge {
            Charge::Cooldown(cooldown) => cooldown.is_ready(),
            Charge::Item(item) => held == Some(*item),
        }
    }

    /// Starts the cooldown. Returns true when the held item is spent.
    pub fn consume(&mut self) -> bool {
        match &mut self.charge {
            Charge::Cooldown(cooldown) => {
                cooldown.start();
                false
            }
            Charge::Item(_) => true,
        }
    }
}

impl Regenerable for SecondaryAbility {
    fn total_regeneration_ticks(&self) -> u32 {
        match &self.charge {
            Charge::Cooldown(c) => c.total_regeneration_ticks(),
            Charge::Item(_) => 0,
        }
    }

    fn remaining_regeneration_ticks(&self) -> Option<u32> {
        match &self.charge {
            Charge::Cooldown(c) => c.remaining_regeneration_ticks(),
            Charge::Item(_) => None,
        }
    }

    fn regenerate_tick(&mut self) {
        if let Charge::Cooldown(c) = &mut self.charge {
            c.regenerate_tick();
        }
    }

    fn regenerate_full(&mut self) {
        if let Charge::Cooldown(c) = &mut self.charge {
            c.regenerate_full();
        }
    }
}

/// The full loadout carried by one tank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilitySet {
    pub bullet: BulletAbility,
    pub secondary: Vec<SecondaryAbility>,
    radar_active: bool,
}

impl AbilitySet {
    pub fn new(secondary: Vec<SecondaryAbility>) -> Self {
        Self {
            bullet: BulletAbility::new(),
            secondary,
            radar_active: false,
        }
    }

    pub fn has(&self, kind: AbilityType) -> bool {
        kind == AbilityType::FireBullet || self.get(kind).is_some()
    }

    pub fn get(&self, kind: AbilityType) -> Option<&SecondaryAbility> {
        self.secondary.iter().find(|a| a.kind == kind)
    }

    pub fn get_mut(&mut self, kind: AbilityType) -> Option<&mut SecondaryAbility> {
        self.secondary.iter_mut().find(|a| a.kind == kind)
    }

    /// Resource-side readiness, ignoring liveness and stuns
    pub fn is_ready(&self, kind: AbilityType, held: Option<SecondaryItemType>) -> bool {
        match kind {
            AbilityType::FireBullet => self.bullet.has_ammo(),
            other => self.get(other).is_some_and(|a| a.is_ready(held)),
        }
    }

    /// Spend the ability. Returns true if the held item must be dropped.
    pub fn consume(&mut self, kind: AbilityType) -> bool {
        match kind {
            AbilityType::FireBullet => {
                self.bullet.consume();
                false
            }
            other => self.get_mut(other).is_some_and(|a| a.consume()),
        }
    }

    pub fn regenerate_tick(&mut self) {
        self.bullet.regenerate_tick();
        for ability in &mut self.secondary {
            ability.regenerate_tick();
        }
    }

    pub fn regenerate_full(&mut self, kind: AbilityType) {
        match kind {
            AbilityType::FireBullet => self.bullet.regenerate_full(),
            other => {
                if let Some(a) = self.get_mut(other) {
                    a.regenerate_full();
                }
            }
        }
    }

    pub fn remaining_ticks(&self, kind: AbilityType) -> Option<u32> {
        match kind {
            AbilityType::FireBullet => self.bullet.remaining_regeneration_ticks(),
            other => self.get(other).and_then(|a| a.remaining_regeneration_ticks()),
        }
    }

    pub fn radar_active(&self) -> bool {
        self.radar_active
    }

    pub fn set_radar_active(&mut self, active: bool) {
        self.radar_active = active;
    }
}
