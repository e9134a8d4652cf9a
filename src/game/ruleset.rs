//! Rule variants selected at start-up
//!
//! Both variants share one simulation. Everything that differs between the
//! free-for-all and the team game is answered by a [`Rules`] implementation.

use serde::{Deserialize, Serialize};

use super::ability::{AbilitySet, AbilityType, SecondaryAbility, SecondaryItemType};
use super::player::Player;
use super::tank::TankType;
use super::zone::Captor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ruleset {
    #[default]
    Solo,
    Team,
}

impl Ruleset {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "solo" => Some(Ruleset::Solo),
            "team" | "teams" => Some(Ruleset::Team),
            _ => None,
        }
    }

    pub fn rules(self) -> &'static dyn Rules {
        match self {
            Ruleset::Solo => &SoloRules,
            Ruleset::Team => &TeamRules,
        }
    }

    pub fn is_team(self) -> bool {
        self == Ruleset::Team
    }

    pub fn name(self) -> &'static str {
        match self {
            Ruleset::Solo => "solo",
            Ruleset::Team => "team",
        }
    }
}

/// Strategy deciding the variant-specific parts of the simulation
pub trait Rules: Send + Sync {
    /// Abilities a freshly spawned tank carries
    fn loadout(&self, kind: Option<TankType>) -> AbilitySet;

    /// Killing blows heal the attacker by the damage dealt
    fn heals_attacker(&self) -> bool;

    /// Mine blasts reach the eight neighbouring cells and chain
    fn mine_splash(&self) -> bool;

    /// Items spawn on the map and can be picked up
    fn items_enabled(&self) -> bool;

    /// Captured zones slowly heal their owner
    fn zone_heals_owner(&self) -> bool;

    fn zone_count(&self) -> usize;

    /// Key used for zone contention and score
    fn captor(&self, player: &Player) -> Captor;
}

pub struct SoloRules;

impl Rules for SoloRules {
    fn loadout(&self, _kind: Option<TankType>) -> AbilitySet {
        AbilitySet::new(vec![
            SecondaryAbility::item_gated(AbilityType::UseLaser, SecondaryItemType::Laser),
            SecondaryAbility::item_gated(
                AbilityType::FireDoubleBullet,
                SecondaryItemType::DoubleBullet,
            ),
            SecondaryAbility::item_gated(AbilityType::UseRadar, SecondaryItemType::Radar),
            SecondaryAbility::item_gated(AbilityType::DropMine, SecondaryItemType::Mine),
        ])
    }

    fn heals_attacker(&self) -> bool {
        true
    }

    fn mine_splash(&self) -> bool {
        false
    }

    fn items_enabled(&self) -> bool {
        true
    }

    fn zone_heals_owner(&self) -> bool {
        true
    }

    fn zone_count(&self) -> usize {
        2
    }

    fn captor(&self, player: &Player) -> Captor {
        Captor::Player(player.id)
    }
}

pub struct TeamRules;

impl TeamRules {
    pub const LASER_TICKS: u32 = 400;
    pub const MINE_TICKS: u32 = 80;
    pub const RADAR_TICKS: u32 = 200;
    pub const STUN_BULLET_TICKS: u32 = 200;
    pub const DOUBLE_BULLET_TICKS: u32 = 200;
}

impl Rules for TeamRules {
    fn loadout(&self, kind: Option<TankType>) -> AbilitySet {
        match kind.unwrap_or(TankType::Light) {
            TankType::Light => AbilitySet::new(vec![
                SecondaryAbility::timed(AbilityType::FireDoubleBullet, Self::DOUBLE_BULLET_TICKS),
                SecondaryAbility::timed(AbilityType::FireStunBullet, Self::STUN_BULLET_TICKS),
                SecondaryAbility::timed(AbilityType::UseRadar, Self::RADAR_TICKS),
            ]),
            TankType::Heavy => AbilitySet::new(vec![
                SecondaryAbility::timed(AbilityType::UseLaser, Self::LASER_TICKS),
                SecondaryAbility::timed(AbilityType::FireStunBullet, Self::STUN_BULLET_TICKS),
                SecondaryAbility::timed(AbilityType::DropMine, Self::MINE_TICKS),
            ]),
        }
    }

    fn heals_attacker(&self) -> bool {
        false
    }

    fn mine_splash(&self) -> bool {
        true
    }

    fn items_enabled(&self) -> bool {
        false
    }

    fn zone_heals_owner(&self) -> bool {
        false
    }

    fn zone_count(&self) -> usize {
        1
    }

    fn captor(&self, player: &Player) -> Captor {
        match &player.team {
            Some(team) => Captor::Team(team.clone()),
            None => Captor::Player(player.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::PlayerKind;
    use uuid::Uuid;

    #[test]
    fn team_loadouts_differ_by_tank_type() {
        let rules = Ruleset::Team.rules();
        let light = rules.loadout(Some(TankType::Light));
        let heavy = rules.loadout(Some(TankType::Heavy));

        assert!(light.has(AbilityType::UseRadar));
        assert!(!light.has(AbilityType::UseLaser));
        assert!(heavy.has(AbilityType::UseLaser));
        assert!(heavy.has(AbilityType::DropMine));
        assert!(light.is_ready(AbilityType::FireStunBullet, None));
    }

    #[test]
    fn solo_abilities_need_items() {
        let set = Ruleset::Solo.rules().loadout(None);
        assert!(!set.is_ready(AbilityType::UseLaser, None));
        assert!(set.is_ready(AbilityType::UseLaser, Some(SecondaryItemType::Laser)));
        assert!(!set.has(AbilityType::FireStunBullet));
    }

    #[test]
    fn captor_follows_ruleset() {
        let mut player = Player::new(Uuid::new_v4(), "A".into(), PlayerKind::Bot, 0);
        player.team = Some("red".into());
        assert_eq!(Ruleset::Solo.rules().captor(&player), Captor::Player(player.id));
        assert_eq!(Ruleset::Team.rules().captor(&player), Captor::Team("red".into()));
        assert_eq!(Ruleset::parse("TEAM"), Some(Ruleset::Team));
    }
}
