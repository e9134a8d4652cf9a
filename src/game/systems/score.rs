//! Score accounting for players and teams

use std::collections::HashMap;

use crate::game::player::{Player, Team};
use crate::game::zone::Captor;

/// Whole-point awards go straight to the recipient, fractional awards are
/// buffered until they add up to a point.
#[derive(Debug, Default)]
pub struct ScoreSystem {
    fractional: HashMap<Captor, f32>,
}

impl ScoreSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn award(players: &mut [Player], teams: &mut [Team], to: &Captor, points: i64) {
        if points <= 0 {
            return;
        }
        match to {
            Captor::Player(id) => {
                if let Some(player) = players.iter_mut().find(|p| p.id == *id) {
                    player.score += points;
                }
            }
            Captor::Team(name) => {
                if let Some(team) = teams.iter_mut().find(|t| &t.name == name) {
                    team.score += points;
                }
            }
        }
    }

    pub fn award_fractional(
        &mut self,
        players: &mut [Player],
        teams: &mut [Team],
        to: &Captor,
        points: f32,
    ) {
        if points <= 0.0 {
            return;
        }
        let buffer = self.fractional.entry(to.clone()).or_insert(0.0);
        *buffer += points;

        let whole = buffer.trunc();
        if whole >= 1.0 {
            *buffer -= whole;
            Self::award(players, teams, to, whole as i64);
        }
    }

    pub fn forget(&mut self, recipient: &Captor) {
        self.fractional.remove(recipient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::PlayerKind;
    use uuid::Uuid;

    #[test]
    fn half_points_accumulate_per_recipient() {
        let id = Uuid::new_v4();
        let mut players = vec![Player::new(id, "A".into(), PlayerKind::Human, 0)];
        let mut teams = vec![Team::new("red".into(), 0)];
        let mut score = ScoreSystem::new();
        let player = Captor::Player(id);
        let team = Captor::Team("red".into());

        score.award_fractional(&mut players, &mut teams, &player, 0.5);
        score.award_fractional(&mut players, &mut teams, &team, 0.5);
        assert_eq!(players[0].score, 0);

        score.award_fractional(&mut players, &mut teams, &player, 0.5);
        assert_eq!(players[0].score, 1);
        assert_eq!(teams[0].score, 0);

        ScoreSystem::award(&mut players, &mut teams, &team, 7);
        assert_eq!(teams[0].score, 7);
    }
}
