//! The simulation root
//!
//! [`World`] owns the grid, the roster and every stateful system. Only the
//! match loop holds one, so nothing in here needs locking.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::action::{Action, ActionError};
use super::ability::AbilityType;
use super::entity::Bullet;
use super::events::GameEvent;
use super::grid::Grid;
use super::pathfinding::{PathAction, PathFinder};
use super::player::{Player, PlayerId, Team};
use super::ruleset::{Rules, Ruleset};
use super::systems::{
    AbilitySystem, BulletSystem, DespawnSystem, HealSystem, ItemSystem, LaserSystem,
    MapGenerator, MineSystem, MovementSystem, RegenSystem, ScoreSystem, SpawnSystem, StunSystem,
    VisibilityGrid, VisibilitySystem, ZoneSystem,
};
use super::zone::Captor;

use crate::game::direction::{MovementDirection, Rotation};

pub struct World {
    pub grid: Grid,
    pub players: Vec<Player>,
    pub teams: Vec<Team>,
    pub stuns: StunSystem,
    pub heal: HealSystem,
    pub score: ScoreSystem,
    pub visibility: VisibilitySystem,
    /// Fired this tick, inserted after the first collision pass
    pub(crate) pending_bullets: Vec<Bullet>,
    ruleset: Ruleset,
    rng: ChaCha8Rng,
    seed: u64,
    tick: u64,
    events: Vec<GameEvent>,
}

impl World {
    /// Generate a seeded map for the ruleset
    pub fn generate(dim: usize, ruleset: Ruleset, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut generator = MapGenerator::new(dim, &mut rng);
        let zones = generator.generate_zones(ruleset.rules().zone_count());
        let walls = generator.generate_walls(&zones);
        let grid = Grid::with_layout(dim, walls, zones);
        Self::from_parts(grid, ruleset, seed, rng)
    }

    /// Use a prepared grid as is
    pub fn with_grid(grid: Grid, ruleset: Ruleset, seed: u64) -> Self {
        Self::from_parts(grid, ruleset, seed, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_parts(grid: Grid, ruleset: Ruleset, seed: u64, rng: ChaCha8Rng) -> Self {
        let dim = grid.dim();
        Self {
            grid,
            players: Vec::new(),
            teams: Vec::new(),
            stuns: StunSystem::new(),
            heal: HealSystem::new(),
            score: ScoreSystem::new(),
            visibility: VisibilitySystem::new(dim),
            pending_bullets: Vec::new(),
            ruleset,
            rng,
            seed,
            tick: 0,
            events: Vec::new(),
        }
    }

    pub fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    pub fn rules(&self) -> &'static dyn Rules {
        self.ruleset.rules()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    /// Zone and score key of a player under the active rules
    pub fn captor_of(&self, id: PlayerId) -> Option<Captor> {
        self.player(id).map(|p| self.rules().captor(p))
    }

    /// True when both players are on the same team
    pub fn same_team(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.player(a), self.player(b)) {
            (Some(a), Some(b)) => a.team.is_some() && a.team == b.team,
            _ => false,
        }
    }

    /// What the player is shown this tick: everything while their radar is
    /// up, the team's combined sight under team rules, their own otherwise.
    pub fn view_of(&self, id: PlayerId) -> VisibilityGrid {
        let radar = self
            .grid
            .tank(id)
            .is_some_and(|t| !t.is_dead() && t.abilities.radar_active());
        if radar {
            return VisibilityGrid::full(self.grid.dim());
        }

        let team = self
            .player(id)
            .and_then(|p| p.team.as_deref())
            .and_then(|name| self.team(name));
        match team {
            Some(team) if self.ruleset.is_team() => self.visibility.team_view(&team.members),
            _ => self.visibility.view(id),
        }
    }

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Add a player and spawn their tank. Team membership must already be
    /// set on the player.
    pub fn add_player(&mut self, player: Player) {
        if let Some(team) = &player.team {
            match self.teams.iter_mut().find(|t| &t.name == team) {
                Some(t) => t.members.push(player.id),
                None => {
                    let mut t = Team::new(team.clone(), player.color);
                    t.members.push(player.id);
                    self.teams.push(t);
                }
            }
        }
        let id = player.id;
        let team = player.team.clone();
        let kind = player.tank_type;
        self.players.push(player);
        SpawnSystem::spawn_tank(self, id, team, kind);
    }

    /// Drop the player, their tank and everything they own
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        DespawnSystem::remove_tank(self, id);
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);

        if let Some(team) = &player.team {
            if let Some(t) = self.teams.iter_mut().find(|t| &t.name == team) {
                t.members.retain(|m| *m != id);
            }
        }
        Some(player)
    }

    /// Award whole points to the player's score recipient
    pub fn award_score(&mut self, id: PlayerId, points: i32) {
        if points <= 0 {
            return;
        }
        if let Some(to) = self.captor_of(id) {
            ScoreSystem::award(&mut self.players, &mut self.teams, &to, i64::from(points));
        }
    }

    pub fn award_fractional_score(&mut self, to: &Captor, points: f32) {
        self.score
            .award_fractional(&mut self.players, &mut self.teams, to, points);
    }

    pub fn heal_tank(&mut self, id: PlayerId, points: i32) {
        if let Some(tank) = self.grid.tank_mut(id) {
            HealSystem::heal(tank, points);
        }
    }

    pub fn heal_tank_fractional(&mut self, id: PlayerId, points: f32) {
        if let Some(tank) = self.grid.tank_mut(id) {
            self.heal.heal_fractional(tank, points);
        }
    }

    /// Validate and apply one player intent
    pub fn apply_action(&mut self, id: PlayerId, action: Action) -> Result<(), ActionError> {
        let tank = self.grid.tank(id).ok_or(ActionError::UnknownPlayer(id))?;
        if action.is_pass() {
            return Ok(());
        }
        if tank.is_dead() {
            return Err(ActionError::TankDead);
        }

        match action {
            Action::Pass => {}
            Action::Move(direction) => MovementSystem::move_tank(self, id, direction),
            Action::Rotate { tank, turret } => MovementSystem::rotate(self, id, tank, turret),
            Action::UseAbility(kind) => {
                AbilitySystem::use_ability(self, id, kind);
            }
            Action::ChargeAbility(kind) => self.charge_ability(id, kind),
            Action::GoTo(request) => {
                let target = request.target();
                if !self.grid.in_bounds(target) {
                    return Err(ActionError::TargetOutOfBounds {
                        x: target.x,
                        y: target.y,
                    });
                }
                if self.grid.is_wall(target) {
                    return Err(ActionError::TargetIsWall {
                        x: target.x,
                        y: target.y,
                    });
                }

                let next = PathFinder::new(self, id).and_then(|finder| finder.next_action(&request));
                debug!(player_id = %id, ?next, x = target.x, y = target.y, "goto resolved");
                match next {
                    Some(PathAction::MoveForward) => {
                        MovementSystem::move_tank(self, id, MovementDirection::Forward)
                    }
                    Some(PathAction::MoveBackward) => {
                        MovementSystem::move_tank(self, id, MovementDirection::Backward)
                    }
                    Some(PathAction::RotateLeft) => MovementSystem::rotate(
                        self,
                        id,
                        Some(Rotation::Left),
                        request.turret_rotation,
                    ),
                    Some(PathAction::RotateRight) => MovementSystem::rotate(
                        self,
                        id,
                        Some(Rotation::Right),
                        request.turret_rotation,
                    ),
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn charge_ability(&mut self, id: PlayerId, kind: AbilityType) {
        if let Some(tank) = self.grid.tank_mut(id) {
            tank.abilities.regenerate_full(kind);
        }
    }

    /// Advance the simulation by one tick
    pub fn update(&mut self, delta: f32) {
        self.tick += 1;

        BulletSystem::update(self, delta);
        LaserSystem::update(self);
        MineSystem::update(self);
        self.stuns.update();
        RegenSystem::update(self);
        self.visibility.update(&self.grid);
        ZoneSystem::update(self);
        if self.rules().items_enabled() {
            ItemSystem::update(self);
        }

        for tank in &mut self.grid.tanks {
            tank.settle();
        }
    }

    /// Clear per-tick flags once the state has been broadcast
    pub fn reset_tick_properties(&mut self) {
        for tank in &mut self.grid.tanks {
            tank.abilities.set_radar_active(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::direction::{Direction, Position};
    use crate::game::player::PlayerKind;
    use uuid::Uuid;

    pub(crate) fn open_world(dim: usize, ruleset: Ruleset) -> World {
        World::with_grid(Grid::new(dim), ruleset, 7)
    }

    pub(crate) fn place(world: &mut World, at: Position, facing: Direction) -> PlayerId {
        let id = Uuid::new_v4();
        let index = world.players.len();
        world.add_player(Player::new(
            id,
            format!("P{index}"),
            PlayerKind::Bot,
            crate::game::player::color_for(index),
        ));
        let tank = world.grid.tank_mut(id).expect("tank spawned");
        tank.respawn_at(at, facing, facing);
        id
    }

    #[test]
    fn bullet_hits_tank_three_cells_away_on_second_tick() {
        let mut world = open_world(20, Ruleset::Solo);
        let shooter = place(&mut world, Position::new(2, 5), Direction::Right);
        let target = place(&mut world, Position::new(5, 5), Direction::Left);

        world
            .apply_action(shooter, Action::UseAbility(AbilityType::FireBullet))
            .unwrap();
        world.update(1.0);
        assert_eq!(world.grid.tank(target).unwrap().health, 100);
        assert_eq!(world.grid.bullets.len(), 1);

        world.update(1.0);
        assert_eq!(world.tick(), 2);
        assert_eq!(world.grid.tank(target).unwrap().health, 80);
        assert!(world.grid.bullets.is_empty());
        assert_eq!(world.player(shooter).unwrap().score, 10);
    }

    #[test]
    fn dead_tank_only_accepts_pass() {
        let mut world = open_world(10, Ruleset::Solo);
        let id = place(&mut world, Position::new(1, 1), Direction::Up);
        world.grid.tank_mut(id).unwrap().kill();

        assert_eq!(world.apply_action(id, Action::Pass), Ok(()));
        assert_eq!(
            world.apply_action(id, Action::Move(MovementDirection::Forward)),
            Err(ActionError::TankDead)
        );
    }

    #[test]
    fn dead_tank_respawns_after_countdown() {
        let mut world = open_world(10, Ruleset::Solo);
        let id = place(&mut world, Position::new(1, 1), Direction::Up);
        world.grid.tank_mut(id).unwrap().kill();

        for _ in 0..crate::game::tank::Tank::RESPAWN_TICKS {
            world.update(1.0);
        }
        let tank = world.grid.tank(id).unwrap();
        assert!(!tank.is_dead());
        assert_eq!(tank.health, crate::game::tank::Tank::HEALTH_MAX);
        assert!(world
            .drain_events()
            .iter()
            .any(|e| matches!(e, GameEvent::TankRespawned { player_id, .. } if *player_id == id)));
    }

    #[test]
    fn goto_rejects_walls_and_out_of_bounds() {
        let mut grid = Grid::new(6);
        grid.set_wall(Position::new(3, 3), true);
        let mut world = World::with_grid(grid, Ruleset::Team, 1);
        let id = place(&mut world, Position::new(0, 0), Direction::Down);

        let err = world
            .apply_action(id, Action::GoTo(crate::game::pathfinding::GoToRequest::new(3, 3)))
            .unwrap_err();
        assert_eq!(err, ActionError::TargetIsWall { x: 3, y: 3 });

        let err = world
            .apply_action(id, Action::GoTo(crate::game::pathfinding::GoToRequest::new(9, 0)))
            .unwrap_err();
        assert_eq!(err, ActionError::TargetOutOfBounds { x: 9, y: 0 });
    }

    #[test]
    fn removing_player_clears_owned_entities() {
        let mut world = open_world(10, Ruleset::Solo);
        let id = place(&mut world, Position::new(4, 4), Direction::Up);
        world
            .apply_action(id, Action::UseAbility(AbilityType::FireBullet))
            .unwrap();
        world.update(1.0);
        assert_eq!(world.grid.bullets.len(), 1);

        let removed = world.remove_player(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(world.grid.tank(id).is_none());
        assert!(world.grid.bullets.is_empty());
    }
}
