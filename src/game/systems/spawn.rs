//! Tank placement and removal

use rand::Rng;
use tracing::warn;

use super::{ItemSystem, ZoneSystem};
use crate::game::direction::{Direction, Position};
use crate::game::player::PlayerId;
use crate::game::tank::{Tank, TankType};
use crate::game::world::World;
use crate::game::zone::Captor;

const SPAWN_ATTEMPTS: usize = 1000;

pub struct SpawnSystem;

impl SpawnSystem {
    /// Random empty cell outside every zone and out of every tank's sight.
    /// Falls back to any passable cell when the random search fails.
    pub fn free_position(world: &mut World) -> Option<Position> {
        let dim = world.grid.dim() as i32;
        for _ in 0..SPAWN_ATTEMPTS {
            let cell = Position::new(world.rng().gen_range(0..dim), world.rng().gen_range(0..dim));
            if world.grid.is_empty_cell(cell)
                && world.grid.zone_at(cell).is_none()
                && !world.visibility.is_visible_by_any(cell)
            {
                return Some(cell);
            }
        }

        warn!(attempts = SPAWN_ATTEMPTS, "no hidden spawn cell found, using any free cell");
        (0..dim)
            .flat_map(|y| (0..dim).map(move |x| Position::new(x, y)))
            .find(|&cell| world.grid.is_passable(cell))
    }

    fn random_direction(world: &mut World) -> Direction {
        Direction::ALL[world.rng().gen_range(0..Direction::ALL.len())]
    }

    pub fn spawn_tank(
        world: &mut World,
        owner: PlayerId,
        team: Option<String>,
        kind: Option<TankType>,
    ) {
        let Some(position) = Self::free_position(world) else {
            warn!(player_id = %owner, "arena is full, tank not placed");
            return;
        };
        let direction = Self::random_direction(world);
        let turret = Self::random_direction(world);
        let abilities = world.rules().loadout(kind);
        let tank = Tank::new(owner, position, direction, turret, abilities).with_team(team, kind);
        world.grid.tanks.push(tank);
    }

    /// Put a dead tank back on the grid
    pub fn respawn(world: &mut World, owner: PlayerId) -> Option<Position> {
        let position = Self::free_position(world)?;
        let direction = Self::random_direction(world);
        let turret = Self::random_direction(world);
        let tank = world.grid.tank_mut(owner)?;
        tank.respawn_at(position, direction, turret);
        Some(position)
    }
}

pub struct DespawnSystem;

impl DespawnSystem {
    /// Remove the tank and everything it left behind
    pub fn remove_tank(world: &mut World, owner: PlayerId) {
        let Some(index) = world.grid.tanks.iter().position(|t| t.owner == owner) else {
            return;
        };
        let mut tank = world.grid.tanks.remove(index);

        if let (Some(item), Some(at)) = (tank.secondary_item.take(), tank.position()) {
            ItemSystem::drop_near(&mut world.grid, item, at);
        }
        world.heal.forget(owner);
        world.stuns.clear(owner);
        world.visibility.forget(owner);

        // in team play the team keeps its zones while a member remains
        let captor = match &tank.team {
            Some(team) if world.ruleset().is_team() => {
                let members_left = world
                    .grid
                    .tanks
                    .iter()
                    .any(|t| t.team.as_deref() == Some(team.as_str()));
                (!members_left).then(|| Captor::Team(team.clone()))
            }
            _ => Some(Captor::Player(owner)),
        };
        if let Some(captor) = captor {
            world.score.forget(&captor);
            ZoneSystem::remove_captor(world, &captor);
        }

        world.grid.bullets.retain(|b| b.shooter != Some(owner));
        world.grid.lasers.retain(|l| l.shooter != Some(owner));
        world.grid.mines.retain(|m| m.layer != Some(owner));
        world.pending_bullets.retain(|b| b.shooter != Some(owner));
    }
}
