//! Mines: dropping, triggering and blast aftermath

use std::collections::HashSet;

use super::{DamageSystem, StunEffect};
use crate::game::direction::Position;
use crate::game::entity::Mine;
use crate::game::events::GameEvent;
use crate::game::player::PlayerId;
use crate::game::world::World;

/// Ticks a blast blocks the victim's movement and hull rotation
pub const MINE_STUN_TICKS: u32 = 10;

/// Splash multipliers for the neighbouring cells under team rules
pub const ORTHOGONAL_SPLASH: f32 = 0.7;
pub const DIAGONAL_SPLASH: f32 = 0.45;

pub struct MineSystem;

impl MineSystem {
    /// Place a mine one cell behind the tank
    pub fn drop(world: &mut World, layer: PlayerId) -> Option<u32> {
        let tank = world.grid.tank(layer)?;
        let position = tank.position()?.step(tank.direction, -1);

        let id = world.grid.next_entity_id();
        world.grid.mines.push(Mine::new(id, position, Some(layer)));
        world.emit(GameEvent::MineDropped {
            tick: world.tick(),
            mine_id: id,
            layer,
            position,
        });
        Some(id)
    }

    /// Detonate every armed mine on the cell
    pub fn explode_at(world: &mut World, cell: Position) {
        let armed: Vec<u32> = world
            .grid
            .mines
            .iter()
            .filter(|m| m.position == cell && !m.is_exploded())
            .map(|m| m.id)
            .collect();
        for id in armed {
            Self::explode(world, id);
        }
    }

    pub fn update(world: &mut World) {
        // only mines marked before this pass may chain now
        let chained: HashSet<u32> = world
            .grid
            .mines
            .iter()
            .filter(|m| m.explode_next_tick)
            .map(|m| m.id)
            .collect();

        let ids: Vec<u32> = world.grid.mines.iter().map(|m| m.id).collect();
        for id in ids {
            let Some(mine) = world.grid.mines.iter().find(|m| m.id == id) else {
                continue;
            };
            let (position, exploded, spent) =
                (mine.position, mine.is_exploded(), mine.is_fully_exploded());

            if !world.grid.in_bounds(position) || world.grid.is_wall(position) || spent {
                world.grid.mines.retain(|m| m.id != id);
                continue;
            }

            if exploded {
                if let Some(mine) = world.grid.mines.iter_mut().find(|m| m.id == id) {
                    mine.explosion_remaining_ticks =
                        mine.explosion_remaining_ticks.map(|t| t.saturating_sub(1));
                }
            } else if chained.contains(&id) || world.grid.tank_at(position).is_some() {
                Self::explode(world, id);
            }
        }

        Self::dedup(world);
    }

    /// Keep only the most recently placed mine per cell
    fn dedup(world: &mut World) {
        let mut seen = HashSet::new();
        let mut keep = HashSet::new();
        for mine in world.grid.mines.iter().rev() {
            if seen.insert(mine.position) {
                keep.insert(mine.id);
            }
        }
        world.grid.mines.retain(|m| keep.contains(&m.id));
    }

    fn explode(world: &mut World, id: u32) {
        let Some(mine) = world.grid.mines.iter_mut().find(|m| m.id == id) else {
            return;
        };
        mine.explosion_remaining_ticks = Some(Mine::EXPLOSION_TICKS);
        mine.explode_next_tick = false;
        let (position, damage, layer) = (mine.position, mine.damage, mine.layer);

        let victim = world.grid.tank_at(position).map(|t| t.owner);
        world.emit(GameEvent::MineExploded {
            tick: world.tick(),
            mine_id: id,
            position,
            victim,
        });
        if let Some(victim) = victim {
            Self::hit(world, victim, damage, layer);
        }

        if !world.rules().mine_splash() {
            return;
        }
        for (dx, dy) in NEIGHBOURS {
            let cell = Position::new(position.x + dx, position.y + dy);
            let multiplier = if dx == 0 || dy == 0 {
                ORTHOGONAL_SPLASH
            } else {
                DIAGONAL_SPLASH
            };
            if let Some(victim) = world.grid.tank_at(cell).map(|t| t.owner) {
                Self::hit(world, victim, (damage as f32 * multiplier).round() as i32, layer);
            }
            // chained mines go off on the next update, never in this pass
            for mine in world.grid.mines.iter_mut() {
                if mine.position == cell && !mine.is_exploded() {
                    mine.explode_next_tick = true;
                }
            }
        }
    }

    fn hit(world: &mut World, victim: PlayerId, damage: i32, layer: Option<PlayerId>) {
        let suicide = layer == Some(victim);
        let source = if suicide { None } else { layer };
        let dealt = DamageSystem::apply(world, victim, damage, source);

        if let Some(layer) = source {
            if !world.same_team(layer, victim) {
                world.award_score(layer, dealt);
            }
        }
        if world.grid.tank(victim).is_some_and(|t| !t.is_dead()) {
            world.stuns.apply(
                victim,
                StunEffect::MOVEMENT | StunEffect::TANK_ROTATION,
                MINE_STUN_TICKS,
            );
        }
    }
}

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ability::AbilityType;
    use crate::game::action::Action;
    use crate::game::direction::{Direction, MovementDirection};
    use crate::game::grid::Grid;
    use crate::game::player::{Player, PlayerKind};
    use crate::game::ruleset::Ruleset;
    use uuid::Uuid;

    fn spawn(world: &mut World, at: Position, facing: Direction) -> PlayerId {
        let id = Uuid::new_v4();
        world.add_player(Player::new(id, "M".into(), PlayerKind::Bot, 0));
        world
            .grid
            .tank_mut(id)
            .unwrap()
            .respawn_at(at, facing, facing);
        id
    }

    #[test]
    fn driving_onto_own_mine_is_no_kill_and_no_score() {
        let mut world = World::with_grid(Grid::new(10), Ruleset::Solo, 1);
        let layer = spawn(&mut world, Position::new(5, 5), Direction::Up);
        world.grid.tank_mut(layer).unwrap().health = 40;

        assert!(MineSystem::drop(&mut world, layer).is_some());
        assert_eq!(world.grid.mines[0].position, Position::new(5, 6));

        world
            .apply_action(layer, Action::Move(MovementDirection::Backward))
            .unwrap();
        world.update(1.0);

        let player = world.player(layer).unwrap();
        assert!(world.grid.tank(layer).unwrap().is_dead());
        assert_eq!(player.kills, 0);
        assert_eq!(player.score, 0);
    }

    #[test]
    fn enemy_mine_scores_and_stuns() {
        let mut world = World::with_grid(Grid::new(10), Ruleset::Solo, 1);
        let layer = spawn(&mut world, Position::new(1, 1), Direction::Up);
        let victim = spawn(&mut world, Position::new(4, 4), Direction::Up);
        world.grid.mines.push(Mine::new(77, Position::new(4, 4), Some(layer)));

        MineSystem::update(&mut world);

        assert_eq!(world.grid.tank(victim).unwrap().health, 50);
        assert_eq!(world.player(layer).unwrap().score, 50);
        assert!(world.stuns.is_blocked(victim, StunEffect::MOVEMENT));
        assert!(world.stuns.is_blocked(victim, StunEffect::TANK_ROTATION));
        assert!(!world.stuns.is_blocked(victim, StunEffect::ABILITY_USE));
    }

    #[test]
    fn exploded_mine_is_removed_after_countdown() {
        let mut world = World::with_grid(Grid::new(6), Ruleset::Solo, 1);
        world.grid.mines.push(Mine::new(1, Position::new(2, 2), None));
        MineSystem::explode_at(&mut world, Position::new(2, 2));

        for _ in 0..=Mine::EXPLOSION_TICKS {
            MineSystem::update(&mut world);
        }
        assert!(world.grid.mines.is_empty());
    }

    #[test]
    fn duplicate_mines_keep_latest() {
        let mut world = World::with_grid(Grid::new(6), Ruleset::Solo, 1);
        world.grid.mines.push(Mine::new(1, Position::new(2, 2), None));
        world.grid.mines.push(Mine::new(2, Position::new(2, 2), None));
        MineSystem::update(&mut world);
        assert_eq!(world.grid.mines.len(), 1);
        assert_eq!(world.grid.mines[0].id, 2);
    }

    #[test]
    fn team_blast_splashes_and_chains_next_tick() {
        let mut world = World::with_grid(Grid::new(10), Ruleset::Team, 1);
        let victim = spawn(&mut world, Position::new(4, 4), Direction::Up);
        let bystander = spawn(&mut world, Position::new(5, 4), Direction::Up);
        world.grid.mines.push(Mine::new(1, Position::new(4, 4), None));
        world.grid.mines.push(Mine::new(2, Position::new(3, 3), None));

        MineSystem::update(&mut world);
        assert_eq!(world.grid.tank(victim).unwrap().health, 50);
        assert_eq!(world.grid.tank(bystander).unwrap().health, 65);
        let chained = world.grid.mines.iter().find(|m| m.id == 2).unwrap();
        assert!(!chained.is_exploded());
        assert!(chained.explode_next_tick);

        MineSystem::update(&mut world);
        let chained = world.grid.mines.iter().find(|m| m.id == 2).unwrap();
        assert!(chained.is_exploded());
    }

    #[test]
    fn ability_use_drops_and_consumes_item() {
        let mut world = World::with_grid(Grid::new(10), Ruleset::Solo, 1);
        let layer = spawn(&mut world, Position::new(3, 3), Direction::Left);
        world.grid.tank_mut(layer).unwrap().secondary_item =
            Some(crate::game::ability::SecondaryItemType::Mine);

        world
            .apply_action(layer, Action::UseAbility(AbilityType::DropMine))
            .unwrap();
        assert_eq!(world.grid.mines.len(), 1);
        assert_eq!(world.grid.mines[0].position, Position::new(4, 3));
        assert!(world.grid.tank(layer).unwrap().secondary_item.is_none());
    }
}
