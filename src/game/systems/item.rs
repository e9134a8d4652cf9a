//! Pickups: spawning, collection and drops

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use tracing::trace;

use crate::game::ability::SecondaryItemType;
use crate::game::direction::{Direction, Position};
use crate::game::entity::SecondaryItem;
use crate::game::events::GameEvent;
use crate::game::grid::Grid;
use crate::game::world::World;

const SPAWN_ATTEMPTS: usize = 200;

/// Weights for the per-tick spawn roll, each taken out of their total (101.29).
/// `None` spawns nothing, so an item is rolled on about 1.8% of ticks.
const SPAWN_WEIGHTS: [(Option<SecondaryItemType>, f32); 5] = [
    (Some(SecondaryItemType::Laser), 0.09),
    (Some(SecondaryItemType::DoubleBullet), 0.9),
    (Some(SecondaryItemType::Radar), 0.3),
    (Some(SecondaryItemType::Mine), 0.5),
    (None, 99.5),
];

pub struct ItemSystem;

impl ItemSystem {
    pub fn update(world: &mut World) {
        Self::pick_up(world);
        Self::spawn(world);
    }

    fn pick_up(world: &mut World) {
        let tick = world.tick();
        let mut picked = Vec::new();
        let grid = &mut world.grid;
        for tank in grid.tanks.iter_mut() {
            if tank.secondary_item.is_some() {
                continue;
            }
            let Some(position) = tank.position() else {
                continue;
            };
            if let Some(index) = grid.items.iter().position(|i| i.position == position) {
                let item = grid.items.remove(index);
                tank.secondary_item = Some(item.kind);
                picked.push((tank.owner, item.kind));
            }
        }
        for (player_id, item) in picked {
            trace!(tick, %player_id, ?item, "item picked up");
            world.emit(GameEvent::ItemPickedUp {
                tick,
                player_id,
                item,
            });
        }
    }

    fn roll(world: &mut World) -> Option<SecondaryItemType> {
        let total: f32 = SPAWN_WEIGHTS.iter().map(|(_, w)| w).sum();
        let roll = world.rng().gen_range(0.0..total);
        let mut cumulative = 0.0;
        for (outcome, weight) in SPAWN_WEIGHTS {
            cumulative += weight;
            if roll <= cumulative {
                return outcome;
            }
        }
        None
    }

    fn spawn(world: &mut World) {
        if world.grid.items.len() > 2 * world.grid.dim() {
            return;
        }
        let Some(kind) = Self::roll(world) else {
            return;
        };

        let dim = world.grid.dim() as i32;
        for _ in 0..SPAWN_ATTEMPTS {
            let cell = Position::new(world.rng().gen_range(0..dim), world.rng().gen_range(0..dim));
            if world.grid.is_empty_cell(cell)
                && world.grid.zone_at(cell).is_none()
                && !world.visibility.is_visible_by_any(cell)
            {
                world.grid.items.push(SecondaryItem {
                    position: cell,
                    kind,
                });
                return;
            }
        }
    }

    /// Leave `item` on the nearest wall-free cell without another item
    pub fn drop_near(grid: &mut Grid, item: SecondaryItemType, at: Position) {
        let mut seen = HashSet::from([at]);
        let mut queue = VecDeque::from([at]);

        while let Some(cell) = queue.pop_front() {
            if !grid.is_wall(cell) && !grid.items.iter().any(|i| i.position == cell) {
                grid.items.push(SecondaryItem {
                    position: cell,
                    kind: item,
                });
                return;
            }
            for direction in Direction::ALL {
                let next = cell.step(direction, 1);
                if grid.in_bounds(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ruleset::Ruleset;
    use crate::game::world::World;

    #[test]
    fn spawn_roll_follows_weights() {
        let mut world = World::with_grid(Grid::new(8), Ruleset::Solo, 11);
        let rolls = 50_000;
        let mut items = 0;
        let mut lasers = 0;
        for _ in 0..rolls {
            match ItemSystem::roll(&mut world) {
                Some(SecondaryItemType::Laser) => {
                    items += 1;
                    lasers += 1;
                }
                Some(_) => items += 1,
                None => {}
            }
        }
        let share = items as f32 / rolls as f32;
        assert!((0.013..0.023).contains(&share), "item share {share}");
        assert!(lasers < items / 5);
    }

    #[test]
    fn dropped_item_moves_to_nearest_free_cell() {
        let mut grid = Grid::new(5);
        let at = Position::new(2, 2);
        ItemSystem::drop_near(&mut grid, SecondaryItemType::Mine, at);
        assert_eq!(grid.items[0].position, at);

        grid.set_wall(Position::new(2, 1), true);
        grid.set_wall(Position::new(3, 2), true);
        ItemSystem::drop_near(&mut grid, SecondaryItemType::Radar, at);
        let second = grid.items[1].position;
        assert_eq!(second.manhattan(at), 1);
        assert!(!grid.is_wall(second));
    }

    #[test]
    fn tank_without_item_picks_it_up() {
        let mut world = World::with_grid(Grid::new(8), Ruleset::Solo, 4);
        let id = uuid::Uuid::new_v4();
        world.add_player(crate::game::player::Player::new(
            id,
            "I".into(),
            crate::game::player::PlayerKind::Bot,
            0,
        ));
        let at = world.grid.tank(id).unwrap().position().unwrap();
        world.grid.items.push(SecondaryItem {
            position: at,
            kind: SecondaryItemType::Laser,
        });

        ItemSystem::pick_up(&mut world);
        assert_eq!(
            world.grid.tank(id).unwrap().secondary_item,
            Some(SecondaryItemType::Laser)
        );
        assert!(world.grid.items.iter().all(|i| i.position != at));
        assert!(matches!(
            world.drain_events().as_slice(),
            [GameEvent::ItemPickedUp { .. }]
        ));
    }

    #[test]
    fn spawned_items_stay_out_of_zones_and_below_cap() {
        let mut grid = Grid::new(6);
        grid.zones.push(crate::game::zone::Zone::new('A', 0, 0, 4, 4));
        let mut world = World::with_grid(grid, Ruleset::Solo, 11);
        for _ in 0..20_000 {
            ItemSystem::spawn(&mut world);
        }
        assert!(!world.grid.items.is_empty());
        assert!(world.grid.items.len() <= 2 * 6 + 1);
        for item in &world.grid.items {
            assert!(world.grid.zone_at(item.position).is_none());
        }
    }
}
