//! Zone occupancy, income and capture transitions

use tracing::debug;

use crate::game::events::GameEvent;
use crate::game::world::World;
use crate::game::zone::{Captor, ZoneState};

/// Score paid to a zone owner every tick
pub const ZONE_INCOME: f32 = 0.5;
/// Health restored to a solo zone owner every tick
pub const ZONE_HEAL: f32 = 0.25;
/// Owners above this health are not healed
pub const ZONE_HEAL_CEILING: i32 = 80;

pub struct ZoneSystem;

impl ZoneSystem {
    pub fn update(world: &mut World) {
        let tick = world.tick();
        for index in 0..world.grid.zones.len() {
            let occupants = Self::occupants(world, index);

            // income follows the owner as of the start of the tick
            if let ZoneState::Captured { by } = world.grid.zones[index].state.clone() {
                world.award_fractional_score(&by, ZONE_INCOME);
                if let Captor::Player(owner) = by {
                    let wounded = world
                        .grid
                        .tank(owner)
                        .is_some_and(|t| !t.is_dead() && t.health < ZONE_HEAL_CEILING);
                    if world.rules().zone_heals_owner() && wounded {
                        world.heal_tank_fractional(owner, ZONE_HEAL);
                    }
                }
            }

            let zone = &mut world.grid.zones[index];
            if let Some(previous) = zone.tick(&occupants) {
                let event = GameEvent::ZoneStateChanged {
                    tick,
                    zone: zone.index,
                    from: previous.name(),
                    to: zone.state.name(),
                };
                debug!(zone = %zone.index, from = previous.name(), to = zone.state.name(), "zone transition");
                world.emit(event);
            }
        }
    }

    /// A contender left for good
    pub fn remove_captor(world: &mut World, captor: &Captor) {
        let tick = world.tick();
        for index in 0..world.grid.zones.len() {
            let zone = &mut world.grid.zones[index];
            if let Some(previous) = zone.remove_captor(captor) {
                let event = GameEvent::ZoneStateChanged {
                    tick,
                    zone: zone.index,
                    from: previous.name(),
                    to: zone.state.name(),
                };
                world.emit(event);
            }
        }
    }

    /// Distinct contenders with a live tank inside, in roster order
    fn occupants(world: &World, index: usize) -> Vec<Captor> {
        let zone = &world.grid.zones[index];
        let mut occupants = Vec::new();
        for tank in &world.grid.tanks {
            let inside = tank.position().is_some_and(|p| zone.contains(p));
            if !inside {
                continue;
            }
            if let Some(captor) = world.captor_of(tank.owner) {
                if !occupants.contains(&captor) {
                    occupants.push(captor);
                }
            }
        }
        occupants
    }
}
