//! Per-tick simulation systems
//!
//! Stateless systems are unit structs with associated functions over the
//! [`World`](super::world::World). Systems with their own bookkeeping
//! (stuns, fractional buffers, visibility) are owned by the world.

mod ability;
mod bullet;
mod collision;
mod damage;
mod heal;
mod item;
mod laser;
mod mapgen;
mod mine;
mod movement;
mod regen;
mod score;
mod spawn;
mod stun;
mod visibility;
mod zone;

pub use ability::AbilitySystem;
pub use bullet::{trajectory, BulletSystem};
pub use collision::{Collision, CollisionDetector};
pub use damage::DamageSystem;
pub use heal::HealSystem;
pub use item::ItemSystem;
pub use laser::LaserSystem;
pub use mapgen::MapGenerator;
pub use mine::MineSystem;
pub use movement::MovementSystem;
pub use regen::RegenSystem;
pub use score::ScoreSystem;
pub use spawn::{DespawnSystem, SpawnSystem};
pub use stun::{StunEffect, StunSystem};
pub use visibility::{VisibilityGrid, VisibilitySystem};
pub use zone::ZoneSystem;
