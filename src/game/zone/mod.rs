//! Capture zones
//!
//! A zone keeps its current [`ZoneState`] plus a [`ZoneContext`] with the
//! per-contender capture countdowns. Each tick the state is replaced by the
//! value the transition table produces, it is never mutated in place.

mod state;

pub use state::ZoneState;

use serde::{Deserialize, Serialize};

use super::direction::Position;
use super::player::PlayerId;

/// Who competes for a zone: a player under solo rules, a team under team rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Captor {
    Player(PlayerId),
    Team(String),
}

impl Captor {
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Captor::Player(id) => Some(*id),
            Captor::Team(_) => None,
        }
    }

    pub fn as_team(&self) -> Option<&str> {
        match self {
            Captor::Team(name) => Some(name),
            Captor::Player(_) => None,
        }
    }
}

/// Ticks a sole occupant needs to take a zone
pub const TICKS_TO_CAPTURE: u32 = 50;

/// Remaining capture ticks per contender, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneContext {
    remaining: Vec<(Captor, u32)>,
}

impl ZoneContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Countdown for `captor`, a full capture when never seen
    pub fn remaining(&self, captor: &Captor) -> u32 {
        self.remaining
            .iter()
            .find(|(c, _)| c == captor)
            .map(|(_, r)| *r)
            .unwrap_or(TICKS_TO_CAPTURE)
    }

    pub fn has_progress(&self, captor: &Captor) -> bool {
        self.remaining.iter().any(|(c, _)| c == captor)
    }

    /// Contender with the least remaining ticks, earliest seen on ties
    pub fn closest(&self, excluding: Option<&Captor>) -> Option<Captor> {
        self.remaining
            .iter()
            .filter(|(c, _)| Some(c) != excluding)
            .fold(None::<&(Captor, u32)>, |best, entry| match best {
                Some(b) if b.1 <= entry.1 => Some(b),
                _ => Some(entry),
            })
            .map(|(c, _)| c.clone())
    }

    /// Outsiders regain one tick (dropped once fully reset), the present
    /// capturer loses one.
    pub fn update_progress(&mut self, occupants: &[Captor], state: &ZoneState) {
        for (captor, remaining) in self.remaining.iter_mut() {
            if !occupants.contains(captor) {
                *remaining += 1;
            }
        }
        self.remaining.retain(|(_, r)| *r < TICKS_TO_CAPTURE);

        let Some(capturer) = state.capturer() else {
            return;
        };
        if !occupants.contains(capturer) {
            return;
        }

        match self.remaining.iter_mut().find(|(c, _)| c == capturer) {
            Some((_, remaining)) => *remaining = remaining.saturating_sub(1),
            None => self
                .remaining
                .push((capturer.clone(), TICKS_TO_CAPTURE - 1)),
        }
    }

    pub fn forget(&mut self, captor: &Captor) {
        self.remaining.retain(|(c, _)| c != captor);
    }
}

/// Rectangular capture area
#[derive(Debug, Clone)]
pub struct Zone {
    pub index: char,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub state: ZoneState,
    pub context: ZoneContext,
}

impl Zone {
    pub fn new(index: char, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            index,
            x,
            y,
            width,
            height,
            state: ZoneState::Neutral,
            context: ZoneContext::new(),
        }
    }

    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn manhattan_distance_to(&self, p: Position) -> i32 {
        let dx = (self.x - p.x).max(p.x - (self.x + self.width - 1)).max(0);
        let dy = (self.y - p.y).max(p.y - (self.y + self.height - 1)).max(0);
        dx + dy
    }

    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| Position::new(x, y)))
    }

    /// Advance one tick given the distinct contenders standing inside.
    /// Returns the previous state when it changed.
    pub fn tick(&mut self, occupants: &[Captor]) -> Option<ZoneState> {
        let next = self.state.next(occupants, &self.context);
        self.context.update_progress(occupants, &next);
        let next = next.refreshed(&self.context).settled(occupants);
        self.replace_state(next)
    }

    /// A contender left the game
    pub fn remove_captor(&mut self, removed: &Captor) -> Option<ZoneState> {
        self.context.forget(removed);
        let next = self
            .state
            .on_captor_removed(removed, &self.context)
            .refreshed(&self.context);
        self.replace_state(next)
    }

    fn replace_state(&mut self, next: ZoneState) -> Option<ZoneState> {
        if let ZoneState::Captured { by } = &next {
            self.context.forget(by);
        }
        if next == self.state {
            return None;
        }
        Some(std::mem::replace(&mut self.state, next))
    }
}
