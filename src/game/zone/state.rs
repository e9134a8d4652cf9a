//! Zone state machine
//!
//! One handler per state, dispatched by pattern match. Every handler takes
//! the distinct contenders currently inside and the zone's countdowns, and
//! returns the replacement state.

use serde::{Deserialize, Serialize};

use super::{Captor, ZoneContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneState {
    Neutral,
    BeingCaptured {
        by: Captor,
        remaining_ticks: u32,
    },
    Captured {
        by: Captor,
    },
    BeingContested {
        captured_by: Option<Captor>,
    },
    BeingRetaken {
        captured_by: Captor,
        retaken_by: Captor,
        remaining_ticks: u32,
    },
}

impl ZoneState {
    /// Contender currently counting down, if any
    pub fn capturer(&self) -> Option<&Captor> {
        match self {
            ZoneState::BeingCaptured { by, .. } => Some(by),
            ZoneState::BeingRetaken { retaken_by, .. } => Some(retaken_by),
            _ => None,
        }
    }

    /// Contender holding the zone, if any
    pub fn owner(&self) -> Option<&Captor> {
        match self {
            ZoneState::Captured { by } => Some(by),
            ZoneState::BeingRetaken { captured_by, .. } => Some(captured_by),
            ZoneState::BeingContested { captured_by } => captured_by.as_ref(),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZoneState::Neutral => "neutral",
            ZoneState::BeingCaptured { .. } => "beingCaptured",
            ZoneState::Captured { .. } => "captured",
            ZoneState::BeingContested { .. } => "beingContested",
            ZoneState::BeingRetaken { .. } => "beingRetaken",
        }
    }

    /// Transition for this tick's occupancy
    pub fn next(&self, occupants: &[Captor], ctx: &ZoneContext) -> ZoneState {
        match self {
            ZoneState::Neutral => neutral(occupants, ctx),
            ZoneState::BeingCaptured { by, .. } => being_captured(by, occupants, ctx),
            ZoneState::Captured { by } => captured(by, occupants, ctx),
            ZoneState::BeingContested { captured_by } => {
                being_contested(captured_by.as_ref(), occupants, ctx)
            }
            ZoneState::BeingRetaken { captured_by, .. } => {
                being_retaken(captured_by, occupants, ctx)
            }
        }
    }

    /// Transition when a contender leaves the game. `ctx` no longer holds them.
    pub fn on_captor_removed(&self, removed: &Captor, ctx: &ZoneContext) -> ZoneState {
        match self {
            ZoneState::BeingCaptured { by, .. } if by == removed => capture_closest(ctx),
            ZoneState::Captured { by } if by == removed => ZoneState::Neutral,
            ZoneState::BeingContested {
                captured_by: Some(owner),
            } if owner == removed => ZoneState::BeingContested { captured_by: None },
            ZoneState::BeingRetaken {
                captured_by,
                retaken_by,
                ..
            } => {
                if captured_by == removed {
                    being_captured_by(retaken_by.clone(), ctx)
                } else if retaken_by == removed {
                    ZoneState::Captured {
                        by: captured_by.clone(),
                    }
                } else {
                    self.clone()
                }
            }
            _ => self.clone(),
        }
    }

    /// Copy the countdowns from the context into the state
    pub fn refreshed(self, ctx: &ZoneContext) -> ZoneState {
        match self {
            ZoneState::BeingCaptured { by, .. } => being_captured_by(by, ctx),
            ZoneState::BeingRetaken {
                captured_by,
                retaken_by,
                ..
            } => {
                let remaining_ticks = ctx.remaining(&retaken_by);
                ZoneState::BeingRetaken {
                    captured_by,
                    retaken_by,
                    remaining_ticks,
                }
            }
            other => other,
        }
    }

    /// Complete a capture whose countdown reached zero with the capturer alone
    pub fn settled(self, occupants: &[Captor]) -> ZoneState {
        let alone = |c: &Captor| occupants.len() == 1 && occupants[0] == *c;
        match self {
            ZoneState::BeingCaptured {
                by,
                remaining_ticks: 0,
            } if alone(&by) => ZoneState::Captured { by },
            ZoneState::BeingRetaken {
                retaken_by,
                remaining_ticks: 0,
                ..
            } if alone(&retaken_by) => ZoneState::Captured { by: retaken_by },
            other => other,
        }
    }
}

fn being_captured_by(by: Captor, ctx: &ZoneContext) -> ZoneState {
    let remaining_ticks = ctx.remaining(&by);
    ZoneState::BeingCaptured {
        by,
        remaining_ticks,
    }
}

fn capture_closest(ctx: &ZoneContext) -> ZoneState {
    match ctx.closest(None) {
        Some(closest) => being_captured_by(closest, ctx),
        None => ZoneState::Neutral,
    }
}

fn neutral(occupants: &[Captor], ctx: &ZoneContext) -> ZoneState {
    match occupants {
        [] => ZoneState::Neutral,
        [only] => being_captured_by(only.clone(), ctx),
        _ => ZoneState::BeingContested { captured_by: None },
    }
}

fn being_captured(by: &Captor, occupants: &[Captor], ctx: &ZoneContext) -> ZoneState {
    match occupants {
        [] => capture_closest(ctx),
        [only] if only == by => {
            if ctx.remaining(by) == 0 {
                ZoneState::Captured { by: by.clone() }
            } else {
                being_captured_by(by.clone(), ctx)
            }
        }
        [other] => being_captured_by(other.clone(), ctx),
        _ => ZoneState::BeingContested { captured_by: None },
    }
}

fn captured(by: &Captor, occupants: &[Captor], ctx: &ZoneContext) -> ZoneState {
    match occupants {
        [] => ZoneState::Captured { by: by.clone() },
        [only] if only == by => ZoneState::Captured { by: by.clone() },
        [other] => ZoneState::BeingRetaken {
            captured_by: by.clone(),
            retaken_by: other.clone(),
            remaining_ticks: ctx.remaining(other),
        },
        _ => ZoneState::BeingContested {
            captured_by: Some(by.clone()),
        },
    }
}

fn being_contested(
    captured_by: Option<&Captor>,
    occupants: &[Captor],
    ctx: &ZoneContext,
) -> ZoneState {
    match (occupants, captured_by) {
        ([], None) => capture_closest(ctx),
        ([], Some(owner)) => ZoneState::Captured { by: owner.clone() },
        ([only], None) => being_captured_by(only.clone(), ctx),
        ([only], Some(owner)) if only == owner => ZoneState::Captured { by: owner.clone() },
        ([other], Some(owner)) => ZoneState::BeingRetaken {
            captured_by: owner.clone(),
            retaken_by: other.clone(),
            remaining_ticks: ctx.remaining(other),
        },
        _ => ZoneState::BeingContested {
            captured_by: captured_by.cloned(),
        },
    }
}

fn being_retaken(
    captured_by: &Captor,
    occupants: &[Captor],
    ctx: &ZoneContext,
) -> ZoneState {
    match occupants {
        [] => match ctx.closest(Some(captured_by)) {
            Some(closest) => ZoneState::BeingRetaken {
                captured_by: captured_by.clone(),
                remaining_ticks: ctx.remaining(&closest),
                retaken_by: closest,
            },
            None => ZoneState::Captured {
                by: captured_by.clone(),
            },
        },
        [only] if only == captured_by => ZoneState::Captured {
            by: captured_by.clone(),
        },
        [other] => {
            if ctx.remaining(other) == 0 {
                ZoneState::Captured { by: other.clone() }
            } else {
                ZoneState::BeingRetaken {
                    captured_by: captured_by.clone(),
                    retaken_by: other.clone(),
                    remaining_ticks: ctx.remaining(other),
                }
            }
        }
        _ => ZoneState::BeingContested {
            captured_by: Some(captured_by.clone()),
        },
    }
}
