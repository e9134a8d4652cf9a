//! Players and teams

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tank::TankType;

pub type PlayerId = Uuid;

/// Declared client kind, negotiated at handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerKind {
    Human,
    Bot,
}

impl PlayerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "human" | "0" => Some(PlayerKind::Human),
            "bot" | "hackathonbot" | "1" => Some(PlayerKind::Bot),
            _ => None,
        }
    }
}

/// Palette handed out in join order
const PLAYER_COLORS: [u32; 8] = [
    0xFFFF_4040,
    0xFF40_80FF,
    0xFF40_C040,
    0xFFFF_C020,
    0xFFC0_40FF,
    0xFF20_D0D0,
    0xFFFF_80C0,
    0xFFA0_A0A0,
];

pub fn color_for(index: usize) -> u32 {
    PLAYER_COLORS[index % PLAYER_COLORS.len()]
}

/// A connected participant
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub kind: PlayerKind,
    pub color: u32,
    pub ping_ms: u32,
    pub score: i64,
    pub kills: u32,
    pub team: Option<String>,
    pub tank_type: Option<TankType>,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String, kind: PlayerKind, color: u32) -> Self {
        Self {
            id,
            nickname,
            kind,
            color,
            ping_ms: 0,
            score: 0,
            kills: 0,
            team: None,
            tank_type: None,
        }
    }
}

/// Team aggregate under team rules
#[derive(Debug, Clone)]
pub struct Team {
    pub name: String,
    pub color: u32,
    pub score: i64,
    pub members: Vec<PlayerId>,
}

impl Team {
    pub const MAX_MEMBERS: usize = 2;

    pub fn new(name: String, color: u32) -> Self {
        Self {
            name,
            color,
            score: 0,
            members: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= Self::MAX_MEMBERS
    }
}
