//! Payload types exchanged with clients
//!
//! Outbound payloads are built per recipient: the same world state encodes
//! differently for a spectator, a player and a team. Optional fields are
//! left out entirely when the recipient may not see them. Every outbound
//! payload also deserializes, so a client can read back what it was sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::packet::{EnumFormat, Packet, PacketType, ProtocolError, Wire, WireEnum};
use crate::game::ability::{AbilityType, SecondaryItemType};
use crate::game::action::Action;
use crate::game::direction::{Direction, MovementDirection, Orientation, Rotation};
use crate::game::entity::BulletKind;
use crate::game::pathfinding::{Costs, GoToRequest, Penalties};
use crate::game::player::PlayerId;
use crate::game::tank::TankType;

/// Who a payload is being encoded for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SerializationView {
    Spectator,
    Player(PlayerId),
    Team(String),
}

impl SerializationView {
    pub fn is_spectator(&self) -> bool {
        matches!(self, SerializationView::Spectator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRejectedPayload {
    pub reason: String,
}

// --- lobby ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub nickname: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tank_type: Option<Wire<TankType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyTeam {
    pub name: String,
    pub color: u32,
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySettings {
    pub grid_dimension: usize,
    pub number_of_players: usize,
    pub seed: u64,
    pub broadcast_interval: u64,
    pub ruleset: String,
    pub sandbox_mode: bool,
    pub eager_broadcast: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_name: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPayload {
    /// Recipient's own id, absent for spectators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    pub players: Vec<LobbyPlayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<LobbyTeam>>,
    pub server_settings: LobbySettings,
}

// --- game state ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    pub id: PlayerId,
    pub nickname: String,
    pub color: u32,
    pub ping: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks_to_respawn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamEntry {
    pub name: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityEntry {
    #[serde(rename = "type")]
    pub kind: Wire<AbilityType>,
    /// Absent when the ability is ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ticks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurretEntry {
    pub direction: Wire<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullet_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks_to_bullet: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankEntry {
    pub owner_id: PlayerId,
    pub direction: Wire<Direction>,
    pub turret: TurretEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tank_type: Option<Wire<TankType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_item: Option<Wire<SecondaryItemType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abilities: Option<Vec<AbilityEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_using_radar: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletEntry {
    pub id: u32,
    pub direction: Wire<Direction>,
    pub speed: f32,
    #[serde(rename = "type")]
    pub kind: Wire<BulletKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shooter_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaserEntry {
    pub id: u32,
    pub orientation: Wire<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shooter_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineEntry {
    pub id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explosion_remaining_ticks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntry {
    #[serde(rename = "type")]
    pub kind: Wire<SecondaryItemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
}

/// Zone contenders are named by player id or by team name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ZoneStatusEntry {
    Neutral,
    BeingCaptured {
        remaining_ticks: u32,
        by: String,
    },
    Captured {
        by: String,
    },
    BeingContested {
        #[serde(skip_serializing_if = "Option::is_none")]
        captured_by: Option<String>,
    },
    BeingRetaken {
        remaining_ticks: u32,
        captured_by: String,
        retaken_by: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneEntry {
    pub index: char,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub status: ZoneStatusEntry,
}

/// One entity stacked on a player's map tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Tile {
    Wall,
    Tank(TankEntry),
    Bullet(BulletEntry),
    Laser(LaserEntry),
    Mine(MineEntry),
    Item(ItemEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMap {
    /// Indexed `tiles[x][y]`
    pub tiles: Vec<Vec<Vec<Tile>>>,
    pub zones: Vec<ZoneEntry>,
    /// One '0'/'1' string per row
    pub visibility: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDimensions {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallEntry {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorMap {
    pub grid_dimensions: GridDimensions,
    pub walls: Vec<WallEntry>,
    pub tanks: Vec<TankEntry>,
    pub bullets: Vec<BulletEntry>,
    pub lasers: Vec<LaserEntry>,
    pub mines: Vec<MineEntry>,
    pub items: Vec<ItemEntry>,
    pub zones: Vec<ZoneEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MapPayload {
    Player(PlayerMap),
    Spectator(SpectatorMap),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub id: String,
    pub tick: u64,
    pub players: Vec<PlayerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<TeamEntry>>,
    pub map: MapPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPayload {
    pub ticks: u64,
    pub players: Vec<PlayerEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<TeamEntry>>,
    pub ended_at: String,
    /// False when a simulation fault occurred during the game
    pub valid: bool,
}

// --- inbound ---

/// Decoded action packet
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPacket {
    pub action: Action,
    pub game_state_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoToFields {
    x: i32,
    y: i32,
    #[serde(default)]
    costs: Costs,
    #[serde(default)]
    penalties: Penalties,
}

impl ActionPacket {
    pub fn parse(packet: &Packet) -> Result<Self, ProtocolError> {
        let action = match packet.packet_type {
            PacketType::Pass => Action::Pass,
            PacketType::Movement => {
                Action::Move(required(packet.enum_field::<MovementDirection>("direction")?, "direction")?)
            }
            PacketType::Rotation => Action::Rotate {
                tank: packet.enum_field::<Rotation>("tankRotation")?,
                turret: packet.enum_field::<Rotation>("turretRotation")?,
            },
            PacketType::AbilityUse => {
                Action::UseAbility(required(packet.enum_field::<AbilityType>("abilityType")?, "abilityType")?)
            }
            PacketType::ChargeAbility => Action::ChargeAbility(required(
                packet.enum_field::<AbilityType>("abilityType")?,
                "abilityType",
            )?),
            PacketType::GoTo => {
                let payload = packet.payload.clone().unwrap_or(Value::Null);
                let fields: GoToFields = serde_json::from_value(payload)
                    .map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
                let mut request = GoToRequest::new(fields.x, fields.y);
                request.turret_rotation = packet.enum_field::<Rotation>("turretRotation")?;
                request.costs = fields.costs;
                request.penalties = fields.penalties;
                Action::GoTo(request)
            }
            other => {
                return Err(ProtocolError::InvalidUsage(format!(
                    "{} is not an action packet",
                    other.name()
                )))
            }
        };

        Ok(Self {
            action,
            game_state_id: packet.str_field("gameStateId").map(str::to_owned),
        })
    }

    /// Client side of [`ActionPacket::parse`]. A pass carries no payload, so
    /// its game state id is not sent.
    pub fn to_packet(&self, format: EnumFormat) -> Result<Packet, ProtocolError> {
        let mut fields = Map::new();
        let packet_type = match &self.action {
            Action::Pass => return Ok(Packet::new(PacketType::Pass)),
            Action::Move(direction) => {
                fields.insert("direction".into(), direction.to_wire(format));
                PacketType::Movement
            }
            Action::Rotate { tank, turret } => {
                if let Some(tank) = tank {
                    fields.insert("tankRotation".into(), tank.to_wire(format));
                }
                if let Some(turret) = turret {
                    fields.insert("turretRotation".into(), turret.to_wire(format));
                }
                PacketType::Rotation
            }
            Action::UseAbility(ability) => {
                fields.insert("abilityType".into(), ability.to_wire(format));
                PacketType::AbilityUse
            }
            Action::ChargeAbility(ability) => {
                fields.insert("abilityType".into(), ability.to_wire(format));
                PacketType::ChargeAbility
            }
            Action::GoTo(request) => {
                let encode = |e: serde_json::Error| ProtocolError::InvalidPayload(e.to_string());
                fields.insert("x".into(), Value::from(request.x));
                fields.insert("y".into(), Value::from(request.y));
                if let Some(turret) = request.turret_rotation {
                    fields.insert("turretRotation".into(), turret.to_wire(format));
                }
                fields.insert("costs".into(), serde_json::to_value(request.costs).map_err(encode)?);
                fields.insert(
                    "penalties".into(),
                    serde_json::to_value(&request.penalties).map_err(encode)?,
                );
                PacketType::GoTo
            }
        };
        if let Some(id) = &self.game_state_id {
            fields.insert("gameStateId".into(), Value::from(id.as_str()));
        }
        Ok(Packet {
            packet_type,
            payload: Some(Value::Object(fields)),
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ProtocolError> {
    value.ok_or_else(|| ProtocolError::InvalidPayload(format!("missing {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rotation_with_partial_fields() {
        let packet = Packet::decode(
            r#"{"type":"rotation","payload":{"tankRotation":null,"turretRotation":1,"gameStateId":"abc"}}"#,
        )
        .unwrap();
        let parsed = ActionPacket::parse(&packet).unwrap();
        assert_eq!(
            parsed.action,
            Action::Rotate {
                tank: None,
                turret: Some(Rotation::Right)
            }
        );
        assert_eq!(parsed.game_state_id.as_deref(), Some("abc"));
    }

    #[test]
    fn parses_goto_with_defaults() {
        let packet = Packet::decode(
            r#"{"type":"goTo","payload":{"x":3,"y":4,"penalties":{"bullet":5.0}}}"#,
        )
        .unwrap();
        let Action::GoTo(request) = ActionPacket::parse(&packet).unwrap().action else {
            panic!("expected goto");
        };
        assert_eq!((request.x, request.y), (3, 4));
        assert_eq!(request.costs, Costs::default());
        assert_eq!(request.penalties.bullet, 5.0);
        assert_eq!(request.penalties.mine, Penalties::default().mine);
    }

    #[test]
    fn rejects_missing_and_invalid_fields() {
        let missing = Packet::decode(r#"{"type":"abilityUse","payload":{}}"#).unwrap();
        assert!(matches!(
            ActionPacket::parse(&missing),
            Err(ProtocolError::InvalidPayload(_))
        ));

        let invalid = Packet::decode(r#"{"type":"abilityUse","payload":{"abilityType":42}}"#).unwrap();
        assert!(ActionPacket::parse(&invalid).is_err());

        let ping = Packet::new(PacketType::Ping);
        assert!(matches!(
            ActionPacket::parse(&ping),
            Err(ProtocolError::InvalidUsage(_))
        ));
    }

    #[test]
    fn actions_encode_back_to_what_parse_reads() {
        let mut go_to = GoToRequest::new(6, 2);
        go_to.turret_rotation = Some(Rotation::Left);
        go_to.penalties.mine = 40.0;
        let actions = vec![
            Action::Pass,
            Action::Move(MovementDirection::Backward),
            Action::Rotate {
                tank: Some(Rotation::Left),
                turret: None,
            },
            Action::UseAbility(AbilityType::DropMine),
            Action::ChargeAbility(AbilityType::UseRadar),
            Action::GoTo(go_to),
        ];
        for format in [EnumFormat::Int, EnumFormat::String] {
            for action in &actions {
                let sent = ActionPacket {
                    action: action.clone(),
                    game_state_id: (!action.is_pass()).then(|| "tick-7".to_owned()),
                };
                let text = sent.to_packet(format).unwrap().encode(format);
                let received = ActionPacket::parse(&Packet::decode(&text).unwrap()).unwrap();
                assert_eq!(received, sent, "{text}");
            }
        }

        let pass = ActionPacket {
            action: Action::Pass,
            game_state_id: Some("tick-7".into()),
        };
        let text = pass.to_packet(EnumFormat::Int).unwrap().encode(EnumFormat::Int);
        assert_eq!(text, r#"{"type":67}"#);
    }

    #[test]
    fn tiles_are_adjacently_tagged() {
        let wall = serde_json::to_string(&Tile::Wall).unwrap();
        assert_eq!(wall, r#"{"type":"wall"}"#);

        let item = Tile::Item(ItemEntry {
            kind: Wire::new(SecondaryItemType::Radar, EnumFormat::Int),
            x: None,
            y: None,
        });
        assert_eq!(
            serde_json::to_string(&item).unwrap(),
            r#"{"type":"item","payload":{"type":3}}"#
        );
    }
}
