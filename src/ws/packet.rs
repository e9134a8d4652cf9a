//! Packet envelope and discriminators
//!
//! Every message on the wire is `{"type": ..., "payload": ...}`. The type is
//! a byte whose high nibble names the group and whose `0x08` bit says whether
//! a payload follows. Depending on what the client negotiated, the type and
//! every enum inside the payload are written as integers or as camelCase
//! names. Inbound packets may use either form.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::game::ability::{AbilityType, SecondaryItemType};
use crate::game::direction::{Direction, MovementDirection, Orientation, Rotation};
use crate::game::entity::BulletKind;
use crate::game::tank::TankType;

pub const HAS_PAYLOAD: u8 = 0x08;

macro_rules! packet_types {
    ($($variant:ident = $code:expr, $name:literal;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketType {
            $($variant,)*
        }

        impl PacketType {
            pub const ALL: &'static [PacketType] = &[$(PacketType::$variant,)*];

            pub fn code(self) -> u8 {
                match self {
                    $(PacketType::$variant => $code,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(PacketType::$variant => $name,)*
                }
            }
        }
    };
}

packet_types! {
    // communication
    Ping = 0x11, "ping";
    Pong = 0x12, "pong";
    ConnectionAccepted = 0x13, "connectionAccepted";
    ConnectionRejected = 0x1C, "connectionRejected";
    // lobby
    LobbyDataRequest = 0x22, "lobbyDataRequest";
    LobbyData = 0x29, "lobbyData";
    // game state
    GameStarting = 0x31, "gameStarting";
    GameStarted = 0x32, "gameStarted";
    GameNotStarted = 0x33, "gameNotStarted";
    GameInProgress = 0x34, "gameInProgress";
    ReadyToReceiveGameState = 0x35, "readyToReceiveGameState";
    GameStatusRequest = 0x36, "gameStatusRequest";
    GameState = 0x3A, "gameState";
    GameEnded = 0x3B, "gameEnded";
    // player actions
    Pass = 0x43, "pass";
    Movement = 0x49, "movement";
    Rotation = 0x4A, "rotation";
    AbilityUse = 0x4B, "abilityUse";
    GoTo = 0x4C, "goTo";
    // debug
    ChargeAbility = 0xD9, "chargeAbility";
    // warnings
    PlayerAlreadyMadeActionWarning = 0xE1, "playerAlreadyMadeActionWarning";
    ActionIgnoredDueToDeadWarning = 0xE2, "actionIgnoredDueToDeadWarning";
    SlowResponseWarning = 0xE3, "slowResponseWarning";
    CustomWarning = 0xE9, "customWarning";
    // errors
    InvalidPacketTypeError = 0xF9, "invalidPacketTypeError";
    InvalidPacketUsageError = 0xFA, "invalidPacketUsageError";
    InvalidPayloadError = 0xFB, "invalidPayloadError";
    InternalError = 0xFC, "internalError";
}

impl PacketType {
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn has_payload(self) -> bool {
        self.code() & HAS_PAYLOAD != 0
    }

    pub fn group(self) -> u8 {
        self.code() & 0xF0
    }

    pub fn is_action(self) -> bool {
        self.group() == 0x40 || self == PacketType::ChargeAbility
    }
}

/// How enums are written to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumFormat {
    Int,
    #[default]
    String,
}

impl EnumFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "int" | "integer" | "number" => Some(EnumFormat::Int),
            "string" | "name" => Some(EnumFormat::String),
            _ => None,
        }
    }
}

/// Enum with both an integer and a name form on the wire
pub trait WireEnum: Copy + Sized + 'static {
    const VALUES: &'static [Self];

    fn index(self) -> u8;
    fn wire_name(self) -> &'static str;

    fn to_wire(self, format: EnumFormat) -> Value {
        match format {
            EnumFormat::Int => Value::from(self.index()),
            EnumFormat::String => Value::from(self.wire_name()),
        }
    }

    /// Accepts either form, whatever the connection negotiated
    fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                let index = u8::try_from(n.as_u64()?).ok()?;
                Self::VALUES.iter().copied().find(|v| v.index() == index)
            }
            Value::String(s) => Self::VALUES
                .iter()
                .copied()
                .find(|v| v.wire_name().eq_ignore_ascii_case(s)),
            _ => None,
        }
    }
}

macro_rules! wire_enum {
    ($ty:ty { $($variant:path => $index:expr, $name:literal;)* }) => {
        impl WireEnum for $ty {
            const VALUES: &'static [Self] = &[$($variant,)*];

            fn index(self) -> u8 {
                match self {
                    $($variant => $index,)*
                }
            }

            fn wire_name(self) -> &'static str {
                match self {
                    $($variant => $name,)*
                }
            }
        }
    };
}

wire_enum!(Direction {
    Direction::Up => 0, "up";
    Direction::Right => 1, "right";
    Direction::Down => 2, "down";
    Direction::Left => 3, "left";
});

wire_enum!(Rotation {
    Rotation::Left => 0, "left";
    Rotation::Right => 1, "right";
});

wire_enum!(MovementDirection {
    MovementDirection::Forward => 0, "forward";
    MovementDirection::Backward => 1, "backward";
});

wire_enum!(Orientation {
    Orientation::Horizontal => 0, "horizontal";
    Orientation::Vertical => 1, "vertical";
});

wire_enum!(AbilityType {
    AbilityType::FireBullet => 0, "fireBullet";
    AbilityType::UseLaser => 1, "useLaser";
    AbilityType::FireDoubleBullet => 2, "fireDoubleBullet";
    AbilityType::UseRadar => 3, "useRadar";
    AbilityType::DropMine => 4, "dropMine";
    AbilityType::FireStunBullet => 5, "fireStunBullet";
});

wire_enum!(SecondaryItemType {
    SecondaryItemType::Laser => 1, "laser";
    SecondaryItemType::DoubleBullet => 2, "doubleBullet";
    SecondaryItemType::Radar => 3, "radar";
    SecondaryItemType::Mine => 4, "mine";
});

wire_enum!(TankType {
    TankType::Light => 0, "light";
    TankType::Heavy => 1, "heavy";
});

wire_enum!(BulletKind {
    BulletKind::Basic => 0, "basic";
    BulletKind::Double => 1, "double";
    BulletKind::Stun => 2, "stun";
});

/// Enum value rendered in the connection's format. Reading one back keeps
/// the form it arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire<T: WireEnum> {
    pub value: T,
    pub format: EnumFormat,
}

impl<T: WireEnum> Wire<T> {
    pub fn new(value: T, format: EnumFormat) -> Self {
        Self { value, format }
    }
}

impl<T: WireEnum> Serialize for Wire<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.format {
            EnumFormat::Int => serializer.serialize_u8(self.value.index()),
            EnumFormat::String => serializer.serialize_str(self.value.wire_name()),
        }
    }
}

impl<'de, T: WireEnum> Deserialize<'de> for Wire<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let format = match raw {
            Value::Number(_) => EnumFormat::Int,
            Value::String(_) => EnumFormat::String,
            _ => return Err(de::Error::custom("expected an enum index or name")),
        };
        T::from_wire(&raw)
            .map(|value| Wire::new(value, format))
            .ok_or_else(|| de::Error::custom(format!("unknown enum value {raw}")))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("packet is not valid JSON: {0}")]
    Malformed(String),

    #[error("packet has no valid type")]
    UnknownType,

    #[error("packet type {0} requires a payload")]
    MissingPayload(&'static str),

    #[error("packet type {0} takes no payload")]
    UnexpectedPayload(&'static str),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    InvalidUsage(String),
}

impl ProtocolError {
    /// Error packet reported back to the sender
    pub fn packet_type(&self) -> PacketType {
        match self {
            ProtocolError::Malformed(_) | ProtocolError::UnknownType => {
                PacketType::InvalidPacketTypeError
            }
            ProtocolError::MissingPayload(_)
            | ProtocolError::UnexpectedPayload(_)
            | ProtocolError::InvalidPayload(_) => {
                PacketType::InvalidPayloadError
            }
            ProtocolError::InvalidUsage(_) => PacketType::InvalidPacketUsageError,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    packet_type: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub payload: Option<Value>,
}

impl Packet {
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            payload: None,
        }
    }

    pub fn with_payload<P: Serialize>(packet_type: PacketType, payload: &P) -> Result<Self, ProtocolError> {
        let payload =
            serde_json::to_value(payload).map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?;
        Ok(Self {
            packet_type,
            payload: Some(payload),
        })
    }

    /// Shorthand for warnings and errors, which carry a message
    pub fn message(packet_type: PacketType, message: impl Into<String>) -> Self {
        let payload = packet_type
            .has_payload()
            .then(|| serde_json::json!({ "message": message.into() }));
        Self {
            packet_type,
            payload,
        }
    }

    pub fn encode(&self, format: EnumFormat) -> String {
        let empty = Value::Object(Map::new());
        let payload = self
            .packet_type
            .has_payload()
            .then(|| self.payload.as_ref().unwrap_or(&empty));
        let envelope = Envelope {
            packet_type: self.type_value(format),
            payload,
        };
        serde_json::to_string(&envelope).unwrap_or_default()
    }

    fn type_value(&self, format: EnumFormat) -> Value {
        match format {
            EnumFormat::Int => Value::from(self.packet_type.code()),
            EnumFormat::String => Value::from(self.packet_type.name()),
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Value::Object(mut envelope) = value else {
            return Err(ProtocolError::Malformed("expected an object".into()));
        };

        let packet_type = match envelope.get("type") {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|c| u8::try_from(c).ok())
                .and_then(PacketType::from_code),
            Some(Value::String(s)) => PacketType::from_name(s),
            _ => None,
        }
        .ok_or(ProtocolError::UnknownType)?;

        let payload = envelope.remove("payload").filter(|p| !p.is_null());
        match (packet_type.has_payload(), &payload) {
            (true, None) => return Err(ProtocolError::MissingPayload(packet_type.name())),
            (false, Some(_)) => return Err(ProtocolError::UnexpectedPayload(packet_type.name())),
            _ => {}
        }
        Ok(Self {
            packet_type,
            payload,
        })
    }

    /// Payload field as an enum in either wire form
    pub fn enum_field<T: WireEnum>(&self, field: &str) -> Result<Option<T>, ProtocolError> {
        match self.payload.as_ref().and_then(|p| p.get(field)) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_wire(value)
                .map(Some)
                .ok_or_else(|| ProtocolError::InvalidPayload(format!("invalid value for {field}"))),
        }
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.payload.as_ref()?.get(field)?.as_str()
    }
}
