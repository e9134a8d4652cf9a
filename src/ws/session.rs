//! Connection registry and per-connection state
//!
//! The match loop owns the simulation; connections are reached only through
//! their outbound queues. Sends never wait, so a slow client cannot stall a
//! tick.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::packet::{EnumFormat, Packet};
use super::ping::Heartbeat;
use crate::game::player::PlayerId;

pub type ConnectionId = Uuid;

/// Outbound queue depth per connection
pub const OUTBOUND_CAPACITY: usize = 64;

/// Reasons a handshake is refused, sent verbatim to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("InvalidUrlPath")]
    InvalidUrlPath,
    #[error("InvalidJoinCode")]
    InvalidJoinCode,
    #[error("MissingNickname")]
    MissingNickname,
    #[error("InvalidPlayerType")]
    InvalidPlayerType,
    #[error("MissingTeamName")]
    MissingTeamName,
    #[error("InvalidTankType")]
    InvalidTankType,
    #[error("InvalidEnumSerializationFormat")]
    InvalidEnumFormat,
    #[error("GameInProgress")]
    GameInProgress,
    #[error("GameFull")]
    GameFull,
    #[error("NicknameExists")]
    NicknameExists,
    #[error("TeamsFull")]
    TeamsFull,
    #[error("TankTypeTaken")]
    TankTypeTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Player(PlayerId),
    Spectator,
}

#[derive(Debug)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Set once a player has acted this tick, cleared after each broadcast
#[derive(Debug, Default)]
pub struct ActionGate(AtomicBool);

impl ActionGate {
    /// Returns false if an action was already taken
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Caps the text frames a session reads per second, checked before decoding
pub struct InboundLimiter(RateLimiter<NotKeyed, InMemoryState, DefaultClock>);

impl InboundLimiter {
    pub fn per_second(frames: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(frames).unwrap_or(NonZeroU32::MIN));
        Self(RateLimiter::direct(quota))
    }

    /// False once the connection is over its budget
    pub fn admit(&self) -> bool {
        self.0.check().is_ok()
    }
}

#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub kind: ConnectionKind,
    pub format: EnumFormat,
    pub gate: ActionGate,
    pub heartbeat: Mutex<Heartbeat>,
    last_game_state_id: Mutex<Option<String>>,
    outbound: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(
        kind: ConnectionKind,
        format: EnumFormat,
    ) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let handle = Arc::new(Self {
            id: Uuid::new_v4(),
            kind,
            format,
            gate: ActionGate::default(),
            heartbeat: Mutex::new(Heartbeat::new()),
            last_game_state_id: Mutex::new(None),
            outbound,
        });
        (handle, rx)
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        match self.kind {
            ConnectionKind::Player(id) => Some(id),
            ConnectionKind::Spectator => None,
        }
    }

    pub fn is_spectator(&self) -> bool {
        self.kind == ConnectionKind::Spectator
    }

    /// Encode in this connection's format and queue without waiting.
    /// Returns the queued byte count, zero if the packet was dropped.
    pub fn send(&self, packet: &Packet) -> usize {
        let text = packet.encode(self.format);
        let len = text.len();
        match self.outbound.try_send(Outbound::Text(text)) {
            Ok(()) => len,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection_id = %self.id, packet = packet.packet_type.name(), "outbound queue full, dropping packet");
                0
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(connection_id = %self.id, "outbound queue closed");
                0
            }
        }
    }

    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    pub fn set_last_game_state_id(&self, id: &str) {
        *self.last_game_state_id.lock() = Some(id.to_owned());
    }

    /// True when the client answered an older state than the last one sent
    pub fn is_stale(&self, game_state_id: Option<&str>) -> bool {
        match (self.last_game_state_id.lock().as_deref(), game_state_id) {
            (Some(sent), Some(received)) => sent != received,
            _ => false,
        }
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: Arc<ConnectionHandle>) {
        self.connections.insert(connection.id, connection);
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, c)| c)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&id).map(|c| c.value().clone())
    }

    pub fn player(&self, player_id: PlayerId) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .iter()
            .find(|c| c.player_id() == Some(player_id))
            .map(|c| c.value().clone())
    }

    /// Snapshot of every registered connection
    pub fn all(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|c| c.value().clone()).collect()
    }

    pub fn player_count(&self) -> usize {
        self.connections.iter().filter(|c| !c.is_spectator()).count()
    }

    pub fn spectator_count(&self) -> usize {
        self.connections.iter().filter(|c| c.is_spectator()).count()
    }

    /// Queue the same packet to everyone
    pub fn broadcast(&self, packet: &Packet) {
        for connection in self.connections.iter() {
            connection.send(packet);
        }
    }

    pub fn reset_gates(&self) {
        for connection in self.connections.iter() {
            connection.gate.reset();
        }
    }

    pub fn close_all(&self) {
        for connection in self.connections.iter() {
            connection.close();
        }
    }
}
