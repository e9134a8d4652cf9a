//! Game lifecycle and the authoritative tick loop
//!
//! [`GameMatch`] is the only writer of the [`World`]. Connections talk to it
//! through [`MatchCommand`]s on an mpsc channel and hear back through their
//! own outbound queues. Domain events are republished on a broadcast
//! channel for anything that wants to observe the game.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ServerSettings;
use crate::ws::packet::{Packet, PacketType};
use crate::ws::payload::{LobbySettings, SerializationView};
use crate::ws::session::{
    ConnectionHandle, ConnectionId, ConnectionKind, ConnectionRegistry, RejectReason,
};

use super::action::{Action, ActionError};
use super::events::GameEvent;
use super::player::{color_for, Player, PlayerId, PlayerKind};
use super::snapshot::{SnapshotBuilder, SnapshotStats};
use super::tank::TankType;
use super::world::World;

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GameStatus {
    /// Waiting for players
    InLobby = 0,
    /// Everyone joined, waiting for clients to be ready
    Starting = 1,
    Running = 2,
    Ended = 3,
}

impl GameStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => GameStatus::InLobby,
            1 => GameStatus::Starting,
            2 => GameStatus::Running,
            _ => GameStatus::Ended,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameStatus::InLobby => "inLobby",
            GameStatus::Starting => "starting",
            GameStatus::Running => "running",
            GameStatus::Ended => "ended",
        }
    }
}

/// Validated handshake fields of a joining player
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub nickname: String,
    pub kind: PlayerKind,
    pub team_name: Option<String>,
    pub tank_type: Option<TankType>,
}

#[derive(Debug)]
pub enum MatchCommand {
    Join {
        request: JoinRequest,
        connection: Arc<ConnectionHandle>,
        reply: oneshot::Sender<Result<(), RejectReason>>,
    },
    Spectate {
        connection: Arc<ConnectionHandle>,
    },
    Leave {
        connection: ConnectionId,
    },
    Action {
        player_id: PlayerId,
        action: Action,
    },
    Ready {
        player_id: PlayerId,
    },
    Ping {
        player_id: PlayerId,
        ms: u32,
    },
    LobbyDataRequest {
        connection: ConnectionId,
    },
    GameStatusRequest {
        connection: ConnectionId,
    },
}

/// Counters readable outside the match task
#[derive(Debug, Default)]
struct MatchShared {
    status: AtomicU8,
    tick: AtomicU64,
    player_count: AtomicUsize,
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    pub commands: mpsc::Sender<MatchCommand>,
    pub events: broadcast::Sender<GameEvent>,
    shared: Arc<MatchShared>,
}

impl MatchHandle {
    pub fn status(&self) -> GameStatus {
        GameStatus::from_u8(self.shared.status.load(Ordering::Relaxed))
    }

    pub fn tick(&self) -> u64 {
        self.shared.tick.load(Ordering::Relaxed)
    }

    pub fn player_count(&self) -> usize {
        self.shared.player_count.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }
}

/// The authoritative game
pub struct GameMatch {
    world: World,
    settings: ServerSettings,
    status: GameStatus,
    commands: mpsc::Receiver<MatchCommand>,
    events: broadcast::Sender<GameEvent>,
    connections: Arc<ConnectionRegistry>,
    shared: Arc<MatchShared>,
    /// At most one intent per player for the next tick
    pending: HashMap<PlayerId, Action>,
    ready: HashSet<PlayerId>,
    game_state_id: String,
    /// Players admitted so far, for colour assignment
    joined: usize,
    /// Cleared by a simulation fault
    valid: bool,
    stats: SnapshotStats,
    #[cfg(test)]
    fault_at: Option<u64>,
}

impl GameMatch {
    pub fn new(settings: ServerSettings, connections: Arc<ConnectionRegistry>) -> (Self, MatchHandle) {
        let (commands_tx, commands) = mpsc::channel(256);
        let (events, _) = broadcast::channel(256);
        let shared = Arc::new(MatchShared::default());

        let world = World::generate(settings.grid_dimension, settings.ruleset, settings.seed);
        info!(
            seed = settings.seed,
            dim = settings.grid_dimension,
            ruleset = settings.ruleset.name(),
            zones = world.grid.zones.len(),
            "map generated"
        );

        let status = if settings.sandbox {
            GameStatus::Running
        } else {
            GameStatus::InLobby
        };

        let handle = MatchHandle {
            commands: commands_tx,
            events: events.clone(),
            shared: shared.clone(),
        };

        let game_match = Self {
            world,
            settings,
            status,
            commands,
            events,
            connections,
            shared,
            pending: HashMap::new(),
            ready: HashSet::new(),
            game_state_id: Uuid::new_v4().to_string(),
            joined: 0,
            valid: true,
            stats: SnapshotStats::default(),
            #[cfg(test)]
            fault_at: None,
        };
        game_match.sync_shared();

        (game_match, handle)
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Serve commands and tick until the game ends
    pub async fn run(mut self) {
        info!(status = self.status.name(), "match loop started");

        let mut ticker = interval(self.settings.broadcast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("command channel closed, ending match");
                        break;
                    };
                    self.handle(command);
                    if self.eager_tick_due() {
                        if self.step() {
                            break;
                        }
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if self.status == GameStatus::Running {
                        self.process_commands();
                        if self.step() {
                            break;
                        }
                    }
                }
            }
        }

        self.finish();
    }

    /// Drain commands queued since the last tick
    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.handle(command);
        }
    }

    fn handle(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Join {
                request,
                connection,
                reply,
            } => self.handle_join(request, connection, reply),
            MatchCommand::Spectate { connection } => self.handle_spectate(connection),
            MatchCommand::Leave { connection } => self.handle_leave(connection),
            MatchCommand::Action { player_id, action } => self.queue_action(player_id, action),
            MatchCommand::Ready { player_id } => self.handle_ready(player_id),
            MatchCommand::Ping { player_id, ms } => {
                if let Some(player) = self.world.player_mut(player_id) {
                    player.ping_ms = ms;
                }
            }
            MatchCommand::LobbyDataRequest { connection } => {
                if let Some(connection) = self.connections.get(connection) {
                    self.send_lobby(&connection);
                }
            }
            MatchCommand::GameStatusRequest { connection } => {
                if let Some(connection) = self.connections.get(connection) {
                    connection.send(&self.status_packet());
                }
            }
        }
    }

    fn handle_join(
        &mut self,
        request: JoinRequest,
        connection: Arc<ConnectionHandle>,
        reply: oneshot::Sender<Result<(), RejectReason>>,
    ) {
        let Some(player_id) = connection.player_id() else {
            warn!(connection_id = %connection.id, "join from a non-player connection");
            return;
        };

        let player = match self.admit(player_id, request) {
            Ok(player) => player,
            Err(reason) => {
                info!(%reason, "join rejected");
                let _ = reply.send(Err(reason));
                return;
            }
        };

        info!(
            player_id = %player_id,
            nickname = %player.nickname,
            team = ?player.team,
            "player joined"
        );
        self.world.add_player(player);
        self.joined += 1;
        self.connections.register(connection.clone());
        connection.send(&Packet::new(PacketType::ConnectionAccepted));
        let _ = reply.send(Ok(()));
        self.sync_shared();

        if self.status == GameStatus::Running {
            self.send_lobby(&connection);
            connection.send(&Packet::new(PacketType::GameStarted));
        } else {
            self.broadcast_lobby();
            self.maybe_start();
        }
    }

    /// Checks that depend on the current roster, in rejection order
    fn admit(&self, player_id: PlayerId, request: JoinRequest) -> Result<Player, RejectReason> {
        let sandbox = self.settings.sandbox;
        if self.status != GameStatus::InLobby && !sandbox {
            return Err(RejectReason::GameInProgress);
        }
        if !sandbox && self.world.players.len() >= self.settings.number_of_players {
            return Err(RejectReason::GameFull);
        }

        let nickname = self.unique_nickname(request.nickname)?;
        let mut player = Player::new(player_id, nickname, request.kind, color_for(self.joined));

        if self.world.ruleset().is_team() {
            let team_name = request.team_name.ok_or(RejectReason::MissingTeamName)?;
            match self.world.team(&team_name) {
                Some(team) => {
                    if team.is_full() {
                        return Err(RejectReason::TeamsFull);
                    }
                    let taken = request.tank_type.is_some()
                        && team
                            .members
                            .iter()
                            .filter_map(|m| self.world.player(*m))
                            .any(|p| p.tank_type == request.tank_type);
                    if taken {
                        return Err(RejectReason::TankTypeTaken);
                    }
                }
                None if self.world.teams.len() >= self.settings.number_of_teams => {
                    return Err(RejectReason::TeamsFull);
                }
                None => {}
            }
            player.team = Some(team_name);
            player.tank_type = request.tank_type;
        }

        Ok(player)
    }

    /// Sandbox games rename duplicates instead of rejecting them
    fn unique_nickname(&self, nickname: String) -> Result<String, RejectReason> {
        let taken = |name: &str| self.world.players.iter().any(|p| p.nickname == name);
        if !taken(&nickname) {
            return Ok(nickname);
        }
        if !self.settings.sandbox {
            return Err(RejectReason::NicknameExists);
        }
        let renamed = (2..).map(|n| format!("{nickname}{n}")).find(|c| !taken(c));
        Ok(renamed.unwrap_or(nickname))
    }

    fn handle_spectate(&mut self, connection: Arc<ConnectionHandle>) {
        info!(connection_id = %connection.id, "spectator joined");
        self.connections.register(connection.clone());
        connection.send(&Packet::new(PacketType::ConnectionAccepted));
        self.send_lobby(&connection);
        if self.status == GameStatus::Running {
            connection.send(&Packet::new(PacketType::GameStarted));
        }
    }

    fn handle_leave(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.unregister(connection_id) else {
            return;
        };
        let ConnectionKind::Player(player_id) = connection.kind else {
            debug!(connection_id = %connection_id, "spectator left");
            return;
        };

        self.pending.remove(&player_id);
        self.ready.remove(&player_id);
        if let Some(player) = self.world.remove_player(player_id) {
            info!(player_id = %player_id, nickname = %player.nickname, "player left");
        }
        self.sync_shared();

        match self.status {
            GameStatus::InLobby => self.broadcast_lobby(),
            GameStatus::Starting => self.maybe_begin(),
            GameStatus::Running | GameStatus::Ended => {}
        }
    }

    fn handle_ready(&mut self, player_id: PlayerId) {
        if self.status != GameStatus::Starting {
            if let Some(connection) = self.connections.player(player_id) {
                connection.send(&Packet::message(
                    PacketType::InvalidPacketUsageError,
                    "the game is not starting",
                ));
            }
            return;
        }
        self.ready.insert(player_id);
        self.maybe_begin();
    }

    fn maybe_start(&mut self) {
        if self.status != GameStatus::InLobby
            || self.world.players.len() < self.settings.number_of_players
        {
            return;
        }
        self.status = GameStatus::Starting;
        self.ready.clear();
        self.sync_shared();
        info!(players = self.world.players.len(), "game starting");
        self.connections.broadcast(&Packet::new(PacketType::GameStarting));
    }

    /// Start ticking once every remaining player is ready
    fn maybe_begin(&mut self) {
        let all_ready = !self.world.players.is_empty()
            && self.world.players.iter().all(|p| self.ready.contains(&p.id));
        if self.status != GameStatus::Starting || !all_ready {
            return;
        }
        self.status = GameStatus::Running;
        self.sync_shared();
        info!(players = self.world.players.len(), "game started");
        self.connections.broadcast(&Packet::new(PacketType::GameStarted));
    }

    fn queue_action(&mut self, player_id: PlayerId, action: Action) {
        let Some(connection) = self.connections.player(player_id) else {
            return;
        };
        if self.status != GameStatus::Running {
            connection.send(&Packet::message(
                PacketType::InvalidPacketUsageError,
                "actions are only accepted while the game is running",
            ));
            return;
        }

        let dead = self.world.grid.tank(player_id).map_or(true, |t| t.is_dead());
        if dead && !action.is_pass() {
            connection.send(&Packet::new(PacketType::ActionIgnoredDueToDeadWarning));
            return;
        }

        if action.is_go_to() && self.world.ruleset().is_team() {
            self.pending.insert(player_id, action);
        } else if self.pending.contains_key(&player_id) {
            connection.send(&Packet::new(PacketType::PlayerAlreadyMadeActionWarning));
        } else {
            self.pending.insert(player_id, action);
        }
    }

    fn eager_tick_due(&self) -> bool {
        self.settings.eager_broadcast
            && self.status == GameStatus::Running
            && !self.world.players.is_empty()
            && self.world.players.iter().all(|p| self.pending.contains_key(&p.id))
    }

    /// Advance one tick and broadcast. Returns true when the game is over.
    fn step(&mut self) -> bool {
        let started = Instant::now();
        let tick = self.world.tick() + 1;

        match panic::catch_unwind(AssertUnwindSafe(|| self.run_tick())) {
            Ok(rejected) => {
                for (player_id, err) in rejected {
                    self.report_action_error(player_id, &err);
                }
            }
            Err(_) => {
                error!(tick, "simulation fault, game marked invalid");
                self.valid = false;
                self.pending.clear();
            }
        }

        for event in self.world.drain_events() {
            // no subscribers is fine
            let _ = self.events.send(event);
        }

        self.broadcast_state();
        self.world.reset_tick_properties();
        self.connections.reset_gates();
        self.sync_shared();

        let elapsed = started.elapsed();
        if elapsed > self.settings.broadcast_interval {
            warn!(
                tick,
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = self.settings.broadcast_interval.as_millis() as u64,
                "tick overran broadcast interval"
            );
        }

        let over = self.settings.ticks.is_some_and(|limit| self.world.tick() >= limit);
        if over {
            self.status = GameStatus::Ended;
        }
        over
    }

    /// Apply queued intents in roster order, then simulate
    fn run_tick(&mut self) -> Vec<(PlayerId, ActionError)> {
        let mut rejected = Vec::new();
        let order: Vec<PlayerId> = self.world.players.iter().map(|p| p.id).collect();
        for player_id in order {
            if let Some(action) = self.pending.remove(&player_id) {
                if let Err(err) = self.world.apply_action(player_id, action) {
                    rejected.push((player_id, err));
                }
            }
        }
        self.pending.clear();

        self.world.update(1.0);
        #[cfg(test)]
        if self.fault_at == Some(self.world.tick()) {
            panic!("injected fault at tick {}", self.world.tick());
        }
        rejected
    }

    fn report_action_error(&self, player_id: PlayerId, err: &ActionError) {
        let Some(connection) = self.connections.player(player_id) else {
            return;
        };
        let packet = match err {
            ActionError::TankDead => Packet::new(PacketType::ActionIgnoredDueToDeadWarning),
            ActionError::TargetOutOfBounds { .. } | ActionError::TargetIsWall { .. } => {
                Packet::message(PacketType::InvalidPacketUsageError, err.to_string())
            }
            ActionError::UnknownPlayer(_) => {
                debug!(player_id = %player_id, error = %err, "action dropped");
                return;
            }
        };
        connection.send(&packet);
    }

    fn broadcast_state(&mut self) {
        self.game_state_id = Uuid::new_v4().to_string();
        let connections = self.connections.all();
        let mut bytes = 0;

        for connection in &connections {
            let view = match connection.kind {
                ConnectionKind::Player(id) => SerializationView::Player(id),
                ConnectionKind::Spectator => SerializationView::Spectator,
            };
            let payload =
                SnapshotBuilder::game_state(&self.world, &self.game_state_id, &view, connection.format);
            match Packet::with_payload(PacketType::GameState, &payload) {
                Ok(packet) => {
                    connection.set_last_game_state_id(&self.game_state_id);
                    bytes += connection.send(&packet);
                }
                Err(e) => error!(error = %e, "failed to encode game state"),
            }
        }

        self.stats.record(connections.len(), bytes);
    }

    fn finish(&mut self) {
        self.status = GameStatus::Ended;
        self.sync_shared();

        let payload = SnapshotBuilder::game_end(&self.world, self.valid);
        match Packet::with_payload(PacketType::GameEnded, &payload) {
            Ok(packet) => self.connections.broadcast(&packet),
            Err(e) => error!(error = %e, "failed to encode game end"),
        }
        info!(
            ticks = self.world.tick(),
            valid = self.valid,
            snapshots = self.stats.total_snapshots,
            bytes = self.stats.total_bytes,
            "game ended"
        );
        self.connections.close_all();
    }

    fn lobby_settings(&self) -> LobbySettings {
        LobbySettings {
            grid_dimension: self.world.grid.dim(),
            number_of_players: self.settings.number_of_players,
            seed: self.world.seed(),
            broadcast_interval: self.settings.broadcast_interval.as_millis() as u64,
            ruleset: self.world.ruleset().name().to_owned(),
            sandbox_mode: self.settings.sandbox,
            eager_broadcast: self.settings.eager_broadcast,
            ticks: self.settings.ticks,
            match_name: self.settings.match_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }

    fn send_lobby(&self, connection: &ConnectionHandle) {
        let payload = SnapshotBuilder::lobby(
            &self.world,
            &self.lobby_settings(),
            connection.player_id(),
            connection.format,
        );
        match Packet::with_payload(PacketType::LobbyData, &payload) {
            Ok(packet) => {
                connection.send(&packet);
            }
            Err(e) => error!(error = %e, "failed to encode lobby data"),
        }
    }

    fn broadcast_lobby(&self) {
        for connection in self.connections.all() {
            self.send_lobby(&connection);
        }
    }

    fn status_packet(&self) -> Packet {
        match self.status {
            GameStatus::InLobby => Packet::new(PacketType::GameNotStarted),
            GameStatus::Starting => Packet::new(PacketType::GameStarting),
            GameStatus::Running => Packet::new(PacketType::GameInProgress),
            GameStatus::Ended => {
                let payload = SnapshotBuilder::game_end(&self.world, self.valid);
                Packet::with_payload(PacketType::GameEnded, &payload)
                    .unwrap_or_else(|_| Packet::new(PacketType::InternalError))
            }
        }
    }

    fn sync_shared(&self) {
        self.shared.status.store(self.status as u8, Ordering::Relaxed);
        self.shared.tick.store(self.world.tick(), Ordering::Relaxed);
        self.shared
            .player_count
            .store(self.world.players.len(), Ordering::Relaxed);
    }
}
