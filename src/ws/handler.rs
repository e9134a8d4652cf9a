//! WebSocket upgrade handlers and per-connection sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::packet::{EnumFormat, Packet, PacketType, ProtocolError};
use super::payload::{ActionPacket, ConnectionRejectedPayload};
use super::ping::run_heartbeat;
use super::session::{
    ConnectionHandle, ConnectionId, ConnectionKind, InboundLimiter, Outbound, RejectReason,
};
use crate::app::AppState;
use crate::config::ServerSettings;
use crate::game::player::PlayerKind;
use crate::game::ruleset::Ruleset;
use crate::game::tank::TankType;
use crate::game::{GameStatus, JoinRequest, MatchCommand};

/// Raw handshake query string
pub type QueryParams = HashMap<String, String>;

/// A player handshake that passed the static checks
#[derive(Debug)]
pub struct PlayerHandshake {
    pub request: JoinRequest,
    pub format: EnumFormat,
}

/// Checks that need only the query string and the settings.
/// Roster-dependent checks happen in the match.
pub fn validate_join(
    params: &QueryParams,
    settings: &ServerSettings,
) -> Result<PlayerHandshake, RejectReason> {
    check_join_code(params, settings)?;

    let nickname = params
        .get("nickname")
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .ok_or(RejectReason::MissingNickname)?
        .to_uppercase();

    let kind = params
        .get("playerType")
        .and_then(|raw| PlayerKind::parse(raw))
        .ok_or(RejectReason::InvalidPlayerType)?;

    let (team_name, tank_type) = if settings.ruleset == Ruleset::Team {
        let team_name = params
            .get("teamName")
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .ok_or(RejectReason::MissingTeamName)?
            .to_owned();
        let tank_type = params
            .get("tankType")
            .and_then(|raw| TankType::parse(raw))
            .ok_or(RejectReason::InvalidTankType)?;
        (Some(team_name), Some(tank_type))
    } else {
        (None, None)
    };

    Ok(PlayerHandshake {
        request: JoinRequest {
            nickname,
            kind,
            team_name,
            tank_type,
        },
        format: parse_format(params)?,
    })
}

fn check_join_code(params: &QueryParams, settings: &ServerSettings) -> Result<(), RejectReason> {
    match &settings.join_code {
        Some(code) if params.get("joinCode") != Some(code) => Err(RejectReason::InvalidJoinCode),
        _ => Ok(()),
    }
}

fn parse_format(params: &QueryParams) -> Result<EnumFormat, RejectReason> {
    match params.get("enumSerializationFormat") {
        None => Ok(EnumFormat::default()),
        Some(raw) => EnumFormat::parse(raw).ok_or(RejectReason::InvalidEnumFormat),
    }
}

/// Player endpoint
pub async fn player_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<QueryParams>,
    State(state): State<AppState>,
) -> Response {
    let handshake = validate_join(&params, &state.config.settings);
    let format = parse_format(&params).unwrap_or_default();

    ws.on_upgrade(move |socket| async move {
        match handshake {
            Ok(handshake) => handle_player(socket, handshake, state).await,
            Err(reason) => reject(socket, reason, format).await,
        }
    })
}

/// Spectator endpoint
pub async fn spectator_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<QueryParams>,
    State(state): State<AppState>,
) -> Response {
    let checked = check_join_code(&params, &state.config.settings).and_then(|_| parse_format(&params));
    let format = parse_format(&params).unwrap_or_default();

    ws.on_upgrade(move |socket| async move {
        match checked {
            Ok(format) => handle_spectator(socket, format, state).await,
            Err(reason) => reject(socket, reason, format).await,
        }
    })
}

/// Refuse an upgraded socket with a reason and close it
pub async fn reject(mut socket: WebSocket, reason: RejectReason, format: EnumFormat) {
    info!(%reason, "connection rejected");
    let payload = ConnectionRejectedPayload {
        reason: reason.to_string(),
    };
    let packet = Packet::with_payload(PacketType::ConnectionRejected, &payload)
        .unwrap_or_else(|_| Packet::new(PacketType::InternalError));
    let _ = socket.send(Message::Text(packet.encode(format))).await;
    let _ = socket.send(Message::Close(None)).await;
}

async fn handle_player(mut socket: WebSocket, handshake: PlayerHandshake, state: AppState) {
    let player_id = Uuid::new_v4();
    let format = handshake.format;
    let (connection, outbound) = ConnectionHandle::new(ConnectionKind::Player(player_id), format);
    let commands = state.match_handle.commands.clone();

    let (reply, accepted) = oneshot::channel();
    let join = MatchCommand::Join {
        request: handshake.request,
        connection: connection.clone(),
        reply,
    };
    if commands.send(join).await.is_err() {
        warn!(player_id = %player_id, "match is gone, dropping connection");
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    match accepted.await {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => return reject(socket, reason, format).await,
        Err(_) => {
            error!(player_id = %player_id, "join went unanswered");
            let packet = Packet::message(PacketType::InternalError, "join failed");
            let _ = socket.send(Message::Text(packet.encode(format))).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    }

    info!(player_id = %player_id, connection_id = %connection.id, "player connection accepted");
    let heartbeat = tokio::spawn(run_heartbeat(
        connection.clone(),
        commands,
        state.config.settings.no_pong_timeout,
    ));

    run_session(socket, connection, outbound, state).await;
    heartbeat.abort();

    info!(player_id = %player_id, "player connection closed");
}

async fn handle_spectator(socket: WebSocket, format: EnumFormat, state: AppState) {
    let (connection, outbound) = ConnectionHandle::new(ConnectionKind::Spectator, format);
    let spectate = MatchCommand::Spectate {
        connection: connection.clone(),
    };
    if state.match_handle.commands.send(spectate).await.is_err() {
        warn!("match is gone, dropping spectator");
        return;
    }

    info!(connection_id = %connection.id, "spectator connection accepted");
    run_session(socket, connection, outbound, state).await;
}

/// Read packets until the socket or the writer ends, then leave the match
async fn run_session(
    socket: WebSocket,
    connection: Arc<ConnectionHandle>,
    outbound: mpsc::Receiver<Outbound>,
    state: AppState,
) {
    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(write_outbound(sink, outbound, connection.id));
    let limiter = InboundLimiter::per_second(state.config.settings.inbound_rate_limit);
    let commands = state.match_handle.commands.clone();
    let context = RouteContext::from_state(&state);

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(result) = incoming else {
                    break;
                };
                match result {
                    Ok(Message::Text(text)) => {
                        if !limiter.admit() {
                            warn!(connection_id = %connection.id, "rate limited inbound packet");
                            continue;
                        }
                        let context = context.with_status(state.match_handle.status());
                        match route_packet(&text, &connection, &context) {
                            Ok(Some(command)) => {
                                if commands.send(command).await.is_err() {
                                    debug!(connection_id = %connection.id, "command channel closed");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                debug!(connection_id = %connection.id, error = %e, "packet rejected");
                                connection.send(&Packet::message(e.packet_type(), e.to_string()));
                            }
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        connection.send(&Packet::message(
                            PacketType::InvalidPacketTypeError,
                            "binary frames are not supported",
                        ));
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        debug!(connection_id = %connection.id, "client initiated close");
                        break;
                    }
                    Err(e) => {
                        debug!(connection_id = %connection.id, error = %e, "websocket error");
                        break;
                    }
                }
            }
            _ = &mut writer => break,
        }
    }

    let _ = commands
        .send(MatchCommand::Leave {
            connection: connection.id,
        })
        .await;
    writer.abort();
}

/// Drain the outbound queue into the socket
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    connection_id: ConnectionId,
) {
    while let Some(message) = outbound.recv().await {
        match message {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(connection_id = %connection_id, error = %e, "websocket send failed");
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// What the router needs to know about the game
#[derive(Debug, Clone, Copy)]
struct RouteContext {
    status: GameStatus,
    ruleset: Ruleset,
    sandbox: bool,
}

impl RouteContext {
    fn from_state(state: &AppState) -> Self {
        Self {
            status: state.match_handle.status(),
            ruleset: state.config.settings.ruleset,
            sandbox: state.config.settings.sandbox,
        }
    }

    fn with_status(self, status: GameStatus) -> Self {
        Self { status, ..self }
    }
}

/// Decode one inbound packet. Warnings go straight to the connection;
/// errors are returned for the caller to report.
fn route_packet(
    text: &str,
    connection: &ConnectionHandle,
    context: &RouteContext,
) -> Result<Option<MatchCommand>, ProtocolError> {
    let packet = Packet::decode(text)?;

    match packet.packet_type {
        PacketType::Pong => {
            let rtt = connection.heartbeat.lock().pong_received(Instant::now());
            Ok(connection
                .player_id()
                .zip(rtt)
                .map(|(player_id, rtt)| MatchCommand::Ping {
                    player_id,
                    ms: u32::try_from(rtt.as_millis()).unwrap_or(u32::MAX),
                }))
        }
        PacketType::LobbyDataRequest => Ok(Some(MatchCommand::LobbyDataRequest {
            connection: connection.id,
        })),
        PacketType::GameStatusRequest => Ok(Some(MatchCommand::GameStatusRequest {
            connection: connection.id,
        })),
        PacketType::ReadyToReceiveGameState => {
            Ok(connection.player_id().map(|player_id| MatchCommand::Ready { player_id }))
        }
        packet_type if packet_type.is_action() => route_action(&packet, connection, context),
        other => Err(ProtocolError::InvalidUsage(format!(
            "{} is not accepted from clients",
            other.name()
        ))),
    }
}

fn route_action(
    packet: &Packet,
    connection: &ConnectionHandle,
    context: &RouteContext,
) -> Result<Option<MatchCommand>, ProtocolError> {
    let Some(player_id) = connection.player_id() else {
        return Err(ProtocolError::InvalidUsage("spectators cannot act".into()));
    };
    if context.status != GameStatus::Running {
        return Err(ProtocolError::InvalidUsage(
            "actions are only accepted while the game is running".into(),
        ));
    }
    if packet.packet_type == PacketType::GoTo && !context.ruleset.is_team() {
        return Err(ProtocolError::InvalidUsage("goTo requires team rules".into()));
    }
    if packet.packet_type == PacketType::ChargeAbility && !context.sandbox {
        return Err(ProtocolError::InvalidUsage(
            "chargeAbility is only available in sandbox mode".into(),
        ));
    }

    let parsed = ActionPacket::parse(packet)?;

    let supersedes = parsed.action.is_go_to() && context.ruleset.is_team();
    if !connection.gate.try_acquire() && !supersedes {
        connection.send(&Packet::new(PacketType::PlayerAlreadyMadeActionWarning));
        return Ok(None);
    }
    if connection.is_stale(parsed.game_state_id.as_deref()) {
        connection.send(&Packet::new(PacketType::SlowResponseWarning));
    }

    Ok(Some(MatchCommand::Action {
        player_id,
        action: parsed.action,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::action::Action;
    use crate::game::direction::MovementDirection;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn team_settings() -> ServerSettings {
        ServerSettings {
            ruleset: Ruleset::Team,
            ..ServerSettings::default()
        }
    }

    fn running(ruleset: Ruleset) -> RouteContext {
        RouteContext {
            status: GameStatus::Running,
            ruleset,
            sandbox: false,
        }
    }

    fn player() -> (Arc<ConnectionHandle>, mpsc::Receiver<Outbound>) {
        ConnectionHandle::new(ConnectionKind::Player(Uuid::new_v4()), EnumFormat::String)
    }

    fn queued_types(rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Outbound::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            types.push(value["type"].as_str().unwrap().to_owned());
        }
        types
    }

    #[test]
    fn valid_solo_handshake() {
        let handshake = validate_join(
            &params(&[("nickname", "alice"), ("playerType", "bot"), ("enumSerializationFormat", "int")]),
            &ServerSettings::default(),
        )
        .unwrap();
        assert_eq!(handshake.request.nickname, "ALICE");
        assert_eq!(handshake.request.kind, PlayerKind::Bot);
        assert_eq!(handshake.format, EnumFormat::Int);
        assert!(handshake.request.team_name.is_none());
    }

    #[test]
    fn rejections_follow_check_order() {
        let gated = ServerSettings {
            join_code: Some("1234".into()),
            ..team_settings()
        };
        let cases: Vec<(Vec<(&str, &str)>, RejectReason)> = vec![
            (vec![("nickname", "a")], RejectReason::InvalidJoinCode),
            (vec![("joinCode", "1234")], RejectReason::MissingNickname),
            (vec![("joinCode", "1234"), ("nickname", " ")], RejectReason::MissingNickname),
            (
                vec![("joinCode", "1234"), ("nickname", "a"), ("playerType", "robot")],
                RejectReason::InvalidPlayerType,
            ),
            (
                vec![("joinCode", "1234"), ("nickname", "a"), ("playerType", "human")],
                RejectReason::MissingTeamName,
            ),
            (
                vec![
                    ("joinCode", "1234"),
                    ("nickname", "a"),
                    ("playerType", "human"),
                    ("teamName", "red"),
                    ("tankType", "medium"),
                ],
                RejectReason::InvalidTankType,
            ),
            (
                vec![
                    ("joinCode", "1234"),
                    ("nickname", "a"),
                    ("playerType", "human"),
                    ("teamName", "red"),
                    ("tankType", "heavy"),
                    ("enumSerializationFormat", "xml"),
                ],
                RejectReason::InvalidEnumFormat,
            ),
        ];
        for (query, expected) in cases {
            assert_eq!(
                validate_join(&params(&query), &gated).unwrap_err(),
                expected,
                "{query:?}"
            );
        }
    }

    #[test]
    fn second_action_in_a_tick_is_warned() {
        let (conn, mut rx) = player();
        let context = running(Ruleset::Solo);
        let movement = r#"{"type":"movement","payload":{"direction":"forward"}}"#;

        let first = route_packet(movement, &conn, &context).unwrap();
        assert!(matches!(
            first,
            Some(MatchCommand::Action {
                action: Action::Move(MovementDirection::Forward),
                ..
            })
        ));
        assert!(route_packet(r#"{"type":"pass"}"#, &conn, &context).unwrap().is_none());
        assert_eq!(queued_types(&mut rx), vec!["playerAlreadyMadeActionWarning"]);

        conn.gate.reset();
        assert!(route_packet(r#"{"type":"pass"}"#, &conn, &context).unwrap().is_some());
    }

    #[test]
    fn team_goto_supersedes_earlier_action() {
        let (conn, mut rx) = player();
        let context = running(Ruleset::Team);
        route_packet(r#"{"type":"pass"}"#, &conn, &context).unwrap();
        let goto = route_packet(r#"{"type":"goTo","payload":{"x":3,"y":4}}"#, &conn, &context).unwrap();
        assert!(matches!(
            goto,
            Some(MatchCommand::Action {
                action: Action::GoTo(_),
                ..
            })
        ));
        assert!(queued_types(&mut rx).is_empty());

        let solo = running(Ruleset::Solo);
        let err = route_packet(r#"{"type":"goTo","payload":{"x":3,"y":4}}"#, &conn, &solo).unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketUsageError);
    }

    #[test]
    fn stale_game_state_id_is_warned_but_forwarded() {
        let (conn, mut rx) = player();
        conn.set_last_game_state_id("current");
        let command = route_packet(
            r#"{"type":"movement","payload":{"direction":"forward","gameStateId":"previous"}}"#,
            &conn,
            &running(Ruleset::Solo),
        )
        .unwrap();
        assert!(command.is_some());
        assert_eq!(queued_types(&mut rx), vec!["slowResponseWarning"]);
    }

    #[test]
    fn phase_and_role_errors() {
        let (conn, _rx) = player();
        let lobby = RouteContext {
            status: GameStatus::InLobby,
            ..running(Ruleset::Solo)
        };
        let err = route_packet(r#"{"type":"pass"}"#, &conn, &lobby).unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketUsageError);

        let (spectator, _rx) = ConnectionHandle::new(ConnectionKind::Spectator, EnumFormat::Int);
        let err = route_packet(r#"{"type":67}"#, &spectator, &running(Ruleset::Solo)).unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketUsageError);

        let err = route_packet(r#"{"type":"gameState","payload":{}}"#, &conn, &lobby).unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketUsageError);

        let err = route_packet(r#"{"type":"nope"}"#, &conn, &lobby).unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketTypeError);

        let err = route_packet(
            r#"{"type":"chargeAbility","payload":{"abilityType":"useLaser"}}"#,
            &conn,
            &running(Ruleset::Solo),
        )
        .unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPacketUsageError);
    }

    #[test]
    fn invalid_enum_value_is_a_payload_error() {
        let (conn, _rx) = player();
        let err = route_packet(
            r#"{"type":"movement","payload":{"direction":"sideways"}}"#,
            &conn,
            &running(Ruleset::Solo),
        )
        .unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPayloadError);
        assert!(!conn.gate.is_set());
    }

    #[test]
    fn pass_with_payload_is_rejected() {
        let (conn, _rx) = player();
        let err = route_packet(
            r#"{"type":"pass","payload":{"gameStateId":"current"}}"#,
            &conn,
            &running(Ruleset::Solo),
        )
        .unwrap_err();
        assert_eq!(err.packet_type(), PacketType::InvalidPayloadError);
        assert!(!conn.gate.is_set());
    }

    #[test]
    fn pong_reports_round_trip() {
        let (conn, _rx) = player();
        let context = running(Ruleset::Solo);
        assert!(route_packet(r#"{"type":"pong"}"#, &conn, &context).unwrap().is_none());

        conn.heartbeat.lock().ping_sent(Instant::now());
        let command = route_packet(r#"{"type":"pong"}"#, &conn, &context).unwrap();
        assert!(matches!(command, Some(MatchCommand::Ping { .. })));
    }
}
