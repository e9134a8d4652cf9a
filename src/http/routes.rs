//! HTTP route definitions

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::{player_handler, reject, spectator_handler};
use crate::ws::packet::EnumFormat;
use crate::ws::session::RejectReason;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(player_handler))
        .route("/spectator", get(spectator_handler))
        .route("/health", get(health_handler))
        .fallback(fallback_handler)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// `*` allows any origin, otherwise a comma-separated list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }
    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    game_status: &'static str,
    tick: u64,
    players: usize,
    spectators: usize,
    timestamp: DateTime<Utc>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        game_status: state.match_handle.status().name(),
        tick: state.match_handle.tick(),
        players: state.connections.player_count(),
        spectators: state.connections.spectator_count(),
        timestamp: Utc::now(),
    })
}

/// Websocket clients on an unknown path are told so over the socket
async fn fallback_handler(ws: Option<WebSocketUpgrade>, uri: Uri) -> Response {
    match ws {
        Some(ws) => ws.on_upgrade(|socket| {
            reject(socket, RejectReason::InvalidUrlPath, EnumFormat::default())
        }),
        None => AppError::NotFound(uri.path().to_owned()).into_response(),
    }
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(path) => (StatusCode::NOT_FOUND, format!("no route for {path}")),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
