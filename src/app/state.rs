//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameMatch, MatchHandle};
use crate::ws::session::ConnectionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub match_handle: MatchHandle,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Build the state together with the match it fronts. The caller spawns
    /// [`GameMatch::run`].
    pub fn new(config: Config) -> (Self, GameMatch) {
        let config = Arc::new(config);
        let connections = Arc::new(ConnectionRegistry::new());
        let (game_match, match_handle) = GameMatch::new(config.settings.clone(), connections.clone());

        let state = Self {
            config,
            match_handle,
            connections,
        };
        (state, game_match)
    }
}
