//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::game::ruleset::Ruleset;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// `pretty` or `json`
    pub log_format: LogFormat,
    /// Allowed client origin for CORS
    pub client_origin: String,
    pub settings: ServerSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the game core consumes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerSettings {
    pub grid_dimension: usize,
    pub number_of_players: usize,
    /// Game ends after this many ticks, never when absent
    pub ticks: Option<u64>,
    pub broadcast_interval: Duration,
    pub seed: u64,
    pub ruleset: Ruleset,
    pub number_of_teams: usize,
    pub sandbox: bool,
    /// Tick as soon as every player has acted
    pub eager_broadcast: bool,
    pub match_name: Option<String>,
    pub join_code: Option<String>,
    pub no_pong_timeout: Duration,
    /// Text frames a single connection may send per second
    pub inbound_rate_limit: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grid_dimension: 24,
            number_of_players: 2,
            ticks: None,
            broadcast_interval: Duration::from_millis(100),
            seed: 0,
            ruleset: Ruleset::Solo,
            number_of_teams: 2,
            sandbox: false,
            eager_broadcast: false,
            match_name: None,
            join_code: None,
            no_pong_timeout: Duration::from_millis(5000),
            inbound_rate_limit: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let defaults = ServerSettings::default();
        let ruleset = match lookup("RULESET") {
            Some(raw) => Ruleset::parse(&raw).ok_or(ConfigError::Invalid("RULESET"))?,
            None => defaults.ruleset,
        };

        let settings = ServerSettings {
            grid_dimension: parse_or(&lookup, "GRID_DIMENSION", defaults.grid_dimension)?,
            number_of_players: parse_or(&lookup, "NUMBER_OF_PLAYERS", defaults.number_of_players)?,
            ticks: parse_opt(&lookup, "TICKS")?,
            broadcast_interval: Duration::from_millis(parse_or(
                &lookup,
                "BROADCAST_INTERVAL_MS",
                100u64,
            )?),
            seed: match parse_opt(&lookup, "SEED")? {
                Some(seed) => seed,
                None => rand::random(),
            },
            ruleset,
            number_of_teams: parse_or(&lookup, "NUMBER_OF_TEAMS", defaults.number_of_teams)?,
            sandbox: parse_bool(&lookup, "SANDBOX")?,
            eager_broadcast: parse_bool(&lookup, "EAGER_BROADCAST")?,
            match_name: lookup("MATCH_NAME").filter(|s| !s.is_empty()),
            join_code: lookup("JOIN_CODE").filter(|s| !s.is_empty()),
            no_pong_timeout: Duration::from_millis(parse_or(&lookup, "NO_PONG_TIMEOUT_MS", 5000u64)?),
            inbound_rate_limit: parse_or(&lookup, "INBOUND_RATE_LIMIT", defaults.inbound_rate_limit)?,
        };

        if settings.grid_dimension < 4 {
            return Err(ConfigError::Invalid("GRID_DIMENSION"));
        }
        if settings.number_of_players == 0 {
            return Err(ConfigError::Invalid("NUMBER_OF_PLAYERS"));
        }
        if settings.broadcast_interval.is_zero() {
            return Err(ConfigError::Invalid("BROADCAST_INTERVAL_MS"));
        }
        if settings.inbound_rate_limit == 0 {
            return Err(ConfigError::Invalid("INBOUND_RATE_LIMIT"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            settings,
        })
    }
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|raw| raw.trim().parse().map_err(|_| ConfigError::Invalid(key)))
        .transpose()
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("0") | Some("false") | Some("no") => Ok(false),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some(_) => Err(ConfigError::Invalid(key)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
