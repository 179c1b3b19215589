//! Tracker configuration parsed from environment variables.
//!
//! Every knob has a default so an empty environment yields a working
//! tracker pointed at a local backend.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_RESTORE_THRESHOLD_SECS: u64 = 15 * 60;
pub const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_SLEEP_THRESHOLD_SECS: u64 = 5 * 60;
pub const DEFAULT_BACKLOG_CAPACITY: usize = 200;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_JOIN_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_STATE_DIR: &str = ".collab-telemetry";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid boolean for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: String },
    #[error("{key} must not be empty")]
    Empty { key: String },
}

/// HTTP timeouts for the backend transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL the backend endpoints are resolved against.
    pub api_base_url: String,
    /// Bearer token attached to every backend call, if any.
    pub auth_token: Option<String>,
    pub heartbeat_interval: Duration,
    /// Maximum staleness of a stored descriptor that may still be restored.
    pub restore_threshold: Duration,
    /// Idle time after which the live session is ended.
    pub inactivity_timeout: Duration,
    /// Hidden gap treated as a system sleep on resume.
    pub sleep_threshold: Duration,
    pub backlog_capacity: usize,
    /// Retries after the first failed delivery before an event is buffered.
    pub max_retries: u32,
    /// Linear backoff step between delivery retries.
    pub retry_base_delay: Duration,
    /// Window in which repeated joins of one project are not re-sent.
    pub join_cooldown: Duration,
    pub timeouts: HttpTimeouts,
    /// Start a session implicitly when an event is tracked without one.
    pub auto_start: bool,
    /// Directory for the file-backed session store (binary only).
    pub state_dir: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            auth_token: None,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            restore_threshold: Duration::from_secs(DEFAULT_RESTORE_THRESHOLD_SECS),
            inactivity_timeout: Duration::from_secs(DEFAULT_INACTIVITY_TIMEOUT_SECS),
            sleep_threshold: Duration::from_secs(DEFAULT_SLEEP_THRESHOLD_SECS),
            backlog_capacity: DEFAULT_BACKLOG_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            join_cooldown: Duration::from_secs(DEFAULT_JOIN_COOLDOWN_SECS),
            timeouts: HttpTimeouts {
                request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            auto_start: true,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl TrackerConfig {
    /// Build typed tracker config from environment variables.
    ///
    /// All optional:
    /// - `TRACKER_API_BASE_URL`: default `http://localhost:3000/api`
    /// - `TRACKER_AUTH_TOKEN`: bearer token, unset by default
    /// - `TRACKER_HEARTBEAT_INTERVAL_SECS`: default 30
    /// - `TRACKER_RESTORE_THRESHOLD_SECS`: default 900
    /// - `TRACKER_INACTIVITY_TIMEOUT_SECS`: default 1800
    /// - `TRACKER_SLEEP_THRESHOLD_SECS`: default 300
    /// - `TRACKER_BACKLOG_CAPACITY`: default 200
    /// - `TRACKER_MAX_RETRIES`: default 3
    /// - `TRACKER_RETRY_BASE_DELAY_MS`: default 1000
    /// - `TRACKER_JOIN_COOLDOWN_SECS`: default 60
    /// - `TRACKER_REQUEST_TIMEOUT_SECS`: default 10
    /// - `TRACKER_CONNECT_TIMEOUT_SECS`: default 5
    /// - `TRACKER_AUTO_START`: `true` (default) or `false`
    /// - `TRACKER_STATE_DIR`: default `.collab-telemetry`
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable booleans, an empty base URL, or a
    /// zero heartbeat interval, backlog capacity, or inactivity timeout.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("TRACKER_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned())
            .trim()
            .trim_end_matches('/')
            .to_owned();
        if api_base_url.is_empty() {
            return Err(ConfigError::Empty { key: "TRACKER_API_BASE_URL".into() });
        }

        let auth_token = std::env::var("TRACKER_AUTH_TOKEN")
            .ok()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        let heartbeat_secs = nonzero("TRACKER_HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS)?;
        let inactivity_secs = nonzero("TRACKER_INACTIVITY_TIMEOUT_SECS", DEFAULT_INACTIVITY_TIMEOUT_SECS)?;
        let backlog_capacity = nonzero("TRACKER_BACKLOG_CAPACITY", DEFAULT_BACKLOG_CAPACITY)?;

        Ok(Self {
            api_base_url,
            auth_token,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            restore_threshold: Duration::from_secs(env_parse(
                "TRACKER_RESTORE_THRESHOLD_SECS",
                DEFAULT_RESTORE_THRESHOLD_SECS,
            )),
            inactivity_timeout: Duration::from_secs(inactivity_secs),
            sleep_threshold: Duration::from_secs(env_parse("TRACKER_SLEEP_THRESHOLD_SECS", DEFAULT_SLEEP_THRESHOLD_SECS)),
            backlog_capacity,
            max_retries: env_parse("TRACKER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_base_delay: Duration::from_millis(env_parse("TRACKER_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS)),
            join_cooldown: Duration::from_secs(env_parse("TRACKER_JOIN_COOLDOWN_SECS", DEFAULT_JOIN_COOLDOWN_SECS)),
            timeouts: HttpTimeouts {
                request: Duration::from_secs(env_parse("TRACKER_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
                connect: Duration::from_secs(env_parse("TRACKER_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            },
            auto_start: env_bool("TRACKER_AUTO_START")?.unwrap_or(true),
            state_dir: std::env::var("TRACKER_STATE_DIR").map_or_else(|_| PathBuf::from(DEFAULT_STATE_DIR), PathBuf::from),
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn nonzero<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Copy + PartialEq + Default,
{
    let value = env_parse(key, default);
    if value == T::default() {
        return Err(ConfigError::Zero { key: key.to_owned() });
    }
    Ok(value)
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { key: key.to_owned(), value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
