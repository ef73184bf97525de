use crate::error::{AppError, Result};

/// Fixed key of the singleton goal configuration.
pub const GOALS_ID: &str = "main";

/// Leaderboard snapshot interval (seconds) when SNAPSHOT_INTERVAL_SECS is unset.
pub const SNAPSHOT_INTERVAL_SECS: u64 = 300;

/// Snapshot rows kept per seller when SNAPSHOT_RETENTION is unset.
pub const SNAPSHOT_RETENTION: i64 = 500;

/// Default page size for history endpoints.
pub const HISTORY_DEFAULT_LIMIT: i64 = 100;

/// Upper bound for any `limit` query parameter.
pub const HISTORY_MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// How often the leaderboard is snapshotted (SNAPSHOT_INTERVAL_SECS)
    pub snapshot_interval_secs: u64,
    /// Snapshot rows kept per seller, older ones are pruned (SNAPSHOT_RETENTION)
    pub snapshot_retention: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "arena.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            snapshot_interval_secs: std::env::var("SNAPSHOT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(SNAPSHOT_INTERVAL_SECS),
            snapshot_retention: std::env::var("SNAPSHOT_RETENTION")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(SNAPSHOT_RETENTION),
        })
    }
}
