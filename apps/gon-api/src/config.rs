//! API configuration module.
//!
//! Configuration is loaded from `GON_*` environment variables with fallback
//! to defaults. `main` loads a `.env` file first when one exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address (default: 0.0.0.0:8080)
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// How long a writer waits for SQLite's lock, in milliseconds
    pub db_busy_timeout_ms: u64,

    /// JWT secret key for verifying (and issuing) tokens
    pub jwt_secret: String,

    /// JWT lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Upper bound for one workflow, retries included, in milliseconds
    pub request_timeout_ms: u64,

    /// Whole-transaction retries after SQLITE_BUSY
    pub conflict_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_path: "./gon.db".to_string(),
            db_max_connections: 8,
            db_busy_timeout_ms: 5_000,
            jwt_secret: "gon-dev-secret-change-in-production".to_string(),
            jwt_lifetime_secs: 8 * 3600,
            request_timeout_ms: 10_000,
            conflict_retries: 5,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            bind_addr: env::var("GON_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_path: env::var("GON_DATABASE_PATH").unwrap_or(defaults.database_path),
            db_max_connections: parse_var("GON_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_busy_timeout_ms: parse_var("GON_DB_BUSY_TIMEOUT_MS", defaults.db_busy_timeout_ms)?,
            // In production this MUST be set via environment variable
            jwt_secret: env::var("GON_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_lifetime_secs: parse_var("GON_JWT_LIFETIME_SECS", defaults.jwt_lifetime_secs)?,
            request_timeout_ms: parse_var("GON_REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            conflict_retries: parse_var("GON_CONFLICT_RETRIES", defaults.conflict_retries)?,
        };

        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("GON_JWT_SECRET".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("GON_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn db_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.db_busy_timeout_ms)
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
