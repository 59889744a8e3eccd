//! Configuration management for the server.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Redis URL backing the distributed lock. When absent the server falls
    /// back to an in-process lock store (single-instance deployments only).
    pub redis_url: Option<String>,
    /// Shared operator secret for admin operations (register/approve/suspend)
    pub master_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let redis_url = env::var("REDIS_URL").ok();

        let master_secret =
            env::var("MASTER_SYNC_SECRET").map_err(|_| ConfigError::MissingMasterSecret)?;

        Ok(Self {
            host,
            port,
            database_url,
            redis_url,
            master_secret,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("MASTER_SYNC_SECRET environment variable is required")]
    MissingMasterSecret,

    #[error("Invalid PORT value")]
    InvalidPort,
}
