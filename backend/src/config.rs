//! Configuration management for the Stockroom server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STOCKROOM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Log output configuration
    pub logging: LoggingConfig,

    /// List paging limits
    pub pagination: PaginationConfig,

    /// Audit trail read windows
    pub change_log: ChangeLogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Apply pending migrations at startup even outside development
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Token lifetime in hours
    pub token_expiry_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ChangeLogConfig {
    /// Window used when a request does not name one
    pub default_window_days: i32,

    /// Number of users listed in the activity summary
    pub summary_top_users: i64,

    /// Number of entries listed as recent activity
    pub summary_recent: i64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKROOM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", false)?
            .set_default("jwt.token_expiry_hours", 24)?
            .set_default("logging.format", "pretty")?
            .set_default("pagination.default_limit", i64::from(shared::DEFAULT_PAGE_LIMIT))?
            .set_default("pagination.max_limit", i64::from(shared::MAX_PAGE_LIMIT))?
            .set_default("change_log.default_window_days", 30)?
            .set_default("change_log.summary_top_users", 5)?
            .set_default("change_log.summary_recent", 20)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKROOM__ prefix)
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn should_run_migrations(&self) -> bool {
        self.is_development() || self.database.run_migrations
    }
}
