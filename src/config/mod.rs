//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden with
//! `CAMPUS_FORUM_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub forum: ForumConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (cookie sessions need an explicit origin)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// File path or `:memory:` for SQLite, connection URL for MySQL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/campus_forum.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// In-memory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Entry TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_capacity() -> u64 {
    10_000
}

fn default_ttl() -> u64 {
    3600
}

/// Session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

/// Forum ranking settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumConfig {
    #[serde(default)]
    pub heat: HeatConfig,
}

/// Weights of the heat score. The defaults reproduce the production ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatConfig {
    #[serde(default = "default_interaction_weight")]
    pub interaction_weight: f64,
    #[serde(default = "default_freshness_weight")]
    pub freshness_weight: f64,
    #[serde(default = "default_like_weight")]
    pub like_weight: f64,
    #[serde(default = "default_comment_weight")]
    pub comment_weight: f64,
    #[serde(default = "default_collect_weight")]
    pub collect_weight: f64,
    /// Full-freshness window in days
    #[serde(default = "default_fresh_days")]
    pub fresh_days: i64,
    /// Days after which freshness reaches zero
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            interaction_weight: default_interaction_weight(),
            freshness_weight: default_freshness_weight(),
            like_weight: default_like_weight(),
            comment_weight: default_comment_weight(),
            collect_weight: default_collect_weight(),
            fresh_days: default_fresh_days(),
            stale_days: default_stale_days(),
        }
    }
}

fn default_interaction_weight() -> f64 {
    0.7
}

fn default_freshness_weight() -> f64 {
    0.3
}

fn default_like_weight() -> f64 {
    1.0
}

fn default_comment_weight() -> f64 {
    2.0
}

fn default_collect_weight() -> f64 {
    3.0
}

/// Upper bound for either heat window
pub const MAX_HEAT_WINDOW_DAYS: i64 = 3650;

fn default_fresh_days() -> i64 {
    7
}

fn default_stale_days() -> i64 {
    30
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the defaults; invalid YAML is an error
    /// carrying the line and column of the failure.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides:
    /// - CAMPUS_FORUM_SERVER_HOST
    /// - CAMPUS_FORUM_SERVER_PORT
    /// - CAMPUS_FORUM_SERVER_CORS_ORIGIN
    /// - CAMPUS_FORUM_DATABASE_DRIVER
    /// - CAMPUS_FORUM_DATABASE_URL
    /// - CAMPUS_FORUM_CACHE_TTL_SECONDS
    /// - CAMPUS_FORUM_SESSION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CAMPUS_FORUM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("CAMPUS_FORUM_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("CAMPUS_FORUM_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(driver) = std::env::var("CAMPUS_FORUM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("CAMPUS_FORUM_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("CAMPUS_FORUM_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(days) = std::env::var("CAMPUS_FORUM_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.session_days = days;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let heat = &self.forum.heat;
        if heat.fresh_days <= 0 || heat.stale_days < heat.fresh_days {
            return Err(ConfigError::ValidationError(format!(
                "forum.heat windows must satisfy 0 < fresh_days <= stale_days (got {} and {})",
                heat.fresh_days, heat.stale_days
            )));
        }
        if heat.stale_days > MAX_HEAT_WINDOW_DAYS {
            return Err(ConfigError::ValidationError(format!(
                "forum.heat.stale_days must be at most {} (got {})",
                MAX_HEAT_WINDOW_DAYS, heat.stale_days
            )));
        }
        if self.auth.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "CAMPUS_FORUM_SERVER_HOST",
    "CAMPUS_FORUM_SERVER_PORT",
    "CAMPUS_FORUM_SERVER_CORS_ORIGIN",
    "CAMPUS_FORUM_DATABASE_DRIVER",
    "CAMPUS_FORUM_DATABASE_URL",
    "CAMPUS_FORUM_CACHE_TTL_SECONDS",
    "CAMPUS_FORUM_SESSION_DAYS",
];

#[cfg(test)]
fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn server_section_round_trips_through_file(
            host in "[a-z][a-z0-9]{0,10}",
            port in 1u16..=65535,
        ) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  host: \"{}\"\n  port: {}\n", host, port).unwrap();

            let config = Config::load(file.path()).unwrap();
            prop_assert_eq!(config.server.host, host);
            prop_assert_eq!(config.server.port, port);
            prop_assert_eq!(config.forum.heat, HeatConfig::default());
        }

        #[test]
        fn env_port_overrides_file_port(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", file_port).unwrap();
            std::env::set_var("CAMPUS_FORUM_SERVER_PORT", env_port.to_string());

            let config = Config::load_with_env(file.path()).unwrap();
            clear_env();

            prop_assert_eq!(config.server.port, env_port);
        }
    }
}
