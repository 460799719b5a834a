use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::tree::Locale;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Tree catalog configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// How long the active-tree cache may serve a snapshot. Zero disables it.
    pub active_cache_ttl: Duration,
    /// Locale used when a caller does not ask for one.
    pub default_locale: Locale,
    /// Recorded as `updated_by` when an upload names no author.
    pub default_author: String,
    /// Traversal sessions untouched for this long are discarded. Zero keeps
    /// them until ended.
    pub session_idle_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/diagnosis.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let default_locale = match env::var("DEFAULT_LOCALE") {
            Ok(raw) => raw.parse::<Locale>().map_err(|e| AppError::Config {
                message: format!("DEFAULT_LOCALE: {}", e),
            })?,
            Err(_) => Locale::default(),
        };

        let catalog = CatalogConfig {
            active_cache_ttl: Duration::from_secs(
                env::var("ACTIVE_TREE_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            default_locale,
            default_author: env::var("UPLOAD_DEFAULT_AUTHOR")
                .unwrap_or_else(|_| "admin".to_string()),
            session_idle_ttl: Duration::from_secs(
                env::var("SESSION_IDLE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
        };

        Ok(Config {
            database,
            logging,
            catalog,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/diagnosis.db"),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            active_cache_ttl: Duration::from_secs(60),
            default_locale: Locale::default(),
            default_author: "admin".to_string(),
            session_idle_ttl: Duration::from_secs(1800),
        }
    }
}
