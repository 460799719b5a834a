//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state, including open traversal sessions

mod handlers;
mod mcp;
mod sessions;

pub use handlers::*;
pub use mcp::*;
pub use sessions::SessionRegistry;

use std::sync::Arc;

use crate::catalog::TreeCatalog;
use crate::config::Config;
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Versioned tree catalog backed by SQLite.
    pub catalog: TreeCatalog,
    /// Open traversal sessions.
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        tracing::info!(
            cache_ttl_secs = config.catalog.active_cache_ttl.as_secs(),
            default_locale = %config.catalog.default_locale,
            session_idle_ttl_secs = config.catalog.session_idle_ttl.as_secs(),
            "AppState initializing"
        );

        let catalog = TreeCatalog::new(storage, &config.catalog);
        let sessions = SessionRegistry::new(config.catalog.session_idle_ttl);

        Self {
            config,
            catalog,
            sessions,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
