//! # Diagnosis Engine
//!
//! Guided vehicle diagnosis over versioned yes/no decision trees, served to
//! clients through the Model Context Protocol (MCP).
//!
//! ## Features
//!
//! - **Tree validation**: required fields, node shape, dangling references,
//!   cycles and unreachable nodes, reported all at once
//! - **Versioned catalog**: every upload becomes the next version; activation
//!   survives re-uploads; full revision history
//! - **Guided traversal**: per-technician sessions with answer, advance,
//!   back and restart
//! - **Localization**: Korean and English node text resolved per request
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (stdio) → TreeCatalog → SQLite
//!                    ↓
//!           TraversalSession (in memory)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use diagnosis_engine::{AppState, Config, McpServer};
//! use diagnosis_engine::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, storage));
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

/// Version and activation management.
pub mod catalog;
/// Command-line administration.
pub mod cli;
/// Configuration management.
pub mod config;
/// Longest-path estimate for progress display.
pub mod depth;
/// Error types and result aliases for the application.
pub mod error;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;
/// Traversal sessions over a resolved tree.
pub mod traversal;
/// Tree schema: upload documents and the resolved model.
pub mod tree;
/// Tree validator.
pub mod validation;

pub use catalog::TreeCatalog;
pub use config::Config;
pub use error::{AppError, AppResult, EngineError, EngineResult};
pub use server::{AppState, McpServer, SharedState};
pub use traversal::{Answer, TraversalSession};
pub use tree::{DiagnosisTree, Locale, Node, TreeDocument};
pub use validation::{validate, ValidationReport};
