use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Tree not found: {tree_id}")]
    TreeNotFound { tree_id: String },

    #[error("Stored tree {tree_id} is corrupt: {message}")]
    Serialization { tree_id: String, message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Operational failures of the diagnosis engine.
///
/// These are returned to the immediate caller so a UI can render a specific
/// message; see [`EngineError::code`] for the stable discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Tree {tree_id} failed validation: {}", .errors.join("; "))]
    InvalidTree { tree_id: String, errors: Vec<String> },

    #[error("Tree not found: {tree_id}")]
    NotFound { tree_id: String },

    #[error("Node {node_id} is not a question")]
    NotAQuestion { node_id: String },

    #[error("Node {node_id} is not a step")]
    NotAStep { node_id: String },

    #[error("Node {from} points at missing node {to}")]
    DanglingEdge { from: String, to: String },

    #[error("Traversal session not found: {session_id}")]
    SessionNotFound { session_id: String },
}

impl EngineError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidTree { .. } => "INVALID_TREE",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::NotAQuestion { .. } => "NOT_A_QUESTION",
            EngineError::NotAStep { .. } => "NOT_A_STEP",
            EngineError::DanglingEdge { .. } => "DANGLING_EDGE",
            EngineError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::Engine(engine) => format!("{}: {}", engine.code(), engine),
            AppError::Storage(StorageError::TreeNotFound { tree_id }) => {
                format!("NOT_FOUND: Tree not found: {}", tree_id)
            }
            other => other.to_string(),
        };
        McpError::ExecutionFailed { message }
    }
}

impl From<EngineError> for McpError {
    fn from(err: EngineError) -> Self {
        AppError::from(err).into()
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "bad locale".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: bad locale");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::TreeNotFound {
            tree_id: "battery-check".to_string(),
        };
        assert_eq!(err.to_string(), "Tree not found: battery-check");

        let err = StorageError::Serialization {
            tree_id: "t1".to_string(),
            message: "expected array".to_string(),
        };
        assert_eq!(err.to_string(), "Stored tree t1 is corrupt: expected array");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_engine_error_codes() {
        let cases = [
            (
                EngineError::InvalidTree {
                    tree_id: "t".into(),
                    errors: vec![],
                },
                "INVALID_TREE",
            ),
            (EngineError::NotFound { tree_id: "t".into() }, "NOT_FOUND"),
            (
                EngineError::NotAQuestion {
                    node_id: "s1".into(),
                },
                "NOT_A_QUESTION",
            ),
            (EngineError::NotAStep { node_id: "q1".into() }, "NOT_A_STEP"),
            (
                EngineError::DanglingEdge {
                    from: "q1".into(),
                    to: "gone".into(),
                },
                "DANGLING_EDGE",
            ),
            (
                EngineError::SessionNotFound {
                    session_id: "abc".into(),
                },
                "SESSION_NOT_FOUND",
            ),
        ];

        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_invalid_tree_display_joins_errors() {
        let err = EngineError::InvalidTree {
            tree_id: "t1".to_string(),
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "Tree t1 failed validation: a; b");
    }

    #[test]
    fn test_engine_error_conversion_to_mcp_error_keeps_code() {
        let mcp_err: McpError = EngineError::NotFound {
            tree_id: "t9".to_string(),
        }
        .into();
        assert!(matches!(mcp_err, McpError::ExecutionFailed { .. }));
        assert!(mcp_err.to_string().contains("NOT_FOUND: Tree not found: t9"));
    }

    #[test]
    fn test_storage_not_found_maps_to_not_found_code() {
        let app_err: AppError = StorageError::TreeNotFound {
            tree_id: "t2".to_string(),
        }
        .into();
        let mcp_err: McpError = app_err.into();
        assert!(mcp_err.to_string().contains("NOT_FOUND"));
    }

    #[test]
    fn test_mcp_error_display() {
        let err = McpError::UnknownTool {
            tool_name: "nonexistent".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown tool: nonexistent");

        let err = McpError::InvalidParameters {
            tool_name: "diagnosis_upload".to_string(),
            message: "missing documents".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid parameters for diagnosis_upload: missing documents"
        );
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let app_err: AppError = StorageError::Query {
            message: "x".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }
}
