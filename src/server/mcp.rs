//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Line-delimited communication over stdio (or any async reader/writer)

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};
use crate::error::McpError;

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0"). Missing is treated as wrong, not
    /// as unparseable.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null when the request could not be parsed).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP server information returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// MCP server capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change dynamically.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the MCP initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// MCP tool definition with JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Unique tool name (used in tool calls).
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type (e.g., "text").
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP Server running over stdio.
///
/// Handles JSON-RPC 2.0 messages, one per line, for MCP protocol
/// communication with clients.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Diagnosis engine MCP server starting...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Notifications get no response
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                writer.write_all(response_json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request.
    /// Returns None for notifications (requests without id).
    async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        if request.jsonrpc != "2.0" && !is_notification {
            return Some(JsonRpcResponse::error(
                request.id,
                -32600,
                format!("Invalid request: unsupported jsonrpc version {}", request.jsonrpc),
            ));
        }

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" | "notifications/cancelled" => {
                debug!(method = %request.method, "Received notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "diagnosis-engine".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");
        JsonRpcResponse::success(id, json!({ "tools": all_tools() }))
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (content, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (
                        ToolResultContent {
                            content_type: "text".to_string(),
                            text,
                        },
                        None,
                    )
                }
                Err(e) => (
                    ToolResultContent {
                        content_type: "text".to_string(),
                        text: tool_error_text(&e),
                    },
                    Some(true),
                ),
            };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// Operational failures already carry their code prefix; everything else is
/// reported as a generic error.
fn tool_error_text(err: &McpError) -> String {
    match err {
        McpError::ExecutionFailed { message } => message.clone(),
        other => format!("Error: {}", other),
    }
}

/// Every tool this server exposes, in listing order.
pub fn all_tools() -> Vec<Tool> {
    vec![
        get_validate_tool(),
        get_upload_tool(),
        get_list_tool(),
        get_get_tool(),
        get_history_tool(),
        get_set_active_tool(),
        get_active_trees_tool(),
        get_session_start_tool(),
        get_session_answer_tool(),
        get_session_advance_tool(),
        get_session_back_tool(),
        get_session_restart_tool(),
        get_session_current_tool(),
        get_session_end_tool(),
    ]
}

fn documents_schema() -> Value {
    json!({
        "description": "One diagnosis tree document or an array of them",
        "oneOf": [
            { "type": "object" },
            { "type": "array", "items": { "type": "object" } }
        ]
    })
}

fn session_only_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "session_id": {
                "type": "string",
                "description": "Id returned by diagnosis_session_start"
            }
        },
        "required": ["session_id"]
    })
}

fn tree_id_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

fn locale_schema() -> Value {
    json!({
        "type": "string",
        "enum": ["ko", "en"],
        "description": "Language for node text and actions (defaults to the server locale)"
    })
}

fn get_validate_tool() -> Tool {
    Tool {
        name: "diagnosis_validate".to_string(),
        description: "Validate one or more diagnosis tree documents without saving them. Returns errors and warnings per tree.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "documents": documents_schema()
            },
            "required": ["documents"]
        }),
    }
}

fn get_upload_tool() -> Tool {
    Tool {
        name: "diagnosis_upload".to_string(),
        description: "Validate and save diagnosis trees. Each valid tree becomes its next version; invalid trees are reported and not saved.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "documents": documents_schema(),
                "updated_by": {
                    "type": "string",
                    "description": "Author recorded on the saved versions"
                }
            },
            "required": ["documents"]
        }),
    }
}

fn get_list_tool() -> Tool {
    Tool {
        name: "diagnosis_list".to_string(),
        description: "List the latest version of every tree with its activation state and current validation findings.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

fn get_get_tool() -> Tool {
    Tool {
        name: "diagnosis_get".to_string(),
        description: "Get the summary of one tree, optionally with its full document.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tree_id": tree_id_schema("Tree to fetch"),
                "include_document": {
                    "type": "boolean",
                    "description": "Include the stored document",
                    "default": false
                }
            },
            "required": ["tree_id"]
        }),
    }
}

fn get_history_tool() -> Tool {
    Tool {
        name: "diagnosis_history".to_string(),
        description: "List every saved version of a tree, newest first. Re-upload an older document to roll back.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tree_id": tree_id_schema("Tree whose history to list")
            },
            "required": ["tree_id"]
        }),
    }
}

fn get_set_active_tool() -> Tool {
    Tool {
        name: "diagnosis_set_active".to_string(),
        description: "Activate or deactivate a tree for technicians. Version and content are unchanged.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tree_id": tree_id_schema("Tree to toggle"),
                "is_active": {
                    "type": "boolean",
                    "description": "New activation state"
                }
            },
            "required": ["tree_id", "is_active"]
        }),
    }
}

fn get_active_trees_tool() -> Tool {
    Tool {
        name: "diagnosis_active_trees".to_string(),
        description: "List active, valid trees that support a vehicle model, optionally narrowed to a symptom category.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "model": {
                    "type": "string",
                    "description": "Vehicle model name"
                },
                "category": {
                    "type": "string",
                    "description": "Symptom category filter"
                },
                "locale": locale_schema()
            },
            "required": ["model"]
        }),
    }
}

fn get_session_start_tool() -> Tool {
    Tool {
        name: "diagnosis_session_start".to_string(),
        description: "Start a guided diagnosis on an active tree. Returns the session id and the start node.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "tree_id": tree_id_schema("Active tree to walk"),
                "locale": locale_schema()
            },
            "required": ["tree_id"]
        }),
    }
}

fn get_session_answer_tool() -> Tool {
    Tool {
        name: "diagnosis_session_answer".to_string(),
        description: "Answer the current question node with yes or no.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Id returned by diagnosis_session_start"
                },
                "answer": {
                    "oneOf": [
                        { "type": "boolean" },
                        { "type": "string", "enum": ["yes", "no"] }
                    ],
                    "description": "true/\"yes\" or false/\"no\""
                }
            },
            "required": ["session_id", "answer"]
        }),
    }
}

fn get_session_advance_tool() -> Tool {
    Tool {
        name: "diagnosis_session_advance".to_string(),
        description: "Continue past the current step node.".to_string(),
        input_schema: session_only_schema(),
    }
}

fn get_session_back_tool() -> Tool {
    Tool {
        name: "diagnosis_session_back".to_string(),
        description: "Go back one node. Does nothing at the start node.".to_string(),
        input_schema: session_only_schema(),
    }
}

fn get_session_restart_tool() -> Tool {
    Tool {
        name: "diagnosis_session_restart".to_string(),
        description: "Return to the start node, discarding the walk so far.".to_string(),
        input_schema: session_only_schema(),
    }
}

fn get_session_current_tool() -> Tool {
    Tool {
        name: "diagnosis_session_current".to_string(),
        description: "Show the current node, the path taken and progress.".to_string(),
        input_schema: session_only_schema(),
    }
}

fn get_session_end_tool() -> Tool {
    Tool {
        name: "diagnosis_session_end".to_string(),
        description: "Discard a diagnosis session.".to_string(),
        input_schema: session_only_schema(),
    }
}
