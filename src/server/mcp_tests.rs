//! Unit tests for MCP protocol implementation.
//!
//! Tests JSON-RPC 2.0 request/response handling, tool definitions,
//! and tool routing against an in-memory catalog.

use std::collections::HashSet;
use std::sync::Arc;

use super::*;
use crate::config::{CatalogConfig, Config, DatabaseConfig, LoggingConfig};
use crate::server::AppState;
use crate::storage::SqliteStorage;
use crate::tree::fixtures::scenario;
use serde_json::json;

async fn test_server() -> McpServer {
    let config = Config {
        database: DatabaseConfig::default(),
        logging: LoggingConfig::default(),
        catalog: CatalogConfig::default(),
    };
    let storage = SqliteStorage::new_in_memory().await.unwrap();
    McpServer::new(Arc::new(AppState::new(config, storage)))
}

fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(id)),
        method: method.to_string(),
        params: Some(params),
    }
}

/// Call a tool and return `(is_error, text)`.
async fn call(server: &McpServer, name: &str, arguments: Value) -> (bool, String) {
    let response = server
        .handle_request(request(
            1,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        ))
        .await
        .unwrap();
    let result = response.result.expect("tools/call always returns a result");
    let is_error = result["isError"].as_bool().unwrap_or(false);
    let text = result["content"][0]["text"].as_str().unwrap().to_string();
    (is_error, text)
}

async fn call_ok(server: &McpServer, name: &str, arguments: Value) -> Value {
    let (is_error, text) = call(server, name, arguments).await;
    assert!(!is_error, "{} failed: {}", name, text);
    serde_json::from_str(&text).unwrap()
}

// ============================================================================
// JsonRpcResponse tests
// ============================================================================

#[test]
fn test_jsonrpc_response_success_with_id() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

    assert_eq!(response.jsonrpc, "2.0");
    assert_eq!(response.id, json!(1));
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["result"], "ok");
}

#[test]
fn test_jsonrpc_response_error_without_id() {
    let response = JsonRpcResponse::error(None, -32700, "Parse error");

    assert_eq!(response.id, Value::Null);
    assert!(response.result.is_none());
    assert_eq!(response.error.unwrap().code, -32700);
}

#[test]
fn test_jsonrpc_response_serialization_omits_absent_fields() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"test": true}));
    let serialized = serde_json::to_string(&response).unwrap();

    assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
    assert!(serialized.contains("\"result\""));
    assert!(!serialized.contains("\"error\""));
}

#[test]
fn test_tool_call_result_serialization() {
    let result = ToolCallResult {
        content: vec![ToolResultContent {
            content_type: "text".to_string(),
            text: "hello".to_string(),
        }],
        is_error: Some(true),
    };
    let value = serde_json::to_value(result).unwrap();
    assert_eq!(value["content"][0]["type"], "text");
    assert_eq!(value["isError"], true);
}

// ============================================================================
// Tool definitions
// ============================================================================

#[test]
fn test_all_tools_are_unique_and_have_object_schemas() {
    let tools = all_tools();
    assert_eq!(tools.len(), 14);

    let names: HashSet<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), tools.len());

    for tool in &tools {
        assert!(tool.name.starts_with("diagnosis_"), "{}", tool.name);
        assert!(!tool.description.is_empty());
        assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
    }
}

#[test]
fn test_tool_error_text_keeps_engine_code_first() {
    let err: McpError = crate::error::EngineError::NotFound {
        tree_id: "t1".to_string(),
    }
    .into();
    assert_eq!(tool_error_text(&err), "NOT_FOUND: Tree not found: t1");

    let err = McpError::UnknownTool {
        tool_name: "x".to_string(),
    };
    assert_eq!(tool_error_text(&err), "Error: Unknown tool: x");
}

// ============================================================================
// Request handling
// ============================================================================

#[tokio::test]
async fn test_initialize_reports_server_name() {
    let server = test_server().await;
    let response = server
        .handle_request(request(1, "initialize", json!({})))
        .await
        .unwrap();
    let result = response.result.unwrap();

    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "diagnosis-engine");
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let server = test_server().await;
    let notification = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "notifications/initialized".to_string(),
        params: None,
    };
    assert!(server.handle_request(notification).await.is_none());

    let unknown = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: None,
        method: "something/else".to_string(),
        params: None,
    };
    assert!(server.handle_request(unknown).await.is_none());
}

#[tokio::test]
async fn test_unknown_method_is_error() {
    let server = test_server().await;
    let response = server
        .handle_request(request(7, "resources/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response.id, json!(7));
    assert_eq!(response.error.unwrap().code, -32601);
}

#[test]
fn test_request_without_jsonrpc_field_parses() {
    let request: JsonRpcRequest =
        serde_json::from_value(json!({"id": 1, "method": "ping"})).unwrap();
    assert_eq!(request.jsonrpc, "");
    assert_eq!(request.id, Some(json!(1)));
}

#[tokio::test]
async fn test_ping() {
    let server = test_server().await;
    let response = server
        .handle_request(request(2, "ping", json!({})))
        .await
        .unwrap();
    assert_eq!(response.result.unwrap(), json!({}));
}

#[tokio::test]
async fn test_tools_call_without_params_is_invalid() {
    let server = test_server().await;
    let response = server
        .handle_request(JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(3)),
            method: "tools/call".to_string(),
            params: None,
        })
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_unknown_tool_is_error_result() {
    let server = test_server().await;
    let (is_error, text) = call(&server, "diagnosis_unknown", json!({})).await;
    assert!(is_error);
    assert_eq!(text, "Error: Unknown tool: diagnosis_unknown");
}

// ============================================================================
// Tool routing
// ============================================================================

#[tokio::test]
async fn test_validate_does_not_save() {
    let server = test_server().await;
    let mut broken = serde_json::to_value(scenario()).unwrap();
    broken["startNodeId"] = json!("nowhere");

    let value = call_ok(
        &server,
        "diagnosis_validate",
        json!({"documents": [scenario(), broken]}),
    )
    .await;

    assert_eq!(value["results"][0]["valid"], true);
    assert_eq!(value["results"][1]["valid"], false);
    assert_eq!(
        value["results"][1]["errors"][0],
        "startNodeId 'nowhere' does not match any node"
    );

    let listed = call_ok(&server, "diagnosis_list", json!({})).await;
    assert_eq!(listed["trees"], json!([]));
}

#[tokio::test]
async fn test_upload_uses_default_author() {
    let server = test_server().await;
    let summary = call_ok(&server, "diagnosis_upload", json!({"documents": scenario()})).await;
    assert_eq!(summary["saved"], 1);
    assert_eq!(summary["results"][0]["version"], 1);

    let tree = call_ok(
        &server,
        "diagnosis_get",
        json!({"tree_id": "no-start", "include_document": true}),
    )
    .await;
    assert_eq!(tree["updatedBy"], "admin");
    assert_eq!(tree["isActive"], false);
    assert_eq!(tree["document"]["startNodeId"], "q1");
}

#[tokio::test]
async fn test_get_unknown_tree_is_not_found() {
    let server = test_server().await;
    let (is_error, text) = call(&server, "diagnosis_get", json!({"tree_id": "ghost"})).await;
    assert!(is_error);
    assert!(text.starts_with("NOT_FOUND:"), "{}", text);
}

#[tokio::test]
async fn test_session_flow_over_tools() {
    let server = test_server().await;
    call_ok(
        &server,
        "diagnosis_upload",
        json!({"documents": [scenario()], "updated_by": "kim"}),
    )
    .await;

    let (is_error, text) = call(&server, "diagnosis_session_start", json!({"tree_id": "no-start"})).await;
    assert!(is_error);
    assert!(text.starts_with("NOT_FOUND:"), "inactive tree must not open: {}", text);

    call_ok(
        &server,
        "diagnosis_set_active",
        json!({"tree_id": "no-start", "is_active": true}),
    )
    .await;

    let active = call_ok(&server, "diagnosis_active_trees", json!({"model": "GV80"})).await;
    assert_eq!(active["trees"][0]["treeId"], "no-start");
    assert_eq!(active["trees"][0]["maxDepth"], 3);

    let started = call_ok(&server, "diagnosis_session_start", json!({"tree_id": "no-start"})).await;
    let session_id = started["sessionId"].as_str().unwrap().to_string();
    assert_eq!(started["node"]["id"], "q1");
    assert_eq!(started["node"]["type"], "question");

    let (is_error, text) = call(
        &server,
        "diagnosis_session_advance",
        json!({"session_id": session_id}),
    )
    .await;
    assert!(is_error);
    assert!(text.starts_with("NOT_A_STEP:"), "{}", text);

    let step = call_ok(
        &server,
        "diagnosis_session_answer",
        json!({"session_id": session_id, "answer": "yes"}),
    )
    .await;
    assert_eq!(step["node"]["id"], "step1");

    let done = call_ok(
        &server,
        "diagnosis_session_advance",
        json!({"session_id": session_id}),
    )
    .await;
    assert_eq!(done["node"]["id"], "r2");
    assert_eq!(done["node"]["actions"], json!(["replace fuse"]));
    assert_eq!(done["progress"]["finished"], true);
    assert_eq!(done["history"], json!(["q1", "step1", "r2"]));

    let back = call_ok(&server, "diagnosis_session_back", json!({"session_id": session_id})).await;
    assert_eq!(back["moved"], true);
    assert_eq!(back["node"]["id"], "step1");

    let restarted = call_ok(
        &server,
        "diagnosis_session_restart",
        json!({"session_id": session_id}),
    )
    .await;
    assert_eq!(restarted["history"], json!(["q1"]));

    let ended = call_ok(&server, "diagnosis_session_end", json!({"session_id": session_id})).await;
    assert_eq!(ended["ended"], true);

    let (is_error, text) = call(
        &server,
        "diagnosis_session_current",
        json!({"session_id": session_id}),
    )
    .await;
    assert!(is_error);
    assert!(text.starts_with("SESSION_NOT_FOUND:"), "{}", text);
}

#[tokio::test]
async fn test_answer_rejects_unknown_word() {
    let server = test_server().await;
    let (is_error, text) = call(
        &server,
        "diagnosis_session_answer",
        json!({"session_id": "x", "answer": "maybe"}),
    )
    .await;
    assert!(is_error);
    assert!(text.contains("Invalid parameters for diagnosis_session_answer"), "{}", text);
}
