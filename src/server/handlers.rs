use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::SharedState;
use crate::depth::estimate_max_depth;
use crate::error::{McpError, McpResult};
use crate::traversal::{Answer, Progress, TraversalSession};
use crate::tree::{DiagnosisTree, Locale, Node, UploadPayload};
use crate::validation::validate;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        // Tree administration
        "diagnosis_validate" => handle_validate(state, arguments).await,
        "diagnosis_upload" => handle_upload(state, arguments).await,
        "diagnosis_list" => handle_list(state, arguments).await,
        "diagnosis_get" => handle_get(state, arguments).await,
        "diagnosis_history" => handle_history(state, arguments).await,
        "diagnosis_set_active" => handle_set_active(state, arguments).await,
        // Technician-facing
        "diagnosis_active_trees" => handle_active_trees(state, arguments).await,
        "diagnosis_session_start" => handle_session_start(state, arguments).await,
        "diagnosis_session_answer" => handle_session_answer(state, arguments).await,
        "diagnosis_session_advance" => handle_session_advance(state, arguments).await,
        "diagnosis_session_back" => handle_session_back(state, arguments).await,
        "diagnosis_session_restart" => handle_session_restart(state, arguments).await,
        "diagnosis_session_current" => handle_session_current(state, arguments).await,
        "diagnosis_session_end" => handle_session_end(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Response views
// ============================================================================

/// Validator findings for one document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationView {
    pub tree_id: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Header of an active tree, as shown in the tree selector.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTreeView {
    pub tree_id: String,
    pub title: String,
    pub category: String,
    pub supported_models: Vec<String>,
    pub node_count: usize,
    pub max_depth: usize,
}

impl From<&DiagnosisTree> for ActiveTreeView {
    fn from(tree: &DiagnosisTree) -> Self {
        Self {
            tree_id: tree.tree_id().to_string(),
            title: tree.title().to_string(),
            category: tree.category().to_string(),
            supported_models: tree.supported_models().iter().cloned().collect(),
            node_count: tree.node_count(),
            max_depth: estimate_max_depth(tree),
        }
    }
}

/// Where a traversal session stands.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub tree_id: String,
    pub node: Node,
    pub history: Vec<String>,
    pub progress: Progress,
}

impl SessionView {
    fn new(session_id: &str, session: &TraversalSession) -> Self {
        Self {
            session_id: session_id.to_string(),
            tree_id: session.tree().tree_id().to_string(),
            node: session.current_node().clone(),
            history: session.history().to_vec(),
            progress: session.progress(),
        }
    }
}

// ============================================================================
// Tree administration handlers
// ============================================================================

/// Handle diagnosis_validate - run the validator without saving
async fn handle_validate(_state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ValidateParams {
        documents: UploadPayload,
    }

    let params: ValidateParams = parse_arguments("diagnosis_validate", arguments)?;
    let results: Vec<ValidationView> = params
        .documents
        .into_documents()
        .iter()
        .map(|document| {
            let report = validate(document);
            ValidationView {
                tree_id: document.tree_id.trim().to_string(),
                valid: report.is_valid(),
                errors: report.errors,
                warnings: report.warnings,
            }
        })
        .collect();

    Ok(serde_json::json!({ "results": results }))
}

/// Handle diagnosis_upload - validate and save one or more trees
async fn handle_upload(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct UploadParams {
        documents: UploadPayload,
        #[serde(default)]
        updated_by: Option<String>,
    }

    let params: UploadParams = parse_arguments("diagnosis_upload", arguments)?;
    let updated_by = params
        .updated_by
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.config.catalog.default_author.clone());

    let summary = state
        .catalog
        .upload_batch(params.documents, &updated_by)
        .await;

    serde_json::to_value(summary).map_err(McpError::Json)
}

/// Handle diagnosis_list - latest version of every tree
async fn handle_list(state: &SharedState, _arguments: Option<Value>) -> McpResult<Value> {
    let trees = state.catalog.list().await?;
    Ok(serde_json::json!({ "trees": trees }))
}

#[derive(Deserialize)]
struct TreeIdParams {
    tree_id: String,
}

/// Handle diagnosis_get - one tree summary, optionally with its document
async fn handle_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct GetParams {
        tree_id: String,
        #[serde(default)]
        include_document: bool,
    }

    let params: GetParams = parse_arguments("diagnosis_get", arguments)?;
    let summary = state.catalog.get(&params.tree_id).await?;
    let mut value = serde_json::to_value(summary)?;

    if params.include_document {
        let document = state.catalog.document(&params.tree_id).await?;
        value["document"] = serde_json::to_value(document)?;
    }

    Ok(value)
}

/// Handle diagnosis_history - every saved version of a tree
async fn handle_history(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    execute_handler("diagnosis_history", arguments, |params: TreeIdParams| async move {
        state.catalog.history(&params.tree_id).await
    })
    .await
}

/// Handle diagnosis_set_active - toggle whether technicians can pick a tree
async fn handle_set_active(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct SetActiveParams {
        tree_id: String,
        is_active: bool,
    }

    execute_handler(
        "diagnosis_set_active",
        arguments,
        |params: SetActiveParams| async move {
            state
                .catalog
                .set_active(&params.tree_id, params.is_active)
                .await
        },
    )
    .await
}

// ============================================================================
// Technician-facing handlers
// ============================================================================

/// Handle diagnosis_active_trees - trees a technician can pick for a model
async fn handle_active_trees(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ActiveTreesParams {
        model: String,
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        locale: Option<String>,
    }

    let params: ActiveTreesParams = parse_arguments("diagnosis_active_trees", arguments)?;
    let locale = resolve_locale(state, "diagnosis_active_trees", params.locale.as_deref())?;

    let trees = state
        .catalog
        .load_active(&params.model, params.category.as_deref(), locale)
        .await?;
    let views: Vec<ActiveTreeView> = trees.iter().map(ActiveTreeView::from).collect();

    Ok(serde_json::json!({ "trees": views }))
}

/// Handle diagnosis_session_start - open a walk on an active tree
async fn handle_session_start(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct StartParams {
        tree_id: String,
        #[serde(default)]
        locale: Option<String>,
    }

    let params: StartParams = parse_arguments("diagnosis_session_start", arguments)?;
    let locale = resolve_locale(state, "diagnosis_session_start", params.locale.as_deref())?;

    let tree = state.catalog.open_active(&params.tree_id, locale).await?;
    let session = TraversalSession::start(Arc::new(tree))?;
    let session_id = state.sessions.open(session).await;
    info!(session_id = %session_id, tree_id = %params.tree_id, "Traversal session opened");

    to_session_value(state, &session_id).await
}

#[derive(Deserialize)]
struct SessionParams {
    session_id: String,
}

/// Accepts `true`/`false` as well as `"yes"`/`"no"` and their aliases.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerArg {
    Flag(bool),
    Text(String),
}

/// Handle diagnosis_session_answer - answer the current question
async fn handle_session_answer(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct AnswerParams {
        session_id: String,
        answer: AnswerArg,
    }

    let params: AnswerParams = parse_arguments("diagnosis_session_answer", arguments)?;
    let answer = match params.answer {
        AnswerArg::Flag(flag) => Answer::from(flag),
        AnswerArg::Text(text) => {
            text.parse::<Answer>()
                .map_err(|message| McpError::InvalidParameters {
                    tool_name: "diagnosis_session_answer".to_string(),
                    message,
                })?
        }
    };

    let session_id = params.session_id;
    let view = state
        .sessions
        .with_session(&session_id, |session| {
            session.answer(answer)?;
            Ok(SessionView::new(&session_id, session))
        })
        .await?;

    serde_json::to_value(view).map_err(McpError::Json)
}

/// Handle diagnosis_session_advance - follow the current step
async fn handle_session_advance(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("diagnosis_session_advance", arguments)?;
    let session_id = params.session_id;
    let view = state
        .sessions
        .with_session(&session_id, |session| {
            session.advance()?;
            Ok(SessionView::new(&session_id, session))
        })
        .await?;

    serde_json::to_value(view).map_err(McpError::Json)
}

/// Handle diagnosis_session_back - undo the last move
async fn handle_session_back(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("diagnosis_session_back", arguments)?;
    let session_id = params.session_id;
    let (moved, view) = state
        .sessions
        .with_session(&session_id, |session| {
            let moved = session.back();
            Ok((moved, SessionView::new(&session_id, session)))
        })
        .await?;

    let mut value = serde_json::to_value(view)?;
    value["moved"] = Value::Bool(moved);
    Ok(value)
}

/// Handle diagnosis_session_restart - back to the start node
async fn handle_session_restart(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("diagnosis_session_restart", arguments)?;
    let session_id = params.session_id;
    let view = state
        .sessions
        .with_session(&session_id, |session| {
            session.restart();
            Ok(SessionView::new(&session_id, session))
        })
        .await?;

    serde_json::to_value(view).map_err(McpError::Json)
}

/// Handle diagnosis_session_current - current node and progress
async fn handle_session_current(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("diagnosis_session_current", arguments)?;
    to_session_value(state, &params.session_id).await
}

/// Handle diagnosis_session_end - discard a session
async fn handle_session_end(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SessionParams = parse_arguments("diagnosis_session_end", arguments)?;
    state.sessions.close(&params.session_id).await?;
    Ok(serde_json::json!({ "sessionId": params.session_id, "ended": true }))
}

// ============================================================================
// Helper functions
// ============================================================================

async fn to_session_value(state: &SharedState, session_id: &str) -> McpResult<Value> {
    let view = state
        .sessions
        .with_session(session_id, |session| Ok(SessionView::new(session_id, session)))
        .await?;
    serde_json::to_value(view).map_err(McpError::Json)
}

fn resolve_locale(state: &SharedState, tool_name: &str, raw: Option<&str>) -> McpResult<Locale> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<Locale>()
            .map_err(|message| McpError::InvalidParameters {
                tool_name: tool_name.to_string(),
                message,
            }),
        None => Ok(state.config.catalog.default_locale),
    }
}

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Generic handler that parses typed arguments, runs an async catalog
/// operation and serializes its result.
///
/// Errors convert through [`McpError`] so engine failures keep their code.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: Into<McpError>,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;
    let result = operation(params).await.map_err(Into::into)?;
    serde_json::to_value(result).map_err(McpError::Json)
}
