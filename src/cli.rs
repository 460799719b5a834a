//! Command-line interface for tree administration.
//!
//! Everything except `serve` runs one catalog operation against the
//! configured database and exits.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::catalog::{TreeCatalog, UploadStatus};
use crate::tree::{TreeDocument, UploadPayload};
use crate::validation::validate;

/// Guided vehicle diagnosis engine.
#[derive(Parser, Debug)]
#[command(name = "diagnosis-engine", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the MCP server on stdio (default)
    Serve,

    /// Validate tree documents without saving them
    Validate {
        /// JSON files, each holding one tree or an array of trees
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate and save tree documents as new versions
    Import {
        /// JSON files, each holding one tree or an array of trees
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Author recorded on the saved versions
        #[arg(long = "by")]
        updated_by: Option<String>,
    },

    /// List the latest version of every tree
    List,

    /// Make a tree selectable by technicians
    Activate {
        tree_id: String,
    },

    /// Hide a tree from technicians
    Deactivate {
        tree_id: String,
    },

    /// Remove a tree and its version history
    Delete {
        tree_id: String,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute an administrative command. `serve` is handled by the binary.
pub async fn execute_command(
    command: Commands,
    catalog: &TreeCatalog,
    default_author: &str,
) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve is not an administrative command"),
        Commands::Validate { files } => execute_validate(&files).await,
        Commands::Import { files, updated_by } => {
            let author = updated_by.unwrap_or_else(|| default_author.to_string());
            execute_import(catalog, &files, &author).await
        }
        Commands::List => execute_list(catalog).await,
        Commands::Activate { tree_id } => execute_set_active(catalog, &tree_id, true).await,
        Commands::Deactivate { tree_id } => execute_set_active(catalog, &tree_id, false).await,
        Commands::Delete { tree_id } => match catalog.delete(&tree_id).await {
            Ok(()) => CliResult::success(format!("Deleted {}", tree_id)),
            Err(e) => CliResult::error(format!("Failed to delete {}: {}", tree_id, e)),
        },
    }
}

/// Read every file, collecting documents and per-file read errors.
async fn read_documents(files: &[PathBuf]) -> (Vec<TreeDocument>, Vec<String>) {
    let mut documents = Vec::new();
    let mut failures = Vec::new();

    for path in files {
        match read_payload(path).await {
            Ok(payload) => documents.extend(payload.into_documents()),
            Err(message) => {
                warn!(path = %path.display(), error = %message, "Skipping unreadable file");
                failures.push(format!("{}: {}", path.display(), message));
            }
        }
    }

    (documents, failures)
}

async fn read_payload(path: &Path) -> Result<UploadPayload, String> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    UploadPayload::from_json(&text).map_err(|e| format!("invalid JSON: {}", e))
}

async fn execute_validate(files: &[PathBuf]) -> CliResult {
    let (documents, failures) = read_documents(files).await;
    let mut output = String::new();
    let mut invalid = failures.len();

    for failure in &failures {
        output.push_str(&format!("✗ {}\n", failure));
    }

    for document in &documents {
        let report = validate(document);
        let mark = if report.is_valid() { "✓" } else { "✗" };
        output.push_str(&format!("{} {}\n", mark, display_id(&document.tree_id)));
        for error in &report.errors {
            output.push_str(&format!("    error: {}\n", error));
        }
        for warning in &report.warnings {
            output.push_str(&format!("    warning: {}\n", warning));
        }
        if !report.is_valid() {
            invalid += 1;
        }
    }

    output.push_str(&format!(
        "\n{} checked, {} invalid\n",
        documents.len() + failures.len(),
        invalid
    ));

    if invalid == 0 {
        CliResult::success(output)
    } else {
        CliResult::error(output)
    }
}

async fn execute_import(catalog: &TreeCatalog, files: &[PathBuf], updated_by: &str) -> CliResult {
    let (documents, failures) = read_documents(files).await;
    let summary = catalog.upload_batch(documents, updated_by).await;
    let mut output = String::new();

    for failure in &failures {
        output.push_str(&format!("✗ {}\n", failure));
    }

    for outcome in &summary.results {
        match outcome.status {
            UploadStatus::Saved => output.push_str(&format!(
                "✓ {} saved as version {}\n",
                outcome.tree_id,
                outcome.version.unwrap_or_default()
            )),
            UploadStatus::Failed => {
                output.push_str(&format!("✗ {} rejected\n", display_id(&outcome.tree_id)));
                for error in &outcome.errors {
                    output.push_str(&format!("    error: {}\n", error));
                }
            }
        }
        for warning in &outcome.warnings {
            output.push_str(&format!("    warning: {}\n", warning));
        }
    }

    output.push_str(&format!(
        "\n{} saved, {} failed\n",
        summary.saved,
        summary.failed + failures.len()
    ));

    if summary.failed == 0 && failures.is_empty() {
        CliResult::success(output)
    } else {
        CliResult::error(output)
    }
}

async fn execute_list(catalog: &TreeCatalog) -> CliResult {
    let trees = match catalog.list().await {
        Ok(trees) => trees,
        Err(e) => return CliResult::error(format!("Failed to list trees: {}", e)),
    };

    if trees.is_empty() {
        return CliResult::success("No trees stored.");
    }

    let mut output = format!(
        "{:<24} {:>7} {:<8} {:>6} {:<12} {}\n",
        "TREE", "VERSION", "ACTIVE", "NODES", "CATEGORY", "STATUS"
    );
    for tree in &trees {
        let status = if !tree.errors.is_empty() {
            format!("{} error(s)", tree.errors.len())
        } else if !tree.warnings.is_empty() {
            format!("{} warning(s)", tree.warnings.len())
        } else {
            "ok".to_string()
        };
        output.push_str(&format!(
            "{:<24} {:>7} {:<8} {:>6} {:<12} {}\n",
            tree.tree_id,
            tree.version,
            if tree.is_active { "yes" } else { "no" },
            tree.node_count,
            tree.category,
            status
        ));
    }

    CliResult::success(output)
}

async fn execute_set_active(catalog: &TreeCatalog, tree_id: &str, is_active: bool) -> CliResult {
    match catalog.set_active(tree_id, is_active).await {
        Ok(summary) => {
            let verb = if is_active { "Activated" } else { "Deactivated" };
            let mut message = format!("{} {} (version {})", verb, tree_id, summary.version);
            if is_active && !summary.errors.is_empty() {
                message.push_str(&format!(
                    "\nwarning: tree has {} validation error(s) and will not be offered",
                    summary.errors.len()
                ));
            }
            CliResult::success(message)
        }
        Err(e) => CliResult::error(format!("Failed to update {}: {}", tree_id, e)),
    }
}

fn display_id(tree_id: &str) -> &str {
    let trimmed = tree_id.trim();
    if trimmed.is_empty() {
        "<missing treeId>"
    } else {
        trimmed
    }
}
