//! Storage layer for diagnosis tree persistence.
//!
//! This module provides SQLite-based storage for the latest version of every
//! tree plus an append-only revision history.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::VersionPlan;
use crate::error::StorageResult;
use crate::tree::{RawNode, TreeDocument};

/// The stored, latest version of one diagnosis tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    /// Stable identifier shared by every version.
    pub tree_id: String,
    /// Title shown in the tree selector.
    pub title: String,
    /// Symptom category.
    pub category: String,
    /// Vehicle models this tree applies to.
    pub supported_models: Vec<String>,
    /// Id of the node a walk begins at.
    pub start_node_id: String,
    /// Nodes exactly as uploaded.
    pub nodes: Vec<RawNode>,
    /// Monotonic version, starting at 1.
    pub version: i64,
    /// Whether technicians may select this tree.
    pub is_active: bool,
    /// When this version was saved.
    pub updated_at: DateTime<Utc>,
    /// Who saved this version.
    pub updated_by: String,
}

impl TreeRecord {
    /// Build the record for `document` saved under `plan`.
    pub fn new(document: &TreeDocument, plan: VersionPlan, updated_by: impl Into<String>) -> Self {
        Self {
            tree_id: document.tree_id.trim().to_string(),
            title: document.title.clone(),
            category: document.category.clone(),
            supported_models: document.supported_models.clone(),
            start_node_id: document.start_node_id.clone(),
            nodes: document.nodes.clone(),
            version: plan.version,
            is_active: plan.is_active,
            updated_at: Utc::now(),
            updated_by: updated_by.into(),
        }
    }

    /// The stored tree as an uploadable document.
    pub fn to_document(&self) -> TreeDocument {
        TreeDocument {
            tree_id: self.tree_id.clone(),
            title: self.title.clone(),
            category: self.category.clone(),
            supported_models: self.supported_models.clone(),
            start_node_id: self.start_node_id.clone(),
            nodes: self.nodes.clone(),
        }
    }

    /// True when `model` is listed in `supported_models`.
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m.trim() == model)
    }
}

/// One saved version in a tree's audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRevision {
    pub tree_id: String,
    pub version: i64,
    /// The full document as it was uploaded for this version.
    pub document: TreeDocument,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl From<&TreeRecord> for TreeRevision {
    fn from(record: &TreeRecord) -> Self {
        Self {
            tree_id: record.tree_id.clone(),
            version: record.version,
            document: record.to_document(),
            updated_at: record.updated_at,
            updated_by: record.updated_by.clone(),
        }
    }
}

/// Storage trait for database operations.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save `document` as the tree's next version.
    ///
    /// Reading the existing row, applying [`VersionPlan::next`], replacing
    /// the row and appending the revision happen in one transaction.
    async fn save_tree_version(
        &self,
        document: &TreeDocument,
        updated_by: &str,
    ) -> StorageResult<TreeRecord>;

    /// Get the latest version of a tree.
    async fn get_tree(&self, tree_id: &str) -> StorageResult<Option<TreeRecord>>;

    /// Latest version of every tree, ordered by tree id.
    async fn list_trees(&self) -> StorageResult<Vec<TreeRecord>>;

    /// Trees with `is_active` set, ordered by tree id. Validity is not
    /// checked here.
    async fn list_active_trees(&self) -> StorageResult<Vec<TreeRecord>>;

    /// Set the activation flag; version and content are untouched.
    ///
    /// Fails with `TreeNotFound` when no such tree exists.
    async fn set_tree_active(&self, tree_id: &str, is_active: bool) -> StorageResult<TreeRecord>;

    /// Every saved version of a tree, newest first.
    async fn get_tree_revisions(&self, tree_id: &str) -> StorageResult<Vec<TreeRevision>>;

    /// Remove a tree and its history. Returns whether anything was deleted.
    async fn delete_tree(&self, tree_id: &str) -> StorageResult<bool>;
}
