//! Version and activation management for diagnosis trees.
//!
//! [`TreeCatalog`] sits between the server and storage. Every upload is
//! validated before anything is written; every read recomputes validation so
//! a tree that was saved under older rules is still reported honestly.

mod cache;
mod version;

pub use cache::ActiveTreeCache;
pub use version::VersionPlan;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::CatalogConfig;
use crate::error::{AppResult, EngineError, StorageError};
use crate::storage::{Storage, TreeRecord, TreeRevision};
use crate::tree::{DiagnosisTree, Locale, TreeDocument, UploadPayload};
use crate::validation::{validate, ValidationReport};


/// Outcome status of one uploaded tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Saved,
    Failed,
}

/// Result of uploading one tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub tree_id: String,
    pub status: UploadStatus,
    /// Version written, when saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl UploadOutcome {
    fn saved(record: &TreeRecord, warnings: Vec<String>) -> Self {
        Self {
            tree_id: record.tree_id.clone(),
            status: UploadStatus::Saved,
            version: Some(record.version),
            errors: Vec::new(),
            warnings,
        }
    }

    fn failed(tree_id: &str, report: ValidationReport) -> Self {
        Self {
            tree_id: tree_id.trim().to_string(),
            status: UploadStatus::Failed,
            version: None,
            errors: report.errors,
            warnings: report.warnings,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.status == UploadStatus::Saved
    }
}

/// Result of a batch upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub saved: usize,
    pub failed: usize,
    /// One outcome per uploaded tree, in upload order.
    pub results: Vec<UploadOutcome>,
}

/// Admin view of the latest version of a tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSummary {
    pub tree_id: String,
    pub title: String,
    pub category: String,
    pub supported_models: Vec<String>,
    pub node_count: usize,
    pub version: i64,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    /// Validation errors, recomputed at read time.
    pub errors: Vec<String>,
    /// Validation warnings, recomputed at read time.
    pub warnings: Vec<String>,
}

impl From<&TreeRecord> for TreeSummary {
    fn from(record: &TreeRecord) -> Self {
        let report = validate(&record.to_document());
        Self {
            tree_id: record.tree_id.clone(),
            title: record.title.clone(),
            category: record.category.clone(),
            supported_models: record.supported_models.clone(),
            node_count: record.nodes.len(),
            version: record.version,
            is_active: record.is_active,
            updated_at: record.updated_at,
            updated_by: record.updated_by.clone(),
            errors: report.errors,
            warnings: report.warnings,
        }
    }
}

/// Tree catalog over a [`Storage`] backend.
#[derive(Clone)]
pub struct TreeCatalog {
    storage: Arc<dyn Storage>,
    cache: Arc<ActiveTreeCache>,
}

impl TreeCatalog {
    pub fn new<S>(storage: S, config: &CatalogConfig) -> Self
    where
        S: Storage + 'static,
    {
        Self::with_storage(Arc::new(storage), config)
    }

    /// Build a catalog over an already shared storage handle.
    pub fn with_storage(storage: Arc<dyn Storage>, config: &CatalogConfig) -> Self {
        Self {
            storage,
            cache: Arc::new(ActiveTreeCache::new(config.active_cache_ttl)),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Validate and save one tree.
    ///
    /// A tree with validation errors is never written. A storage failure is
    /// reported in the outcome, not returned, so batch uploads continue.
    pub async fn upload(&self, document: &TreeDocument, updated_by: &str) -> UploadOutcome {
        let report = validate(document);
        if !report.is_valid() {
            warn!(
                tree_id = %document.tree_id,
                errors = report.errors.len(),
                "Rejected tree upload"
            );
            return UploadOutcome::failed(&document.tree_id, report);
        }

        match self.storage.save_tree_version(document, updated_by).await {
            Ok(record) => {
                self.cache.invalidate().await;
                info!(
                    tree_id = %record.tree_id,
                    version = record.version,
                    is_active = record.is_active,
                    updated_by = %updated_by,
                    "Saved tree version"
                );
                UploadOutcome::saved(&record, report.warnings)
            }
            Err(e) => {
                warn!(tree_id = %document.tree_id, error = %e, "Failed to save tree");
                let mut failure = ValidationReport {
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                };
                failure.merge(report);
                UploadOutcome::failed(&document.tree_id, failure)
            }
        }
    }

    /// Upload every tree in `payload`, one at a time.
    pub async fn upload_batch(
        &self,
        payload: impl Into<UploadPayload>,
        updated_by: &str,
    ) -> UploadSummary {
        let documents = payload.into().into_documents();
        let mut summary = UploadSummary {
            results: Vec::with_capacity(documents.len()),
            ..UploadSummary::default()
        };

        for document in &documents {
            let outcome = self.upload(document, updated_by).await;
            if outcome.is_saved() {
                summary.saved += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(outcome);
        }

        info!(
            saved = summary.saved,
            failed = summary.failed,
            "Batch upload finished"
        );
        summary
    }

    /// Flip the activation flag of a tree.
    pub async fn set_active(&self, tree_id: &str, is_active: bool) -> AppResult<TreeSummary> {
        let record = self
            .storage
            .set_tree_active(tree_id, is_active)
            .await
            .map_err(|e| not_found_or(e, tree_id))?;
        self.cache.invalidate().await;

        let summary = TreeSummary::from(&record);
        if is_active && !summary.errors.is_empty() {
            warn!(
                tree_id = %tree_id,
                errors = summary.errors.len(),
                "Activated tree has validation errors and will not be offered"
            );
        }
        info!(tree_id = %tree_id, is_active, "Tree activation changed");
        Ok(summary)
    }

    /// Latest version of every tree.
    pub async fn list(&self) -> AppResult<Vec<TreeSummary>> {
        let records = self.storage.list_trees().await?;
        Ok(records.iter().map(TreeSummary::from).collect())
    }

    pub async fn get(&self, tree_id: &str) -> AppResult<TreeSummary> {
        let record = self.record(tree_id).await?;
        Ok(TreeSummary::from(&record))
    }

    /// The latest version as an uploadable document.
    pub async fn document(&self, tree_id: &str) -> AppResult<TreeDocument> {
        Ok(self.record(tree_id).await?.to_document())
    }

    /// Saved versions of a tree, newest first.
    pub async fn history(&self, tree_id: &str) -> AppResult<Vec<TreeRevision>> {
        let revisions = self.storage.get_tree_revisions(tree_id).await?;
        if revisions.is_empty() {
            return Err(EngineError::NotFound {
                tree_id: tree_id.to_string(),
            }
            .into());
        }
        Ok(revisions)
    }

    /// Remove a tree and its history.
    pub async fn delete(&self, tree_id: &str) -> AppResult<()> {
        if !self.storage.delete_tree(tree_id).await? {
            return Err(EngineError::NotFound {
                tree_id: tree_id.to_string(),
            }
            .into());
        }
        self.cache.invalidate().await;
        info!(tree_id = %tree_id, "Tree deleted");
        Ok(())
    }

    /// Active, valid trees for `model`, optionally narrowed to `category`,
    /// resolved in `locale`.
    pub async fn load_active(
        &self,
        model: &str,
        category: Option<&str>,
        locale: Locale,
    ) -> AppResult<Vec<DiagnosisTree>> {
        let model = model.trim();
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let records = self.active_records().await?;

        let mut trees = Vec::new();
        for record in records.iter() {
            if !record.supports_model(model) {
                continue;
            }
            if category.is_some_and(|c| record.category.trim() != c) {
                continue;
            }
            match record.to_document().resolve(locale) {
                Ok(tree) => trees.push(tree),
                Err(e) => warn!(tree_id = %record.tree_id, error = %e, "Skipping active tree"),
            }
        }
        Ok(trees)
    }

    /// The single active tree a technician selected.
    ///
    /// Inactive and unknown trees are both `NOT_FOUND`; an active tree that
    /// fails validation is `INVALID_TREE`.
    pub async fn open_active(&self, tree_id: &str, locale: Locale) -> AppResult<DiagnosisTree> {
        let records = self.active_records().await?;
        if let Some(record) = records.iter().find(|r| r.tree_id == tree_id) {
            return Ok(record.to_document().resolve(locale)?);
        }

        match self.storage.get_tree(tree_id).await? {
            Some(record) if record.is_active => {
                let report = validate(&record.to_document());
                Err(EngineError::InvalidTree {
                    tree_id: tree_id.to_string(),
                    errors: report.errors,
                }
                .into())
            }
            _ => Err(EngineError::NotFound {
                tree_id: tree_id.to_string(),
            }
            .into()),
        }
    }

    async fn record(&self, tree_id: &str) -> AppResult<TreeRecord> {
        self.storage.get_tree(tree_id).await?.ok_or_else(|| {
            EngineError::NotFound {
                tree_id: tree_id.to_string(),
            }
            .into()
        })
    }

    /// Active records that pass validation, from the cache when fresh.
    async fn active_records(&self) -> AppResult<Arc<Vec<TreeRecord>>> {
        if let Some(records) = self.cache.get().await {
            return Ok(records);
        }

        let generation = self.cache.generation();
        let records: Vec<TreeRecord> = self
            .storage
            .list_active_trees()
            .await?
            .into_iter()
            .filter(|record| {
                let valid = validate(&record.to_document()).is_valid();
                if !valid {
                    warn!(tree_id = %record.tree_id, "Active tree fails validation; hidden");
                }
                valid
            })
            .collect();

        Ok(self.cache.store(records, generation).await)
    }
}

fn not_found_or(err: StorageError, tree_id: &str) -> crate::error::AppError {
    match err {
        StorageError::TreeNotFound { .. } => EngineError::NotFound {
            tree_id: tree_id.to_string(),
        }
        .into(),
        other => other.into(),
    }
}
