use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{Storage, TreeRecord, TreeRevision};
use crate::catalog::VersionPlan;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::tree::TreeDocument;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const TREE_COLUMNS: &str = "tree_id, title, category, supported_models, start_node_id, nodes, \
                            version, is_active, updated_at, updated_by";

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a storage instance backed by a private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_tree_version(
        &self,
        document: &TreeDocument,
        updated_by: &str,
    ) -> StorageResult<TreeRecord> {
        let tree_id = document.tree_id.trim();
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64, bool)> =
            sqlx::query_as("SELECT version, is_active FROM diagnosis_trees WHERE tree_id = ?")
                .bind(tree_id)
                .fetch_optional(&mut *tx)
                .await?;

        let plan = VersionPlan::next(existing);
        let record = TreeRecord::new(document, plan, updated_by);
        let supported_models = to_json(tree_id, &record.supported_models)?;
        let nodes = to_json(tree_id, &record.nodes)?;
        let revision = to_json(tree_id, &record.to_document())?;
        let updated_at = record.updated_at.to_rfc3339();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO diagnosis_trees
                (tree_id, title, category, supported_models, start_node_id, nodes,
                 version, is_active, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.tree_id)
        .bind(&record.title)
        .bind(&record.category)
        .bind(&supported_models)
        .bind(&record.start_node_id)
        .bind(&nodes)
        .bind(record.version)
        .bind(record.is_active)
        .bind(&updated_at)
        .bind(&record.updated_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO diagnosis_tree_revisions (tree_id, version, document, updated_at, updated_by)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.tree_id)
        .bind(record.version)
        .bind(&revision)
        .bind(&updated_at)
        .bind(&record.updated_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            tree_id = %record.tree_id,
            version = record.version,
            is_active = record.is_active,
            "Saved tree version"
        );
        Ok(record)
    }

    async fn get_tree(&self, tree_id: &str) -> StorageResult<Option<TreeRecord>> {
        let row: Option<TreeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM diagnosis_trees WHERE tree_id = ?",
            TREE_COLUMNS
        ))
        .bind(tree_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TreeRecord::try_from).transpose()
    }

    async fn list_trees(&self) -> StorageResult<Vec<TreeRecord>> {
        let rows: Vec<TreeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM diagnosis_trees ORDER BY tree_id ASC",
            TREE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TreeRecord::try_from).collect()
    }

    async fn list_active_trees(&self) -> StorageResult<Vec<TreeRecord>> {
        let rows: Vec<TreeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM diagnosis_trees WHERE is_active = 1 ORDER BY tree_id ASC",
            TREE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TreeRecord::try_from).collect()
    }

    async fn set_tree_active(&self, tree_id: &str, is_active: bool) -> StorageResult<TreeRecord> {
        let result = sqlx::query("UPDATE diagnosis_trees SET is_active = ? WHERE tree_id = ?")
            .bind(is_active)
            .bind(tree_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::TreeNotFound {
                tree_id: tree_id.to_string(),
            });
        }

        self.get_tree(tree_id)
            .await?
            .ok_or_else(|| StorageError::TreeNotFound {
                tree_id: tree_id.to_string(),
            })
    }

    async fn get_tree_revisions(&self, tree_id: &str) -> StorageResult<Vec<TreeRevision>> {
        let rows: Vec<RevisionRow> = sqlx::query_as(
            r#"
            SELECT tree_id, version, document, updated_at, updated_by
            FROM diagnosis_tree_revisions
            WHERE tree_id = ?
            ORDER BY version DESC
            "#,
        )
        .bind(tree_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TreeRevision::try_from).collect()
    }

    async fn delete_tree(&self, tree_id: &str) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM diagnosis_trees WHERE tree_id = ?")
            .bind(tree_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM diagnosis_tree_revisions WHERE tree_id = ?")
            .bind(tree_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

fn to_json<T: serde::Serialize + ?Sized>(tree_id: &str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        tree_id: tree_id.to_string(),
        message: e.to_string(),
    })
}

fn from_json<T: serde::de::DeserializeOwned>(tree_id: &str, column: &str, raw: &str) -> StorageResult<T> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization {
        tree_id: tree_id.to_string(),
        message: format!("{}: {}", column, e),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct TreeRow {
    tree_id: String,
    title: String,
    category: String,
    supported_models: String,
    start_node_id: String,
    nodes: String,
    version: i64,
    is_active: bool,
    updated_at: String,
    updated_by: String,
}

impl TryFrom<TreeRow> for TreeRecord {
    type Error = StorageError;

    fn try_from(row: TreeRow) -> StorageResult<Self> {
        Ok(Self {
            supported_models: from_json(&row.tree_id, "supported_models", &row.supported_models)?,
            nodes: from_json(&row.tree_id, "nodes", &row.nodes)?,
            updated_at: parse_timestamp(&row.updated_at),
            tree_id: row.tree_id,
            title: row.title,
            category: row.category,
            start_node_id: row.start_node_id,
            version: row.version,
            is_active: row.is_active,
            updated_by: row.updated_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RevisionRow {
    tree_id: String,
    version: i64,
    document: String,
    updated_at: String,
    updated_by: String,
}

impl TryFrom<RevisionRow> for TreeRevision {
    type Error = StorageError;

    fn try_from(row: RevisionRow) -> StorageResult<Self> {
        Ok(Self {
            document: from_json(&row.tree_id, "document", &row.document)?,
            updated_at: parse_timestamp(&row.updated_at),
            tree_id: row.tree_id,
            version: row.version,
            updated_by: row.updated_by,
        })
    }
}
