//! # SQLite Store
//!
//! A `RemoteStore` backed by a local SQLite database. Records are stored as
//! JSON documents in a single `documents` table keyed by `(collection, id)`,
//! so every collection shares one schema and list queries are evaluated over
//! decoded records rather than pushed into SQL.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SqliteStore Data Flow                      │
//! │                                                                 │
//! │  RemoteStore call (get / list / create / update / delete)      │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  ┌──────────────┐        ┌──────────────────────────────────┐  │
//! │  │  SqlitePool  │───────►│  documents                       │  │
//! │  │  (WAL mode)  │        │  (collection, id) PRIMARY KEY    │  │
//! │  └──────────────┘        │  fields TEXT (JSON object)       │  │
//! │       │                  │  created_at / updated_at TEXT    │  │
//! │       ▼                  └──────────────────────────────────┘  │
//! │  decode rows ──► ListQuery::apply ──► RecordPage               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! WAL journaling is enabled so cache prefetches (reads) never block a
//! concurrent mutation (write) against the same file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use sodi_core::{FieldPatch, Record, RecordId, RecordPage};

use crate::error::{StoreError, StoreResult};
use crate::gateway::RemoteStore;
use crate::query::ListQuery;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = SqliteConfig::new("./data/sodiluxe.db").max_connections(5);
/// let store = SqliteStore::connect(config).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Connection acquire timeout.
    pub connect_timeout: Duration,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteConfig {
            database_path: path.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// In-memory database for tests. A single connection is required or the
    /// pool would open several independent empty databases.
    pub fn in_memory() -> Self {
        SqliteConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Document store over SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (and creates if missing) the database, configures the pool and
    /// ensures the schema exists.
    pub async fn connect(config: SqliteConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening document store"
        );

        let connect_url = if config.database_path.as_os_str() == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", config.database_path.display())
        };
        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = SqliteStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Opens an isolated in-memory store. Test convenience.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect(SqliteConfig::in_memory()).await
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection  TEXT NOT NULL,
                id          TEXT NOT NULL,
                fields      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        debug!("Schema ready");
        Ok(())
    }

    fn decode_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Record> {
        let id: String = row.try_get("id")?;
        let fields_json: String = row.try_get("fields")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let fields: FieldPatch = serde_json::from_str(&fields_json)?;
        Ok(Record {
            id: RecordId::Permanent(id),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            fields,
        })
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("Bad timestamp '{raw}': {e}")))
}

/// Pending ids never reach a store.
fn reject_pending(id: &str) -> StoreResult<()> {
    if id.starts_with("temp-") {
        return Err(StoreError::PendingId { id: id.to_string() });
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        reject_pending(id)?;

        let row = sqlx::query(
            "SELECT id, fields, created_at, updated_at FROM documents \
             WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::decode_row(&row),
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> StoreResult<RecordPage> {
        let rows = sqlx::query(
            "SELECT id, fields, created_at, updated_at FROM documents \
             WHERE collection = ? ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(Self::decode_row)
            .collect::<StoreResult<Vec<Record>>>()?;
        Ok(query.apply(records))
    }

    async fn create(&self, collection: &str, fields: FieldPatch) -> StoreResult<Record> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let fields_json = serde_json::to_string(&fields)?;

        sqlx::query(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&id)
        .bind(&fields_json)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(collection, id = %id, "Record created");
        Ok(Record {
            id: RecordId::Permanent(id),
            created_at: now,
            updated_at: now,
            fields,
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> StoreResult<Record> {
        reject_pending(id)?;

        let mut record = self.get(collection, id).await?;
        record.apply_patch(&patch, Utc::now());
        let fields_json = serde_json::to_string(&record.fields)?;

        sqlx::query(
            "UPDATE documents SET fields = ?, updated_at = ? \
             WHERE collection = ? AND id = ?",
        )
        .bind(&fields_json)
        .bind(record.updated_at.to_rfc3339())
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(collection, id, fields = patch.len(), "Record updated");
        Ok(record)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        reject_pending(id)?;

        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        debug!(collection, id, "Record deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn fields(value: Value) -> FieldPatch {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn test_create_get_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = store
            .create("clients", fields(json!({"name": "Amira", "loyalty": 120})))
            .await
            .unwrap();

        let fetched = store.get("clients", &record.id.to_string()).await.unwrap();
        assert_eq!(fetched.field("name"), Some(&json!("Amira")));
        assert_eq!(fetched.field("loyalty"), Some(&json!(120)));
        assert_eq!(fetched.id, record.id);
    }

    #[tokio::test]
    async fn test_update_overlays_and_bumps_timestamp() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = store
            .create("clients", fields(json!({"name": "Amira", "loyalty": 120})))
            .await
            .unwrap();

        let updated = store
            .update(
                "clients",
                &record.id.to_string(),
                fields(json!({"loyalty": 150})),
            )
            .await
            .unwrap();

        assert_eq!(updated.field("loyalty"), Some(&json!(150)));
        assert_eq!(updated.field("name"), Some(&json!("Amira")));
        assert!(updated.updated_at >= record.updated_at);
        assert_eq!(updated.created_at, record.created_at);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store.delete("clients", "absent").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = store
            .create("clients", fields(json!({"name": "Amira"})))
            .await
            .unwrap();

        let err = store
            .get("products", &record.id.to_string())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_evaluates_query_over_documents() {
        let store = SqliteStore::in_memory().await.unwrap();
        for loyalty in [50, 150, 250] {
            store
                .create("clients", fields(json!({"loyalty": loyalty})))
                .await
                .unwrap();
        }

        let page = store
            .list(
                "clients",
                &ListQuery::new()
                    .greater_than_or_equal("loyalty", json!(150))
                    .order_desc("loyalty"),
            )
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].field("loyalty"), Some(&json!(250)));
    }

    #[tokio::test]
    async fn test_pending_ids_are_refused() {
        let store = SqliteStore::in_memory().await.unwrap();
        let pending = RecordId::new_pending().to_string();

        let err = store.get("sales", &pending).await.unwrap_err();
        assert!(matches!(err, StoreError::PendingId { .. }));
    }
}
