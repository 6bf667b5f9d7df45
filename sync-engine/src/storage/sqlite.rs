//! SQLite storage backend for sync-engine.

use super::{LocalStore, StoreTotals};
use crate::error::StorageError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use sync_types::{ConflictRecord, OperationKind, QueuedOperation, StoredEntity};

/// Schema revision written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

/// SQLite-based local store.
///
/// Uses WAL mode for concurrent reads/writes. Payloads are stored as JSON
/// text.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        if path.as_os_str().is_empty() {
            return Err(StorageError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that never recycles: the database lives in it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    ///
    /// Refuses a database written by a newer schema revision.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let found: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        if found > SCHEMA_VERSION {
            return Err(StorageError::Migration(format!(
                "database schema version {found} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                entity_type TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (entity_type, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conflicts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                local_version TEXT,
                server_version TEXT,
                local_timestamp INTEGER NOT NULL,
                server_timestamp INTEGER NOT NULL,
                detected_at INTEGER NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_user ON sync_queue(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queue_user_synced ON sync_queue(user_id, synced)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_conflicts_user ON conflicts(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn put_entity(&self, entity: StoredEntity) -> Result<(), StorageError> {
        let data = serde_json::to_string(&entity.data)?;

        sqlx::query(
            r#"
            INSERT INTO entities (id, entity_type, data, timestamp, synced)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_type, id) DO UPDATE SET
                data = excluded.data,
                timestamp = excluded.timestamp,
                synced = excluded.synced
            "#,
        )
        .bind(&entity.id)
        .bind(&entity.entity_type)
        .bind(data)
        .bind(entity.timestamp)
        .bind(entity.synced)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_entity(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<StoredEntity>, StorageError> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, entity_type, data, timestamp, synced
            FROM entities
            WHERE entity_type = ?1 AND id = ?2
            "#,
        )
        .bind(entity_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredEntity::try_from).transpose()
    }

    async fn delete_entity(&self, entity_type: &str, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM entities WHERE entity_type = ?1 AND id = ?2")
            .bind(entity_type)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_entities_by_type(
        &self,
        entity_type: &str,
    ) -> Result<Vec<StoredEntity>, StorageError> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, entity_type, data, timestamp, synced
            FROM entities
            WHERE entity_type = ?1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredEntity::try_from).collect()
    }

    async fn put_operation(&self, op: QueuedOperation) -> Result<(), StorageError> {
        let data = serde_json::to_string(&op.data)?;

        sqlx::query(
            r#"
            INSERT INTO sync_queue
                (id, user_id, operation, entity_type, entity_id, data, timestamp, synced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                operation = excluded.operation,
                entity_type = excluded.entity_type,
                entity_id = excluded.entity_id,
                data = excluded.data,
                timestamp = excluded.timestamp,
                synced = excluded.synced
            "#,
        )
        .bind(&op.id)
        .bind(&op.user_id)
        .bind(op.operation.as_str())
        .bind(&op.entity_type)
        .bind(&op.entity_id)
        .bind(data)
        .bind(op.timestamp)
        .bind(op.synced)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT id, user_id, operation, entity_type, entity_id, data, timestamp, synced
            FROM sync_queue
            WHERE user_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueuedOperation::try_from).collect()
    }

    async fn get_unsynced_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            r#"
            SELECT id, user_id, operation, entity_type, entity_id, data, timestamp, synced
            FROM sync_queue
            WHERE user_id = ?1 AND synced = 0
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(QueuedOperation::try_from).collect()
    }

    async fn mark_operation_synced(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE sync_queue SET synced = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_operation(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_conflict(&self, conflict: ConflictRecord) -> Result<(), StorageError> {
        let local_version = conflict
            .local_version
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let server_version = conflict
            .server_version
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO conflicts
                (id, user_id, entity_type, entity_id, local_version, server_version,
                 local_timestamp, server_timestamp, detected_at, resolved)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                entity_type = excluded.entity_type,
                entity_id = excluded.entity_id,
                local_version = excluded.local_version,
                server_version = excluded.server_version,
                local_timestamp = excluded.local_timestamp,
                server_timestamp = excluded.server_timestamp,
                detected_at = excluded.detected_at,
                resolved = excluded.resolved
            "#,
        )
        .bind(&conflict.id)
        .bind(&conflict.user_id)
        .bind(&conflict.entity_type)
        .bind(&conflict.entity_id)
        .bind(local_version)
        .bind(server_version)
        .bind(conflict.local_timestamp)
        .bind(conflict.server_timestamp)
        .bind(conflict.detected_at)
        .bind(conflict.resolved)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conflicts_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConflictRecord>, StorageError> {
        let rows = sqlx::query_as::<_, ConflictRow>(
            r#"
            SELECT id, user_id, entity_type, entity_id, local_version, server_version,
                   local_timestamp, server_timestamp, detected_at, resolved
            FROM conflicts
            WHERE user_id = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ConflictRecord::try_from).collect()
    }

    async fn mark_conflict_resolved(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE conflicts SET resolved = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_conflict(&self, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM conflicts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn totals(&self) -> Result<StoreTotals, StorageError> {
        let (entities, pending_operations, unresolved_conflicts): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM entities),
                    (SELECT COUNT(*) FROM sync_queue WHERE synced = 0),
                    (SELECT COUNT(*) FROM conflicts WHERE resolved = 0)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreTotals {
            entities: count(entities),
            pending_operations: count(pending_operations),
            unresolved_conflicts: count(unresolved_conflicts),
        })
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        for table in ["entities", "sync_queue", "conflicts"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Internal row type for the entities table.
#[derive(sqlx::FromRow)]
struct EntityRow {
    id: String,
    entity_type: String,
    data: String,
    timestamp: i64,
    synced: bool,
}

impl TryFrom<EntityRow> for StoredEntity {
    type Error = StorageError;

    fn try_from(row: EntityRow) -> Result<Self, Self::Error> {
        Ok(StoredEntity {
            data: serde_json::from_str(&row.data)?,
            id: row.id,
            entity_type: row.entity_type,
            timestamp: row.timestamp,
            synced: row.synced,
        })
    }
}

/// Internal row type for the sync_queue table.
#[derive(sqlx::FromRow)]
struct OperationRow {
    id: String,
    user_id: String,
    operation: String,
    entity_type: String,
    entity_id: String,
    data: String,
    timestamp: i64,
    synced: bool,
}

impl TryFrom<OperationRow> for QueuedOperation {
    type Error = StorageError;

    fn try_from(row: OperationRow) -> Result<Self, Self::Error> {
        let operation =
            OperationKind::from_str(&row.operation).map_err(|e| StorageError::CorruptRow {
                table: "sync_queue",
                id: row.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(QueuedOperation {
            data: serde_json::from_str(&row.data)?,
            id: row.id,
            user_id: row.user_id,
            operation,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            timestamp: row.timestamp,
            synced: row.synced,
        })
    }
}

/// Internal row type for the conflicts table.
#[derive(sqlx::FromRow)]
struct ConflictRow {
    id: String,
    user_id: String,
    entity_type: String,
    entity_id: String,
    local_version: Option<String>,
    server_version: Option<String>,
    local_timestamp: i64,
    server_timestamp: i64,
    detected_at: i64,
    resolved: bool,
}

impl TryFrom<ConflictRow> for ConflictRecord {
    type Error = StorageError;

    fn try_from(row: ConflictRow) -> Result<Self, Self::Error> {
        Ok(ConflictRecord {
            local_version: row
                .local_version
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            server_version: row
                .server_version
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            id: row.id,
            user_id: row.user_id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            local_timestamp: row.local_timestamp,
            server_timestamp: row.server_timestamp,
            detected_at: row.detected_at,
            resolved: row.resolved,
        })
    }
}
