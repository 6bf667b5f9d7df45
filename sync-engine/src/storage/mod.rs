//! Local store for sync-engine.
//!
//! Durable key-indexed storage for three independent collections: cached
//! entity snapshots, queued operations, and detected conflicts. Pure
//! persistence, no business logic.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use serde::Serialize;
use sync_types::{ConflictRecord, QueuedOperation, StoredEntity};

/// Trait for local store backends.
///
/// Entities are keyed by `(entity_type, id)`; the same id may exist under
/// several types. Every call is its own atomic unit; nothing spans collections except
/// [`LocalStore::clear_all`]. Marking or deleting an id that does not exist
/// is a no-op. Failures are returned as-is; retrying is the caller's job.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert or overwrite a cached entity snapshot.
    async fn put_entity(&self, entity: StoredEntity) -> Result<(), StorageError>;

    /// Get a cached entity by type and id.
    async fn get_entity(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<StoredEntity>, StorageError>;

    /// Delete a cached entity.
    async fn delete_entity(&self, entity_type: &str, id: &str) -> Result<(), StorageError>;

    /// All cached entities of one type.
    async fn get_entities_by_type(
        &self,
        entity_type: &str,
    ) -> Result<Vec<StoredEntity>, StorageError>;

    /// Insert or overwrite a queued operation.
    async fn put_operation(&self, op: QueuedOperation) -> Result<(), StorageError>;

    /// All queued operations of a user, synced or not, in insertion order.
    async fn get_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError>;

    /// Unsynced queued operations of a user, in insertion order.
    async fn get_unsynced_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError>;

    /// Flag a queued operation as synced.
    async fn mark_operation_synced(&self, id: &str) -> Result<(), StorageError>;

    /// Delete a queued operation.
    async fn delete_operation(&self, id: &str) -> Result<(), StorageError>;

    /// Insert or overwrite a conflict record.
    async fn put_conflict(&self, conflict: ConflictRecord) -> Result<(), StorageError>;

    /// All conflict records of a user, in detection order.
    async fn get_conflicts_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConflictRecord>, StorageError>;

    /// Flag a conflict as resolved.
    async fn mark_conflict_resolved(&self, id: &str) -> Result<(), StorageError>;

    /// Delete a conflict record.
    async fn delete_conflict(&self, id: &str) -> Result<(), StorageError>;

    /// Row counts across every user.
    async fn totals(&self) -> Result<StoreTotals, StorageError>;

    /// Remove every row from all three collections atomically.
    async fn clear_all(&self) -> Result<(), StorageError>;
}

/// Row counts reported by [`LocalStore::totals`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreTotals {
    /// Cached entity snapshots.
    pub entities: usize,
    /// Queued operations not yet synced.
    pub pending_operations: usize,
    /// Conflicts still waiting for a decision.
    pub unresolved_conflicts: usize,
}
