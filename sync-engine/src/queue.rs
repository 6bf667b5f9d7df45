//! Sync queue manager.
//!
//! Records operations made while offline and hands them back in replay
//! order once connectivity returns. No network I/O happens here.

use crate::error::StorageResult;
use crate::storage::LocalStore;
use std::sync::Arc;
use sync_core::{plan_deduplication, sort_for_replay};
use sync_types::{new_record_id, now_millis, OperationKind, Payload, QueuedOperation, TimestampMillis};
use tracing::{debug, info};

/// Queue of pending operations, one logical queue per user.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<dyn LocalStore>,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue").finish_non_exhaustive()
    }
}

impl SyncQueue {
    /// Create a queue over the given store.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Queue an operation stamped with the current time.
    ///
    /// Returns the new operation id.
    pub async fn queue_operation(
        &self,
        user_id: &str,
        operation: OperationKind,
        entity_type: &str,
        entity_id: &str,
        data: Payload,
    ) -> StorageResult<String> {
        self.queue_operation_at(user_id, operation, entity_type, entity_id, data, now_millis())
            .await
    }

    /// Queue an operation with a timestamp supplied by the caller.
    pub async fn queue_operation_at(
        &self,
        user_id: &str,
        operation: OperationKind,
        entity_type: &str,
        entity_id: &str,
        data: Payload,
        timestamp: TimestampMillis,
    ) -> StorageResult<String> {
        let op = QueuedOperation {
            id: new_record_id(),
            user_id: user_id.to_string(),
            operation,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            timestamp,
            synced: false,
        };
        let id = op.id.clone();

        self.store.put_operation(op).await?;
        debug!(
            user_id,
            op_id = %id,
            %operation,
            entity_type,
            entity_id,
            "Queued operation"
        );
        Ok(id)
    }

    /// Unsynced operations for a user, oldest first.
    pub async fn get_unsynced_operations(
        &self,
        user_id: &str,
    ) -> StorageResult<Vec<QueuedOperation>> {
        let mut ops = self.store.get_unsynced_operations_for_user(user_id).await?;
        sort_for_replay(&mut ops);
        Ok(ops)
    }

    /// Flag an operation as synced. Unknown ids are ignored.
    pub async fn mark_synced(&self, op_id: &str) -> StorageResult<()> {
        self.store.mark_operation_synced(op_id).await
    }

    /// Remove an operation from the queue. Unknown ids are ignored.
    pub async fn remove_operation(&self, op_id: &str) -> StorageResult<()> {
        self.store.delete_operation(op_id).await
    }

    /// Number of unsynced operations for a user.
    pub async fn get_unsynced_count(&self, user_id: &str) -> StorageResult<usize> {
        Ok(self.store.get_unsynced_operations_for_user(user_id).await?.len())
    }

    /// Delete every synced operation of a user. Returns how many went.
    pub async fn clear_synced_operations(&self, user_id: &str) -> StorageResult<usize> {
        let synced: Vec<_> = self
            .store
            .get_operations_for_user(user_id)
            .await?
            .into_iter()
            .filter(|op| op.synced)
            .collect();

        for op in &synced {
            self.store.delete_operation(&op.id).await?;
        }

        if !synced.is_empty() {
            info!(user_id, removed = synced.len(), "Cleared synced operations");
        }
        Ok(synced.len())
    }

    /// Collapse unsynced operations so only the latest per entity remains.
    ///
    /// Intermediate states are dropped and never replayed. Returns the number
    /// of operations removed.
    pub async fn deduplicate_queue(&self, user_id: &str) -> StorageResult<usize> {
        let ops = self.store.get_unsynced_operations_for_user(user_id).await?;
        let doomed = plan_deduplication(&ops);

        for id in &doomed {
            self.store.delete_operation(id).await?;
        }

        if !doomed.is_empty() {
            info!(user_id, removed = doomed.len(), "Deduplicated sync queue");
        }
        Ok(doomed.len())
    }

    /// Whether an entity has any unsynced operation queued.
    pub async fn has_pending_operations(
        &self,
        user_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> StorageResult<bool> {
        let ops = self.store.get_unsynced_operations_for_user(user_id).await?;
        Ok(ops
            .iter()
            .any(|op| op.entity_type == entity_type && op.entity_id == entity_id))
    }
}
