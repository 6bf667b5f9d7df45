//! In-memory storage backend.
//!
//! Used by tests and by short-lived engines that do not need durability.

use super::{LocalStore, StoreTotals};
use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use sync_types::{ConflictRecord, QueuedOperation, StoredEntity};
use tokio::sync::RwLock;

/// Entities are keyed by `(entity_type, id)`.
type EntityKey = (String, String);

/// A keyed collection that remembers first-insertion order.
#[derive(Debug)]
struct Table<K, T> {
    rows: HashMap<K, (u64, T)>,
}

impl<K: Eq + Hash, T: Clone> Table<K, T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    fn upsert(&mut self, key: K, value: T, seq: &AtomicU64) {
        match self.rows.get_mut(&key) {
            Some((_, existing)) => *existing = value,
            None => {
                let order = seq.fetch_add(1, Ordering::Relaxed);
                self.rows.insert(key, (order, value));
            }
        }
    }

    fn count<F>(&self, keep: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.rows.values().filter(|(_, v)| keep(v)).count()
    }

    fn ordered<F>(&self, keep: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut rows: Vec<_> = self.rows.values().filter(|(_, v)| keep(v)).collect();
        rows.sort_by_key(|(order, _)| *order);
        rows.into_iter().map(|(_, v)| v.clone()).collect()
    }
}

/// Local store held entirely in memory.
///
/// Each collection sits behind its own lock. [`LocalStore::clear_all`]
/// takes all three write locks in the fixed order entities, operations,
/// conflicts before touching anything.
#[derive(Debug)]
pub struct MemoryStore {
    entities: RwLock<Table<EntityKey, StoredEntity>>,
    operations: RwLock<Table<String, QueuedOperation>>,
    conflicts: RwLock<Table<String, ConflictRecord>>,
    seq: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(Table::new()),
            operations: RwLock::new(Table::new()),
            conflicts: RwLock::new(Table::new()),
            seq: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn put_entity(&self, entity: StoredEntity) -> Result<(), StorageError> {
        let mut entities = self.entities.write().await;
        let key = (entity.entity_type.clone(), entity.id.clone());
        entities.upsert(key, entity, &self.seq);
        Ok(())
    }

    async fn get_entity(
        &self,
        entity_type: &str,
        id: &str,
    ) -> Result<Option<StoredEntity>, StorageError> {
        let entities = self.entities.read().await;
        let key = (entity_type.to_string(), id.to_string());
        Ok(entities.rows.get(&key).map(|(_, e)| e.clone()))
    }

    async fn delete_entity(&self, entity_type: &str, id: &str) -> Result<(), StorageError> {
        let key = (entity_type.to_string(), id.to_string());
        self.entities.write().await.rows.remove(&key);
        Ok(())
    }

    async fn get_entities_by_type(
        &self,
        entity_type: &str,
    ) -> Result<Vec<StoredEntity>, StorageError> {
        let entities = self.entities.read().await;
        Ok(entities.ordered(|e| e.entity_type == entity_type))
    }

    async fn put_operation(&self, op: QueuedOperation) -> Result<(), StorageError> {
        let mut operations = self.operations.write().await;
        operations.upsert(op.id.clone(), op, &self.seq);
        Ok(())
    }

    async fn get_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError> {
        let operations = self.operations.read().await;
        Ok(operations.ordered(|op| op.user_id == user_id))
    }

    async fn get_unsynced_operations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<QueuedOperation>, StorageError> {
        let operations = self.operations.read().await;
        Ok(operations.ordered(|op| op.user_id == user_id && !op.synced))
    }

    async fn mark_operation_synced(&self, id: &str) -> Result<(), StorageError> {
        if let Some((_, op)) = self.operations.write().await.rows.get_mut(id) {
            op.synced = true;
        }
        Ok(())
    }

    async fn delete_operation(&self, id: &str) -> Result<(), StorageError> {
        self.operations.write().await.rows.remove(id);
        Ok(())
    }

    async fn put_conflict(&self, conflict: ConflictRecord) -> Result<(), StorageError> {
        let mut conflicts = self.conflicts.write().await;
        conflicts.upsert(conflict.id.clone(), conflict, &self.seq);
        Ok(())
    }

    async fn get_conflicts_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConflictRecord>, StorageError> {
        let conflicts = self.conflicts.read().await;
        Ok(conflicts.ordered(|c| c.user_id == user_id))
    }

    async fn mark_conflict_resolved(&self, id: &str) -> Result<(), StorageError> {
        if let Some((_, conflict)) = self.conflicts.write().await.rows.get_mut(id) {
            conflict.resolved = true;
        }
        Ok(())
    }

    async fn delete_conflict(&self, id: &str) -> Result<(), StorageError> {
        self.conflicts.write().await.rows.remove(id);
        Ok(())
    }

    async fn totals(&self) -> Result<StoreTotals, StorageError> {
        let entities = self.entities.read().await.rows.len();
        let pending_operations = self.operations.read().await.count(|op| !op.synced);
        let unresolved_conflicts = self.conflicts.read().await.count(|c| !c.resolved);

        Ok(StoreTotals {
            entities,
            pending_operations,
            unresolved_conflicts,
        })
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut entities = self.entities.write().await;
        let mut operations = self.operations.write().await;
        let mut conflicts = self.conflicts.write().await;

        entities.rows.clear();
        operations.rows.clear();
        conflicts.rows.clear();
        Ok(())
    }
}
