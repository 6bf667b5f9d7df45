//! In-process stand-in for the CRUD server.
//!
//! Holds entity snapshots in memory, applies pushed batches to them and
//! records every request so tests can inspect what was sent.

use super::{RemoteServer, ServerSnapshot};
use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_types::{
    BatchSyncRequest, BatchSyncResponse, OperationKind, OperationResult, Payload, TimestampMillis,
};

type EntityKey = (String, String, String);

/// Mock remote server for testing.
#[derive(Debug, Default, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    offline: bool,
    entities: HashMap<EntityKey, ServerSnapshot>,
    pushed: Vec<BatchSyncRequest>,
    rejected_ids: HashSet<String>,
    rejected_entities: HashSet<(String, String)>,
    fail_next_fetch: Option<String>,
    fail_next_push: Option<String>,
    fetches: usize,
}

fn key(user_id: &str, entity_type: &str, entity_id: &str) -> EntityKey {
    (user_id.into(), entity_type.into(), entity_id.into())
}

impl MockRemote {
    /// Create an empty, reachable mock server.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed the server with an entity snapshot.
    pub fn insert_entity(
        &self,
        user_id: &str,
        entity_type: &str,
        entity_id: &str,
        data: Payload,
        timestamp: TimestampMillis,
    ) {
        self.lock().entities.insert(
            key(user_id, entity_type, entity_id),
            ServerSnapshot { data, timestamp },
        );
    }

    /// Current server copy of an entity.
    pub fn entity(&self, user_id: &str, entity_type: &str, entity_id: &str) -> Option<ServerSnapshot> {
        self.lock()
            .entities
            .get(&key(user_id, entity_type, entity_id))
            .cloned()
    }

    /// Make every call fail with a network error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Report failure for the operation with this id in future batches.
    pub fn reject_operation(&self, op_id: &str) {
        self.lock().rejected_ids.insert(op_id.to_string());
    }

    /// Report failure for every future operation on this entity.
    pub fn reject_entity(&self, entity_type: &str, entity_id: &str) {
        self.lock()
            .rejected_entities
            .insert((entity_type.to_string(), entity_id.to_string()));
    }

    /// Cause the next `fetch_entity()` to fail with a network error.
    pub fn fail_next_fetch(&self, error: &str) {
        self.lock().fail_next_fetch = Some(error.to_string());
    }

    /// Cause the next `push_batch()` to fail with a network error.
    pub fn fail_next_push(&self, error: &str) {
        self.lock().fail_next_push = Some(error.to_string());
    }

    /// All batches received so far.
    pub fn pushed_batches(&self) -> Vec<BatchSyncRequest> {
        self.lock().pushed.clone()
    }

    /// Number of `fetch_entity()` calls served.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }
}

#[async_trait]
impl RemoteServer for MockRemote {
    async fn fetch_entity(
        &self,
        user_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> RemoteResult<Option<ServerSnapshot>> {
        let mut inner = self.lock();

        if inner.offline {
            return Err(RemoteError::Network("server unreachable".into()));
        }
        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(RemoteError::Network(error));
        }

        inner.fetches += 1;
        Ok(inner
            .entities
            .get(&key(user_id, entity_type, entity_id))
            .cloned())
    }

    async fn push_batch(
        &self,
        user_id: &str,
        request: &BatchSyncRequest,
    ) -> RemoteResult<BatchSyncResponse> {
        let mut inner = self.lock();

        if inner.offline {
            return Err(RemoteError::Network("server unreachable".into()));
        }
        if let Some(error) = inner.fail_next_push.take() {
            return Err(RemoteError::Network(error));
        }

        inner.pushed.push(request.clone());

        let mut results = Vec::with_capacity(request.operations.len());
        for op in &request.operations {
            let success = !inner.rejected_ids.contains(&op.id)
                && !inner
                    .rejected_entities
                    .contains(&(op.entity.clone(), op.entity_id.clone()));
            if success {
                let k = key(user_id, &op.entity, &op.entity_id);
                match op.operation {
                    OperationKind::Create | OperationKind::Update => {
                        inner.entities.insert(
                            k,
                            ServerSnapshot {
                                data: op.data.clone(),
                                timestamp: op.timestamp,
                            },
                        );
                    }
                    OperationKind::Delete => {
                        inner.entities.remove(&k);
                    }
                }
            }
            results.push(OperationResult {
                operation_id: op.id.clone(),
                success,
            });
        }

        Ok(BatchSyncResponse::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_types::QueuedOperation;

    fn op(id: &str, kind: OperationKind, ts: i64) -> QueuedOperation {
        QueuedOperation {
            id: id.into(),
            user_id: "u".into(),
            operation: kind,
            entity_type: "task".into(),
            entity_id: "t1".into(),
            data: json!({"title": id}),
            timestamp: ts,
            synced: false,
        }
    }

    #[tokio::test]
    async fn pushed_operations_are_applied() {
        let remote = MockRemote::new();
        let batch = BatchSyncRequest::from_operations(&[op("a", OperationKind::Create, 1)]);

        let response = remote.push_batch("u", &batch).await.unwrap();
        assert_eq!(response.successful, 1);
        assert_eq!(
            remote.fetch_entity("u", "task", "t1").await.unwrap(),
            Some(ServerSnapshot {
                data: json!({"title": "a"}),
                timestamp: 1
            })
        );

        let delete = BatchSyncRequest::from_operations(&[op("b", OperationKind::Delete, 2)]);
        remote.push_batch("u", &delete).await.unwrap();
        assert!(remote.entity("u", "task", "t1").is_none());
        assert_eq!(remote.pushed_batches().len(), 2);
    }

    #[tokio::test]
    async fn rejected_operations_report_failure() {
        let remote = MockRemote::new();
        remote.reject_operation("bad");

        let batch = BatchSyncRequest::from_operations(&[
            op("good", OperationKind::Update, 1),
            op("bad", OperationKind::Update, 2),
        ]);
        let response = remote.push_batch("u", &batch).await.unwrap();

        assert_eq!(response.successful, 1);
        assert_eq!(response.failed, 1);
        assert_eq!(remote.entity("u", "task", "t1").unwrap().timestamp, 1);
    }

    #[tokio::test]
    async fn rejected_entities_refuse_every_operation() {
        let remote = MockRemote::new();
        remote.insert_entity("u", "task", "t1", json!({"title": "server"}), 1);
        remote.reject_entity("task", "t1");

        let batch = BatchSyncRequest::from_operations(&[
            op("x", OperationKind::Update, 2),
            op("y", OperationKind::Delete, 3),
        ]);
        let response = remote.push_batch("u", &batch).await.unwrap();

        assert_eq!(response.failed, 2);
        assert_eq!(remote.entity("u", "task", "t1").unwrap().timestamp, 1);
    }

    #[tokio::test]
    async fn forced_failures_fire_once() {
        let remote = MockRemote::new();
        remote.fail_next_fetch("timeout");

        assert!(remote.fetch_entity("u", "task", "t1").await.is_err());
        assert!(remote.fetch_entity("u", "task", "t1").await.is_ok());
        assert_eq!(remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn offline_blocks_everything() {
        let remote = MockRemote::new();
        remote.set_offline(true);

        let err = remote
            .push_batch("u", &BatchSyncRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(remote.pushed_batches().is_empty());

        remote.set_offline(false);
        assert!(remote.push_batch("u", &BatchSyncRequest::default()).await.is_ok());
    }
}
