//! Remote server abstraction.
//!
//! The engine never talks to a concrete backend. It sees the authoritative
//! CRUD server through [`RemoteServer`], which can fetch the current
//! snapshot of an entity and accept a batch of queued operations.
//!
//! Errors are split in two: [`RemoteError::Network`] means "try again
//! later, keep everything queued", [`RemoteError::Rejected`] means the
//! server answered and said no.

mod mock;

pub use mock::MockRemote;

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use sync_types::{BatchSyncRequest, BatchSyncResponse, Payload, TimestampMillis};

/// The server's current copy of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    /// Entity payload as the server holds it.
    pub data: Payload,
    /// When the server last changed it.
    pub timestamp: TimestampMillis,
}

/// The authoritative CRUD backend.
#[async_trait]
pub trait RemoteServer: Send + Sync {
    /// Current server copy of an entity, or `None` if the server has none.
    async fn fetch_entity(
        &self,
        user_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> RemoteResult<Option<ServerSnapshot>>;

    /// Apply a batch of operations. Each operation gets its own result.
    async fn push_batch(
        &self,
        user_id: &str,
        request: &BatchSyncRequest,
    ) -> RemoteResult<BatchSyncResponse>;
}

/// A remote that is never reachable.
///
/// Lets the engine run purely locally: mutations queue, syncs fail with a
/// network error and leave the queue untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

#[async_trait]
impl RemoteServer for Disconnected {
    async fn fetch_entity(
        &self,
        _user_id: &str,
        _entity_type: &str,
        _entity_id: &str,
    ) -> RemoteResult<Option<ServerSnapshot>> {
        Err(RemoteError::Network("no remote server configured".into()))
    }

    async fn push_batch(
        &self,
        _user_id: &str,
        _request: &BatchSyncRequest,
    ) -> RemoteResult<BatchSyncResponse> {
        Err(RemoteError::Network("no remote server configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_always_reports_network_errors() {
        let remote = Disconnected;
        let fetch = remote.fetch_entity("u", "task", "t1").await.unwrap_err();
        assert!(fetch.is_network());

        let push = remote
            .push_batch("u", &BatchSyncRequest::default())
            .await
            .unwrap_err();
        assert!(push.is_network());
    }
}
