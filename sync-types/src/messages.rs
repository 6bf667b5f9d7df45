//! Request and response shapes exchanged with the CRUD and UI layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    ConflictRecord, OperationKind, Payload, QueuedOperation, ResolvedConflict, SyncError,
    TimestampMillis,
};

/// One operation inside a batch sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperation {
    /// Queued operation id.
    pub id: String,
    /// Mutation kind.
    pub operation: OperationKind,
    /// Entity type tag.
    pub entity: String,
    /// Entity id.
    pub entity_id: String,
    /// Full snapshot.
    pub data: Payload,
    /// Mutation time.
    pub timestamp: TimestampMillis,
}

impl From<&QueuedOperation> for BatchOperation {
    fn from(op: &QueuedOperation) -> Self {
        Self {
            id: op.id.clone(),
            operation: op.operation,
            entity: op.entity_type.clone(),
            entity_id: op.entity_id.clone(),
            data: op.data.clone(),
            timestamp: op.timestamp,
        }
    }
}

/// Batch of queued operations replayed to the server in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSyncRequest {
    /// Operations in replay order.
    pub operations: Vec<BatchOperation>,
}

impl BatchSyncRequest {
    /// Build a request from queued operations, preserving their order.
    pub fn from_operations<'a>(ops: impl IntoIterator<Item = &'a QueuedOperation>) -> Self {
        Self {
            operations: ops.into_iter().map(BatchOperation::from).collect(),
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Deserialization)
    }
}

/// Outcome for a single operation of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// The operation this result belongs to.
    pub operation_id: String,
    /// Whether the server applied it.
    pub success: bool,
}

/// Server response to a batch sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSyncResponse {
    /// Per-operation outcomes.
    pub results: Vec<OperationResult>,
    /// Number of operations processed.
    pub total_processed: usize,
    /// Number applied successfully.
    pub successful: usize,
    /// Number rejected.
    pub failed: usize,
}

impl BatchSyncResponse {
    /// Build a response, computing the totals from the results.
    pub fn from_results(results: Vec<OperationResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total_processed: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    /// Ids of the operations the server applied.
    pub fn successful_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.operation_id.as_str())
    }
}

/// Request to resolve a stored conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictResolutionRequest {
    /// Conflict to resolve.
    pub conflict_id: String,
    /// Strategy name; unrecognized names select a strategy automatically.
    pub strategy: String,
    /// Payload chosen by the user, required for `MANUAL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_data: Option<Payload>,
}

/// Response to a conflict resolution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolutionResponse {
    /// Whether the resolution was applied.
    pub success: bool,
    /// The resolution, when one was produced.
    pub conflict: Option<ResolvedConflict>,
    /// Human-readable outcome.
    pub message: String,
}

impl ConflictResolutionResponse {
    /// A successful resolution.
    pub fn resolved(conflict: ResolvedConflict) -> Self {
        let message = format!("conflict resolved with {}", conflict.strategy);
        Self {
            success: true,
            conflict: Some(conflict),
            message,
        }
    }

    /// A resolution that could not be applied.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            conflict: None,
            message: message.into(),
        }
    }
}

/// Snapshot of queue and conflict state for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// All queued operations, synced or not.
    pub total_operations: usize,
    /// Operations already replayed.
    pub synced_operations: usize,
    /// Operations awaiting replay.
    pub pending_operations: usize,
    /// Conflicts without an applied resolution.
    pub unresolved_conflicts: usize,
    /// Pending operation count per entity type.
    pub pending_by_entity_type: BTreeMap<String, usize>,
    /// The unresolved conflicts.
    pub conflicts: Vec<ConflictRecord>,
}
