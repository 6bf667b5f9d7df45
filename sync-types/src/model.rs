//! Persisted records and value types for the offline queue.
//!
//! Entity payloads are opaque `serde_json::Value`s. Semantically they are a
//! mapping of field name to value; a payload that is not a JSON object is
//! treated as having no fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{SyncError, TimestampMillis};

/// Opaque entity payload.
pub type Payload = Value;

/// The kind of mutation recorded by a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// Entity was created
    Create,
    /// Entity was updated
    Update,
    /// Entity was deleted
    Delete,
}

impl OperationKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(OperationKind::Create),
            "UPDATE" => Ok(OperationKind::Update),
            "DELETE" => Ok(OperationKind::Delete),
            _ => Err(SyncError::InvalidOperation(s.to_string())),
        }
    }
}

/// Classification of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// Both sides updated the entity
    UpdateUpdate,
    /// Local updated, server no longer has the entity
    UpdateDelete,
    /// Local deleted, server updated
    DeleteUpdate,
    /// Local created an id the server also has
    CreateCreate,
}

impl ConflictType {
    /// Whether the conflict involves a deletion on one side.
    ///
    /// These always need a human to decide.
    pub fn involves_delete(&self) -> bool {
        matches!(self, ConflictType::UpdateDelete | ConflictType::DeleteUpdate)
    }
}

/// A named rule for collapsing a conflict into one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
    /// Keep the local version
    LocalWins,
    /// Keep the server version
    ServerWins,
    /// Keep whichever version has the later timestamp
    LatestWins,
    /// Field-level merge of both versions
    Merge,
    /// A user supplies the resolved payload
    Manual,
}

impl ResolutionStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [ResolutionStrategy; 5] = [
        ResolutionStrategy::LocalWins,
        ResolutionStrategy::ServerWins,
        ResolutionStrategy::LatestWins,
        ResolutionStrategy::Merge,
        ResolutionStrategy::Manual,
    ];

    /// Wire name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::LocalWins => "LOCAL_WINS",
            ResolutionStrategy::ServerWins => "SERVER_WINS",
            ResolutionStrategy::LatestWins => "LATEST_WINS",
            ResolutionStrategy::Merge => "MERGE",
            ResolutionStrategy::Manual => "MANUAL",
        }
    }

    /// Parse a wire name, returning `None` for anything unrecognized.
    ///
    /// Callers treat `None` as "pick a strategy automatically".
    pub fn parse_lenient(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| SyncError::InvalidStrategy(s.to_string()))
    }
}

/// Cached snapshot of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntity {
    /// Entity id (primary key).
    pub id: String,
    /// Entity type tag (e.g. "task", "habit").
    pub entity_type: String,
    /// Full snapshot.
    pub data: Payload,
    /// Mutation time.
    pub timestamp: TimestampMillis,
    /// Whether the server has acknowledged this snapshot.
    pub synced: bool,
}

/// A durable record of an offline mutation awaiting replay.
///
/// `data` always carries the complete entity snapshot at enqueue time, never
/// a diff, so that earlier operations on the same entity can be discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Unique operation id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Mutation kind.
    pub operation: OperationKind,
    /// Entity type tag.
    pub entity_type: String,
    /// Entity id.
    pub entity_id: String,
    /// Full snapshot.
    pub data: Payload,
    /// Mutation time (replay order).
    pub timestamp: TimestampMillis,
    /// Whether this operation has been replayed to the server.
    pub synced: bool,
}

impl QueuedOperation {
    /// The `(entity_type, entity_id)` pair this operation targets.
    pub fn entity_key(&self) -> (&str, &str) {
        (&self.entity_type, &self.entity_id)
    }
}

/// A detected divergence between local and server state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// Conflict id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Entity type tag.
    pub entity_type: String,
    /// Entity id.
    pub entity_id: String,
    /// Local payload, `None` if the entity does not exist locally.
    pub local_version: Option<Payload>,
    /// Server payload, `None` if the entity does not exist on the server.
    pub server_version: Option<Payload>,
    /// Local mutation time.
    pub local_timestamp: TimestampMillis,
    /// Server mutation time.
    pub server_timestamp: TimestampMillis,
    /// When the conflict was detected.
    pub detected_at: TimestampMillis,
    /// Set by the orchestrator once a resolution has been applied.
    #[serde(default)]
    pub resolved: bool,
}

/// The single payload a conflict collapses into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConflict {
    /// The conflict this resolves.
    pub conflict_id: String,
    /// Strategy that produced the payload.
    pub strategy: ResolutionStrategy,
    /// Resolved payload (`null` when the winning side does not exist).
    pub resolved_data: Payload,
    /// Resolution time.
    pub resolved_at: TimestampMillis,
}
