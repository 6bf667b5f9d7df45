//! # sync-types
//!
//! Data model and wire types for the offline mutation queue.
//!
//! This crate provides the foundational types used across all offline-sync crates:
//! - [`StoredEntity`], [`QueuedOperation`], [`ConflictRecord`] - Persisted records
//! - [`ResolvedConflict`], [`ResolutionStrategy`], [`ConflictType`] - Resolution values
//! - [`BatchSyncRequest`], [`ConflictResolutionRequest`], [`SyncStatus`] - Wire shapes
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod model;

pub use error::SyncError;
pub use ids::{new_record_id, now_millis, TimestampMillis};
pub use messages::{
    BatchOperation, BatchSyncRequest, BatchSyncResponse, ConflictResolutionRequest,
    ConflictResolutionResponse, OperationResult, SyncStatus,
};
pub use model::{
    ConflictRecord, ConflictType, OperationKind, Payload, QueuedOperation, ResolutionStrategy,
    ResolvedConflict, StoredEntity,
};
