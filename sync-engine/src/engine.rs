//! Sync orchestrator.
//!
//! Ties the local store, the queue, the pure conflict logic and a remote
//! server together:
//!
//! ```text
//!  record_mutation ──► cache ──► online? ──► push (1 op)
//!                                   │ no / network error
//!                                   ▼
//!                               SyncQueue
//!                                   │ sync()
//!                                   ▼
//!        dedup ─► fetch server copy ─► detect ─► auto-resolve ─► push batches
//!                                         │ not auto-resolvable
//!                                         ▼
//!                                 ConflictRecord (waits for resolve())
//! ```
//!
//! A sync attempt runs once. Nothing here retries on its own.

use crate::config::{Config, SyncConfig};
use crate::error::{EngineError, RemoteError, Result};
use crate::queue::SyncQueue;
use crate::remote::{RemoteServer, ServerSnapshot};
use crate::storage::{LocalStore, SqliteStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sync_core::{
    auto_resolve, can_auto_resolve, detect_conflict, get_conflict_type, resolve_conflict,
    resolve_with_data, ResolveError,
};
use sync_types::{
    new_record_id, now_millis, BatchSyncRequest, ConflictRecord, ConflictResolutionRequest,
    ConflictResolutionResponse, OperationKind, Payload, QueuedOperation, ResolutionStrategy,
    ResolvedConflict, StoredEntity, SyncStatus, TimestampMillis,
};
use tracing::{debug, info, warn};

/// Operational counters for the engine.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Mutations recorded through [`SyncEngine::record_mutation`].
    pub mutations_total: AtomicU64,
    /// Operations that went into the queue instead of straight to the server.
    pub operations_queued: AtomicU64,
    /// Operations the server accepted.
    pub operations_pushed: AtomicU64,
    /// Operations the server refused.
    pub operations_failed: AtomicU64,
    /// Sync attempts started.
    pub sync_attempts: AtomicU64,
    /// Sync attempts aborted by a network error.
    pub sync_failures: AtomicU64,
    /// Conflicts found during sync.
    pub conflicts_detected: AtomicU64,
    /// Conflicts resolved without user involvement.
    pub conflicts_auto_resolved: AtomicU64,
    /// Conflicts resolved through [`SyncEngine::resolve`].
    pub conflicts_resolved: AtomicU64,
}

fn bump(counter: &AtomicU64, by: usize) {
    counter.fetch_add(by as u64, Ordering::Relaxed);
}

/// Knobs for a sync attempt.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum operations per pushed batch. Zero is treated as one.
    pub batch_size: usize,
    /// Collapse the queue before replaying it.
    pub deduplicate_before_sync: bool,
    /// Drop synced operations at the end of an attempt.
    pub clear_synced_after_sync: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for EngineSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            deduplicate_before_sync: config.deduplicate_before_sync,
            clear_synced_after_sync: config.clear_synced_after_sync,
        }
    }
}

/// What happened to a recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server accepted it immediately.
    Applied,
    /// It waits in the queue under this operation id.
    Queued(String),
}

/// What [`SyncEngine::resolve`] did with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    /// The conflict is resolved and its payload queued.
    Resolved(ResolvedConflict),
    /// The user has no conflict with this id.
    NotFound {
        /// Requested conflict id.
        conflict_id: String,
    },
    /// The conflict was resolved earlier.
    AlreadyResolved {
        /// Requested conflict id.
        conflict_id: String,
    },
    /// The strategy needs a payload the request did not carry.
    NeedsInput {
        /// Why the strategy could not run.
        reason: String,
    },
}

impl ResolveOutcome {
    /// Whether the conflict was resolved by this request.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolveOutcome::Resolved(_))
    }
}

impl From<ResolveOutcome> for ConflictResolutionResponse {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::Resolved(resolved) => ConflictResolutionResponse::resolved(resolved),
            ResolveOutcome::NotFound { conflict_id } => {
                ConflictResolutionResponse::failed(format!("conflict {conflict_id} not found"))
            }
            ResolveOutcome::AlreadyResolved { conflict_id } => ConflictResolutionResponse::failed(
                format!("conflict {conflict_id} is already resolved"),
            ),
            ResolveOutcome::NeedsInput { reason } => ConflictResolutionResponse::failed(reason),
        }
    }
}

/// Summary of one sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Operations dropped by deduplication.
    pub deduplicated: usize,
    /// Operations the server accepted.
    pub pushed: usize,
    /// Operations the server refused. They stay queued.
    pub failed: usize,
    /// Conflicts detected.
    pub conflicts_detected: usize,
    /// Conflicts resolved automatically and pushed.
    pub auto_resolved: usize,
    /// Conflicts stored for the user to resolve.
    pub pending_conflicts: usize,
    /// Synced operations cleared at the end.
    pub cleared: usize,
}

/// Offline-first sync orchestrator.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    queue: SyncQueue,
    remote: Arc<dyn RemoteServer>,
    settings: EngineSettings,
    metrics: Arc<EngineMetrics>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("settings", &self.settings)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Create an engine over a store and a remote server.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteServer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            queue: SyncQueue::new(Arc::clone(&store)),
            store,
            remote,
            settings,
            metrics: Arc::new(EngineMetrics::default()),
        }
    }

    /// Open the SQLite store named by `config` and build an engine over it.
    pub async fn open(config: &Config, remote: Arc<dyn RemoteServer>) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::new(&config.storage.database).await?;
        Ok(Self::new(
            Arc::new(store),
            remote,
            EngineSettings::from(&config.sync),
        ))
    }

    /// The underlying queue.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Engine counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Apply a local mutation.
    ///
    /// The local cache is updated first. When `online`, the mutation is
    /// pushed right away; if that fails with a network error, or when
    /// offline, it is queued instead. A server rejection is returned as an
    /// error, nothing is queued and the cached row goes back to what it was
    /// before the call.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_mutation(
        &self,
        user_id: &str,
        operation: OperationKind,
        entity_type: &str,
        entity_id: &str,
        data: Payload,
        timestamp: TimestampMillis,
        online: bool,
    ) -> Result<MutationOutcome> {
        bump(&self.metrics.mutations_total, 1);
        let previous = if online {
            self.store.get_entity(entity_type, entity_id).await?
        } else {
            None
        };
        self.apply_to_cache(operation, entity_type, entity_id, &data, timestamp)
            .await?;

        if online {
            let op = QueuedOperation {
                id: new_record_id(),
                user_id: user_id.to_string(),
                operation,
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                data: data.clone(),
                timestamp,
                synced: false,
            };
            let request = BatchSyncRequest::from_operations([&op]);

            match self.remote.push_batch(user_id, &request).await {
                Ok(response) if response.successful_ids().any(|id| id == op.id) => {
                    bump(&self.metrics.operations_pushed, 1);
                    if operation != OperationKind::Delete {
                        self.mark_entity_synced(entity_type, entity_id).await?;
                    }
                    return Ok(MutationOutcome::Applied);
                }
                Ok(_) => {
                    bump(&self.metrics.operations_failed, 1);
                    self.restore_cache(entity_type, entity_id, previous).await?;
                    return Err(RemoteError::Rejected {
                        reason: format!("{operation} {entity_type}/{entity_id} refused"),
                    }
                    .into());
                }
                Err(e) if e.is_network() => {
                    warn!(user_id, entity_type, entity_id, error = %e, "Push failed, queueing");
                }
                Err(e) => {
                    bump(&self.metrics.operations_failed, 1);
                    self.restore_cache(entity_type, entity_id, previous).await?;
                    return Err(e.into());
                }
            }
        }

        let op_id = self
            .queue
            .queue_operation_at(user_id, operation, entity_type, entity_id, data, timestamp)
            .await?;
        bump(&self.metrics.operations_queued, 1);
        Ok(MutationOutcome::Queued(op_id))
    }

    /// Replay the queue of one user against the remote server.
    ///
    /// A network error aborts the attempt. Operations not yet accepted stay
    /// queued and no conflict from the aborted attempt is stored.
    pub async fn sync(&self, user_id: &str) -> Result<SyncReport> {
        bump(&self.metrics.sync_attempts, 1);
        let result = self.run_sync(user_id).await;

        match &result {
            Ok(report) => info!(
                user_id,
                pushed = report.pushed,
                failed = report.failed,
                conflicts = report.conflicts_detected,
                auto_resolved = report.auto_resolved,
                "Sync finished"
            ),
            Err(e) => {
                bump(&self.metrics.sync_failures, 1);
                warn!(user_id, error = %e, "Sync aborted");
            }
        }
        result
    }

    async fn run_sync(&self, user_id: &str) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if self.settings.deduplicate_before_sync {
            report.deduplicated = self.queue.deduplicate_queue(user_id).await?;
        }

        let ops = self.queue.get_unsynced_operations(user_id).await?;
        if ops.is_empty() {
            debug!(user_id, "Nothing to sync");
        }

        let mut to_push = Vec::with_capacity(ops.len());
        let mut held = Vec::new();

        for mut op in ops {
            let server = self
                .remote
                .fetch_entity(user_id, &op.entity_type, &op.entity_id)
                .await?;

            let Some(conflict) = classify(&op, server.as_ref()) else {
                to_push.push(op);
                continue;
            };

            report.conflicts_detected += 1;
            let local = conflict.local_version.clone().unwrap_or(Payload::Null);
            let remote = conflict.server_version.clone().unwrap_or(Payload::Null);
            let conflict_type = get_conflict_type(
                conflict.local_version.is_some(),
                conflict.server_version.is_some(),
                op.operation,
                None,
            );

            if can_auto_resolve(&local, &remote, conflict_type) {
                let resolved = auto_resolve(&conflict);
                debug!(
                    user_id,
                    entity_id = %op.entity_id,
                    strategy = %resolved.strategy,
                    "Auto-resolved conflict"
                );
                op.data = resolved.resolved_data;
                op.timestamp = op.timestamp.max(conflict.server_timestamp);
                self.apply_to_cache(op.operation, &op.entity_type, &op.entity_id, &op.data, op.timestamp)
                    .await?;
                report.auto_resolved += 1;
                to_push.push(op);
            } else {
                info!(
                    user_id,
                    entity_id = %op.entity_id,
                    ?conflict_type,
                    "Conflict needs resolution"
                );
                held.push((op.id.clone(), conflict));
            }
        }

        // Classification is complete, so nothing below is undone by a later
        // network error.
        for (op_id, conflict) in held {
            self.store.put_conflict(conflict).await?;
            self.queue.mark_synced(&op_id).await?;
            report.pending_conflicts += 1;
        }
        bump(&self.metrics.conflicts_detected, report.conflicts_detected);
        bump(&self.metrics.conflicts_auto_resolved, report.auto_resolved);

        let batch_size = self.settings.batch_size.max(1);
        for chunk in to_push.chunks(batch_size) {
            let request = BatchSyncRequest::from_operations(chunk);
            let response = match self.remote.push_batch(user_id, &request).await {
                Ok(response) => response,
                Err(RemoteError::Rejected { reason }) => {
                    warn!(user_id, %reason, size = chunk.len(), "Batch rejected");
                    report.failed += chunk.len();
                    bump(&self.metrics.operations_failed, chunk.len());
                    continue;
                }
                Err(e) => return Err(EngineError::Remote(e)),
            };

            let by_id: HashMap<&str, &QueuedOperation> =
                chunk.iter().map(|op| (op.id.as_str(), op)).collect();

            let mut accepted = 0;
            for id in response.successful_ids() {
                let Some(op) = by_id.get(id) else {
                    continue;
                };
                self.queue.mark_synced(id).await?;
                if op.operation != OperationKind::Delete {
                    self.mark_entity_synced(&op.entity_type, &op.entity_id).await?;
                }
                accepted += 1;
            }

            report.pushed += accepted;
            report.failed += chunk.len() - accepted;
            bump(&self.metrics.operations_pushed, accepted);
            bump(&self.metrics.operations_failed, chunk.len() - accepted);
        }

        if self.settings.clear_synced_after_sync {
            report.cleared = self.queue.clear_synced_operations(user_id).await?;
        }

        Ok(report)
    }

    /// Apply a resolution request to a stored conflict.
    ///
    /// The resolved payload is cached locally and queued as an UPDATE (or a
    /// DELETE when the resolution is "no entity"), then the conflict is
    /// flagged resolved. Requests that cannot be applied change nothing;
    /// the outcome says why. Convert it into a
    /// [`ConflictResolutionResponse`] for the wire.
    pub async fn resolve(
        &self,
        user_id: &str,
        request: ConflictResolutionRequest,
    ) -> Result<ResolveOutcome> {
        let conflicts = self.store.get_conflicts_for_user(user_id).await?;
        let Some(conflict) = conflicts.into_iter().find(|c| c.id == request.conflict_id) else {
            return Ok(ResolveOutcome::NotFound {
                conflict_id: request.conflict_id,
            });
        };
        if conflict.resolved {
            return Ok(ResolveOutcome::AlreadyResolved {
                conflict_id: conflict.id,
            });
        }

        let strategy = ResolutionStrategy::parse_lenient(&request.strategy);
        let resolved = match (strategy, request.resolved_data) {
            (Some(ResolutionStrategy::Manual), Some(data)) => resolve_with_data(&conflict, data),
            (strategy, _) => match resolve_conflict(&conflict, strategy) {
                Ok(resolved) => resolved,
                Err(e @ ResolveError::RequiresUserInput { .. }) => {
                    return Ok(ResolveOutcome::NeedsInput {
                        reason: e.to_string(),
                    });
                }
            },
        };

        let operation = if resolved.resolved_data.is_null() {
            OperationKind::Delete
        } else {
            OperationKind::Update
        };
        self.apply_to_cache(
            operation,
            &conflict.entity_type,
            &conflict.entity_id,
            &resolved.resolved_data,
            resolved.resolved_at,
        )
        .await?;
        self.queue
            .queue_operation_at(
                user_id,
                operation,
                &conflict.entity_type,
                &conflict.entity_id,
                resolved.resolved_data.clone(),
                resolved.resolved_at,
            )
            .await?;
        self.store.mark_conflict_resolved(&conflict.id).await?;
        bump(&self.metrics.conflicts_resolved, 1);

        info!(
            user_id,
            conflict_id = %conflict.id,
            strategy = %resolved.strategy,
            "Resolved conflict"
        );
        Ok(ResolveOutcome::Resolved(resolved))
    }

    /// Queue and conflict summary for one user.
    pub async fn status(&self, user_id: &str) -> Result<SyncStatus> {
        let ops = self.store.get_operations_for_user(user_id).await?;
        let conflicts: Vec<_> = self
            .store
            .get_conflicts_for_user(user_id)
            .await?
            .into_iter()
            .filter(|c| !c.resolved)
            .collect();

        let mut status = SyncStatus {
            total_operations: ops.len(),
            unresolved_conflicts: conflicts.len(),
            conflicts,
            ..SyncStatus::default()
        };
        for op in &ops {
            if op.synced {
                status.synced_operations += 1;
            } else {
                status.pending_operations += 1;
                *status
                    .pending_by_entity_type
                    .entry(op.entity_type.clone())
                    .or_default() += 1;
            }
        }
        Ok(status)
    }

    async fn apply_to_cache(
        &self,
        operation: OperationKind,
        entity_type: &str,
        entity_id: &str,
        data: &Payload,
        timestamp: TimestampMillis,
    ) -> Result<()> {
        match operation {
            OperationKind::Delete => self.store.delete_entity(entity_type, entity_id).await?,
            OperationKind::Create | OperationKind::Update => {
                self.store
                    .put_entity(StoredEntity {
                        id: entity_id.to_string(),
                        entity_type: entity_type.to_string(),
                        data: data.clone(),
                        timestamp,
                        synced: false,
                    })
                    .await?
            }
        }
        Ok(())
    }

    async fn restore_cache(
        &self,
        entity_type: &str,
        entity_id: &str,
        previous: Option<StoredEntity>,
    ) -> Result<()> {
        match previous {
            Some(entity) => self.store.put_entity(entity).await?,
            None => self.store.delete_entity(entity_type, entity_id).await?,
        }
        Ok(())
    }

    async fn mark_entity_synced(&self, entity_type: &str, entity_id: &str) -> Result<()> {
        if let Some(mut entity) = self.store.get_entity(entity_type, entity_id).await? {
            entity.synced = true;
            self.store.put_entity(entity).await?;
        }
        Ok(())
    }
}

/// Decide whether a queued operation collides with the server's copy.
///
/// Candidates are: the server changed the entity after the operation, a
/// CREATE for an id the server already has, or an UPDATE for an entity the
/// server no longer has. A candidate only becomes a conflict when the
/// payloads actually differ.
fn classify(op: &QueuedOperation, server: Option<&ServerSnapshot>) -> Option<ConflictRecord> {
    let candidate = match server {
        Some(snapshot) => {
            snapshot.timestamp > op.timestamp || op.operation == OperationKind::Create
        }
        None => op.operation == OperationKind::Update,
    };
    if !candidate {
        return None;
    }

    let local_version = match op.operation {
        OperationKind::Delete => None,
        OperationKind::Create | OperationKind::Update => Some(op.data.clone()),
    };
    let server_timestamp = server.map(|s| s.timestamp).unwrap_or_default();

    let local = local_version.clone().unwrap_or(Payload::Null);
    let remote = server.map(|s| s.data.clone()).unwrap_or(Payload::Null);
    if !detect_conflict(&local, &remote, op.timestamp, server_timestamp) {
        return None;
    }

    Some(ConflictRecord {
        id: new_record_id(),
        user_id: op.user_id.clone(),
        entity_type: op.entity_type.clone(),
        entity_id: op.entity_id.clone(),
        local_version,
        server_version: server.map(|s| s.data.clone()),
        local_timestamp: op.timestamp,
        server_timestamp,
        detected_at: now_millis(),
        resolved: false,
    })
}
