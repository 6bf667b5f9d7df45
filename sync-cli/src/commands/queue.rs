//! Record a mutation in the offline queue.

use anyhow::Result;
use sync_engine::{MutationOutcome, SyncEngine};
use sync_types::{now_millis, OperationKind, Payload, TimestampMillis};

/// Run the queue command.
pub async fn run(
    engine: &SyncEngine,
    user_id: &str,
    operation: OperationKind,
    entity_type: &str,
    entity_id: &str,
    data: Payload,
    timestamp: Option<TimestampMillis>,
) -> Result<String> {
    if operation != OperationKind::Delete && !data.is_object() {
        anyhow::bail!("{operation} needs a JSON object payload (use --data or --file)");
    }

    let timestamp = timestamp.unwrap_or_else(now_millis);
    let outcome = engine
        .record_mutation(user_id, operation, entity_type, entity_id, data, timestamp, false)
        .await?;

    let MutationOutcome::Queued(op_id) = outcome else {
        anyhow::bail!("Mutation was applied without queueing");
    };

    println!("Queued {operation} {entity_type}/{entity_id}");
    println!("  Operation: {op_id}");
    println!("  Timestamp: {timestamp}");
    Ok(op_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::open_engine;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn queue_persists_operation() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();

        let id = run(&engine, "me", OperationKind::Create, "task", "t1", json!({"title": "A"}), Some(7))
            .await
            .unwrap();

        let reopened = open_engine(dir.path()).await.unwrap();
        let ops = reopened.queue().get_unsynced_operations("me").await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, id);
        assert_eq!(ops[0].timestamp, 7);
    }

    #[tokio::test]
    async fn update_without_payload_is_rejected() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();

        let result = run(&engine, "me", OperationKind::Update, "task", "t1", Payload::Null, None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_needs_no_payload() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();

        run(&engine, "me", OperationKind::Delete, "task", "t1", Payload::Null, None)
            .await
            .unwrap();
        assert_eq!(engine.queue().get_unsynced_count("me").await.unwrap(), 1);
    }
}
