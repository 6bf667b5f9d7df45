//! List operations waiting for replay.

use anyhow::Result;
use sync_engine::SyncEngine;

/// Run the pending command.
///
/// With an entity given, only reports whether that entity has pending work.
pub async fn run(
    engine: &SyncEngine,
    user_id: &str,
    entity: Option<(&str, &str)>,
    json: bool,
) -> Result<()> {
    let queue = engine.queue();

    if let Some((entity_type, entity_id)) = entity {
        let pending = queue
            .has_pending_operations(user_id, entity_type, entity_id)
            .await?;
        if json {
            println!("{}", serde_json::json!({ "pending": pending }));
        } else {
            let state = if pending { "pending" } else { "clean" };
            println!("{entity_type}/{entity_id}: {state}");
        }
        return Ok(());
    }

    let ops = queue.get_unsynced_operations(user_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ops)?);
        return Ok(());
    }

    if ops.is_empty() {
        println!("No pending operations for {user_id}.");
        return Ok(());
    }

    println!("{} pending operation(s) for {user_id}, in replay order:", ops.len());
    for op in &ops {
        println!(
            "  {:>15}  {:<6}  {}/{}  ({})",
            op.timestamp, op.operation, op.entity_type, op.entity_id, op.id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::open_engine;
    use serde_json::json;
    use sync_types::OperationKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pending_on_empty_queue() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();

        assert!(run(&engine, "me", None, false).await.is_ok());
        assert!(run(&engine, "me", Some(("task", "t1")), true).await.is_ok());
    }

    #[tokio::test]
    async fn pending_lists_queued_operations() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();
        engine
            .record_mutation("me", OperationKind::Create, "task", "t1", json!({}), 1, false)
            .await
            .unwrap();

        assert!(run(&engine, "me", None, false).await.is_ok());
        assert!(run(&engine, "me", None, true).await.is_ok());
    }
}
