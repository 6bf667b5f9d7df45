//! List unresolved conflicts.

use anyhow::Result;
use sync_core::{calculate_conflict_severity, get_conflicting_fields, get_recommended_strategy};
use sync_engine::SyncEngine;
use sync_types::Payload;

/// Run the conflicts command. Returns the number listed.
pub async fn run(engine: &SyncEngine, user_id: &str, json: bool) -> Result<usize> {
    let conflicts = engine.status(user_id).await?.conflicts;

    if json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(conflicts.len());
    }

    if conflicts.is_empty() {
        println!("No unresolved conflicts for {user_id}.");
        return Ok(0);
    }

    for conflict in &conflicts {
        let local = conflict.local_version.clone().unwrap_or(Payload::Null);
        let server = conflict.server_version.clone().unwrap_or(Payload::Null);
        let fields: Vec<_> = get_conflicting_fields(&local, &server).into_iter().collect();

        println!("{}", conflict.id);
        println!("  Entity:      {}/{}", conflict.entity_type, conflict.entity_id);
        println!(
            "  Timestamps:  local {} / server {}",
            conflict.local_timestamp, conflict.server_timestamp
        );
        println!("  Fields:      {}", fields.join(", "));
        println!(
            "  Severity:    {:.2}",
            calculate_conflict_severity(&local, &server)
        );
        println!("  Recommended: {}", get_recommended_strategy(conflict));
        println!();
    }
    println!("Resolve with: sync-cli resolve <id> --strategy <STRATEGY>");
    Ok(conflicts.len())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::open_engine;
    use serde_json::json;
    use sync_engine::LocalStore;
    use sync_types::ConflictRecord;
    use tempfile::tempdir;

    pub(crate) fn stored_conflict(id: &str, user_id: &str) -> ConflictRecord {
        ConflictRecord {
            id: id.into(),
            user_id: user_id.into(),
            entity_type: "task".into(),
            entity_id: "t1".into(),
            local_version: Some(json!({"title": "Local", "done": true})),
            server_version: Some(json!({"title": "Server", "done": false})),
            local_timestamp: 100,
            server_timestamp: 200,
            detected_at: 300,
            resolved: false,
        }
    }

    #[tokio::test]
    async fn lists_only_unresolved() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();
        engine.store().put_conflict(stored_conflict("c1", "me")).await.unwrap();
        let mut done = stored_conflict("c2", "me");
        done.resolved = true;
        engine.store().put_conflict(done).await.unwrap();

        assert_eq!(run(&engine, "me", false).await.unwrap(), 1);
        assert_eq!(run(&engine, "someone-else", true).await.unwrap(), 0);
    }
}
