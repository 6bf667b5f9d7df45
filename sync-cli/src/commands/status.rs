//! Show queue and conflict status.

use anyhow::Result;
use std::path::Path;
use sync_engine::SyncEngine;

use crate::config::database_path;

/// Run the status command.
pub async fn run(engine: &SyncEngine, data_dir: &Path, user_id: &str, json: bool) -> Result<()> {
    let status = engine.status(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("=== sync-cli status ===");
    println!();
    println!("Store: {}", database_path(data_dir).display());
    println!("User:  {user_id}");
    println!();
    println!("Operations:");
    println!("  Total:   {}", status.total_operations);
    println!("  Synced:  {}", status.synced_operations);
    println!("  Pending: {}", status.pending_operations);
    for (entity_type, count) in &status.pending_by_entity_type {
        println!("    {entity_type}: {count}");
    }
    println!();
    println!("Conflicts:");
    println!("  Unresolved: {}", status.unresolved_conflicts);

    if status.unresolved_conflicts > 0 {
        println!();
        println!("Run 'sync-cli conflicts' to inspect them.");
    }
    Ok(())
}
