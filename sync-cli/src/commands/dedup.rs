//! Collapse the queue to the latest operation per entity.

use anyhow::Result;
use sync_engine::SyncEngine;

/// Run the dedup command. Returns how many operations were dropped.
pub async fn run(engine: &SyncEngine, user_id: &str) -> Result<usize> {
    let removed = engine.queue().deduplicate_queue(user_id).await?;
    let remaining = engine.queue().get_unsynced_count(user_id).await?;

    println!("Removed {removed} superseded operation(s); {remaining} pending.");
    Ok(removed)
}
