//! Resolve a stored conflict.

use anyhow::Result;
use sync_engine::{ResolveOutcome, SyncEngine};
use sync_types::{ConflictResolutionRequest, ConflictResolutionResponse, Payload, ResolvedConflict};

/// Run the resolve command.
///
/// `strategy` is passed through as given; an unknown or missing name lets
/// the engine pick one automatically.
pub async fn run(
    engine: &SyncEngine,
    user_id: &str,
    conflict_id: &str,
    strategy: Option<&str>,
    data: Option<Payload>,
) -> Result<ResolvedConflict> {
    let request = ConflictResolutionRequest {
        conflict_id: conflict_id.to_string(),
        strategy: strategy.unwrap_or_default().to_string(),
        resolved_data: data,
    };

    let resolved = match engine.resolve(user_id, request).await? {
        ResolveOutcome::Resolved(resolved) => resolved,
        outcome => anyhow::bail!("{}", ConflictResolutionResponse::from(outcome).message),
    };

    println!("Resolved {conflict_id} with {}", resolved.strategy);
    println!("{}", serde_json::to_string_pretty(&resolved.resolved_data)?);
    println!();
    println!("The resolved version is queued for the next sync.");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::conflicts::tests::stored_conflict;
    use crate::config::open_engine;
    use serde_json::json;
    use sync_engine::LocalStore;
    use sync_types::ResolutionStrategy;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resolve_with_named_strategy() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();
        engine.store().put_conflict(stored_conflict("c1", "me")).await.unwrap();

        let resolved = run(&engine, "me", "c1", Some("server-wins"), None).await.unwrap();
        assert_eq!(resolved.strategy, ResolutionStrategy::ServerWins);
        assert_eq!(resolved.resolved_data, json!({"title": "Server", "done": false}));
        assert_eq!(engine.queue().get_unsynced_count("me").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn manual_needs_data() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();
        engine.store().put_conflict(stored_conflict("c1", "me")).await.unwrap();

        assert!(run(&engine, "me", "c1", Some("MANUAL"), None).await.is_err());

        let picked = json!({"title": "Mine", "done": true});
        let resolved = run(&engine, "me", "c1", Some("MANUAL"), Some(picked.clone()))
            .await
            .unwrap();
        assert_eq!(resolved.resolved_data, picked);
    }

    #[tokio::test]
    async fn unknown_conflict_is_an_error() {
        let dir = tempdir().unwrap();
        let engine = open_engine(dir.path()).await.unwrap();

        let err = run(&engine, "me", "nope", None, None).await.unwrap_err();
        assert_eq!(err.to_string(), "conflict nope not found");
    }
}
