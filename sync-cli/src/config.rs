//! Local state for sync-cli.
//!
//! Everything lives in one SQLite database inside the data directory. The
//! CLI never talks to a server, so the engine it opens is disconnected.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_engine::{Disconnected, EngineSettings, SqliteStore, SyncEngine};
use sync_types::Payload;

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "offline-sync.db";

/// Path of the local database.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Open the engine over the local database, creating it if needed.
pub async fn open_engine(data_dir: &Path) -> Result<SyncEngine> {
    let path = database_path(data_dir);
    let store = SqliteStore::new(&path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    Ok(SyncEngine::new(
        Arc::new(store),
        Arc::new(Disconnected),
        EngineSettings::default(),
    ))
}

/// Parse a JSON payload given inline or read from a file.
pub async fn load_payload(inline: Option<&str>, file: Option<&Path>) -> Result<Payload> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => return Ok(Payload::Null),
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}
