//! sync-engine binary entry point.
//!
//! Usage:
//! ```bash
//! sync-engine --config sync-engine.toml
//! ```
//!
//! Serves the HTTP status and conflict resolution routes over the local
//! store. No remote server is attached, so mutations only queue.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use sync_engine::{http, Config, Disconnected, SyncEngine};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("sync-engine v{}", env!("CARGO_PKG_VERSION"));
    if !config_path.exists() {
        tracing::warn!("{} not found, using defaults", config_path.display());
    }

    let engine = SyncEngine::open(&config, Arc::new(Disconnected))
        .await
        .with_context(|| format!("opening {}", config.storage.database.display()))?;

    http::health::init_start_time();
    http::serve(Arc::new(engine), &config.http.bind_address, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    })
    .await
    .with_context(|| format!("serving on {}", config.http.bind_address))?;

    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sync-engine.toml"))
}
