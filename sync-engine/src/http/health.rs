//! Health check endpoint.
//!
//! Answers 200 while the local store can be read and 503 once it cannot.
//! The body carries queue and conflict totals across every user.

use crate::engine::{EngineMetrics, SyncEngine};
use crate::storage::StoreTotals;
use axum::{http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok`, or `degraded` when the local store did not answer.
    pub status: String,
    /// Engine version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Store totals. Absent when the store did not answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreTotals>,
    /// Sync attempts since startup.
    pub sync_attempts: u64,
    /// Sync attempts aborted by a network error.
    pub sync_failures: u64,
}

impl HealthStatus {
    fn new(store: Option<StoreTotals>, metrics: &EngineMetrics) -> Self {
        let status = if store.is_some() { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: START_TIME
                .get()
                .map(|start| start.elapsed().as_secs())
                .unwrap_or(0),
            store,
            sync_attempts: metrics.sync_attempts.load(Ordering::Relaxed),
            sync_failures: metrics.sync_failures.load(Ordering::Relaxed),
        }
    }

    fn http_status(&self) -> StatusCode {
        if self.store.is_some() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Health check handler.
pub async fn health_handler(
    Extension(engine): Extension<Arc<SyncEngine>>,
) -> (StatusCode, Json<HealthStatus>) {
    let totals = match engine.store().totals().await {
        Ok(totals) => Some(totals),
        Err(e) => {
            tracing::warn!(error = %e, "Local store did not answer health check");
            None
        }
    };

    let health = HealthStatus::new(totals, engine.metrics());
    (health.http_status(), Json(health))
}
