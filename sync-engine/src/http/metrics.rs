//! Prometheus metrics endpoint.

use crate::engine::{EngineMetrics, SyncEngine};
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns the engine counters in Prometheus text format.
pub async fn metrics_handler(Extension(engine): Extension<Arc<SyncEngine>>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(engine.metrics()),
    )
}

fn render(m: &EngineMetrics) -> String {
    let counters = [
        ("mutations_total", "Mutations recorded", &m.mutations_total),
        ("operations_queued_total", "Operations queued for later replay", &m.operations_queued),
        ("operations_pushed_total", "Operations accepted by the server", &m.operations_pushed),
        ("operations_failed_total", "Operations refused by the server", &m.operations_failed),
        ("sync_attempts_total", "Sync attempts started", &m.sync_attempts),
        ("sync_failures_total", "Sync attempts aborted by network errors", &m.sync_failures),
        ("conflicts_detected_total", "Conflicts detected during sync", &m.conflicts_detected),
        ("conflicts_auto_resolved_total", "Conflicts resolved automatically", &m.conflicts_auto_resolved),
        ("conflicts_resolved_total", "Conflicts resolved on request", &m.conflicts_resolved),
    ];

    let mut body = format!(
        "# HELP sync_engine_info Engine information\n\
         # TYPE sync_engine_info gauge\n\
         sync_engine_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );
    for (name, help, counter) in counters {
        body.push_str(&format!(
            "\n# HELP sync_engine_{name} {help}\n# TYPE sync_engine_{name} counter\nsync_engine_{name} {}\n",
            counter.load(Ordering::Relaxed)
        ));
    }
    body
}
