//! HTTP endpoints for sync-engine.
//!
//! Provides health checks, metrics, and the per-user status and conflict
//! resolution routes the UI layer talks to.

pub mod health;
mod metrics;
mod users;

use crate::engine::SyncEngine;
use crate::error::Result;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::future::Future;
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(engine: Arc<SyncEngine>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/users/:user_id/status", get(users::status_handler))
        .route(
            "/users/:user_id/conflicts/resolve",
            post(users::resolve_handler),
        )
        .layer(Extension(engine))
}

/// Serve the router on `bind_address` until `shutdown` completes.
pub async fn serve<F>(engine: Arc<SyncEngine>, bind_address: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!("HTTP listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::error::EngineError;
    use crate::remote::MockRemote;
    use crate::storage::{LocalStore, SqliteStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use serde_json::{json, Value};
    use sync_types::{ConflictRecord, OperationKind};
    use tower::util::ServiceExt;

    async fn test_engine(remote: &MockRemote) -> Arc<SyncEngine> {
        let store = SqliteStore::in_memory().await.unwrap();
        Arc::new(SyncEngine::new(
            Arc::new(store),
            Arc::new(remote.clone()),
            EngineSettings::default(),
        ))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn resolve_request(user: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/users/{user}/conflicts/resolve"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn open_conflict(id: &str, user_id: &str) -> ConflictRecord {
        ConflictRecord {
            id: id.into(),
            user_id: user_id.into(),
            entity_type: "task".into(),
            entity_id: "t1".into(),
            local_version: Some(json!({"title": "Local"})),
            server_version: Some(json!({"title": "Server"})),
            local_timestamp: 100,
            server_timestamp: 200,
            detected_at: 300,
            resolved: false,
        }
    }

    #[tokio::test]
    async fn health_endpoint_reports_store_totals() {
        let engine = test_engine(&MockRemote::new()).await;
        engine
            .record_mutation("alice", OperationKind::Create, "task", "t1", json!({}), 1, false)
            .await
            .unwrap();
        engine.store().put_conflict(open_conflict("c-1", "bob")).await.unwrap();
        let app = build_router(engine);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["store"]["entities"], json!(1));
        assert_eq!(body["store"]["pending_operations"], json!(1));
        assert_eq!(body["store"]["unresolved_conflicts"], json!(1));
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_ok() {
        let app = build_router(test_engine(&MockRemote::new()).await);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_endpoint_reports_pending_operations() {
        let engine = test_engine(&MockRemote::new()).await;
        engine
            .record_mutation("alice", OperationKind::Create, "task", "t1", json!({}), 1, false)
            .await
            .unwrap();
        let app = build_router(engine);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/users/alice/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["pendingOperations"], json!(1));
        assert_eq!(body["pendingByEntityType"]["task"], json!(1));
        assert_eq!(body["unresolvedConflicts"], json!(0));
    }

    #[tokio::test]
    async fn resolve_endpoint_applies_strategy() {
        let remote = MockRemote::new();
        let engine = test_engine(&remote).await;
        remote.insert_entity("alice", "task", "t1", json!({"a": 1, "b": 1, "c": 1}), 200);
        engine
            .record_mutation("alice", OperationKind::Update, "task", "t1", json!({"a": 2, "b": 2, "c": 2}), 100, false)
            .await
            .unwrap();
        engine.sync("alice").await.unwrap();
        let conflict_id = engine.status("alice").await.unwrap().conflicts[0].id.clone();
        let app = build_router(engine);

        let response = app
            .oneshot(resolve_request(
                "alice",
                json!({"conflictId": conflict_id, "strategy": "SERVER_WINS"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["conflict"]["strategy"], json!("SERVER_WINS"));
        assert_eq!(body["conflict"]["resolvedData"], json!({"a": 1, "b": 1, "c": 1}));
    }

    #[tokio::test]
    async fn resolve_endpoint_reports_unknown_conflict() {
        let app = build_router(test_engine(&MockRemote::new()).await);

        let response = app
            .oneshot(resolve_request(
                "alice",
                json!({"conflictId": "missing", "strategy": "LOCAL_WINS"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["success"], json!(false));
    }

    #[tokio::test]
    async fn conflict_id_containing_not_found_keeps_its_status() {
        let engine = test_engine(&MockRemote::new()).await;
        engine
            .store()
            .put_conflict(open_conflict("not found", "alice"))
            .await
            .unwrap();
        let app = build_router(engine);

        let response = app
            .oneshot(resolve_request(
                "alice",
                json!({"conflictId": "not found", "strategy": "MANUAL"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["message"].as_str().unwrap().contains("requires user input"));
    }

    #[tokio::test]
    async fn resolving_twice_is_a_conflict() {
        let engine = test_engine(&MockRemote::new()).await;
        engine.store().put_conflict(open_conflict("c-1", "alice")).await.unwrap();
        let app = build_router(engine);
        let body = json!({"conflictId": "c-1", "strategy": "LOCAL_WINS"});

        let first = app
            .clone()
            .oneshot(resolve_request("alice", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(resolve_request("alice", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["success"], json!(false));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let engine = test_engine(&MockRemote::new()).await;
        serve(engine, "127.0.0.1:0", async {}).await.unwrap();
    }

    #[tokio::test]
    async fn serve_reports_bad_bind_address() {
        let engine = test_engine(&MockRemote::new()).await;
        let err = serve(engine, "not-an-address", async {}).await.unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
