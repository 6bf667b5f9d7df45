//! Per-user status and conflict resolution routes.

use crate::engine::{ResolveOutcome, SyncEngine};
use crate::error::EngineError;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use sync_types::{ConflictResolutionRequest, ConflictResolutionResponse, SyncStatus};

/// Engine failure surfaced as a 500 with a JSON body.
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        let body = ConflictResolutionResponse::failed(self.0.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// `GET /users/:user_id/status`
pub async fn status_handler(
    Extension(engine): Extension<Arc<SyncEngine>>,
    Path(user_id): Path<String>,
) -> Result<Json<SyncStatus>, ApiError> {
    Ok(Json(engine.status(&user_id).await?))
}

/// `POST /users/:user_id/conflicts/resolve`
///
/// Unknown conflicts answer 404, already resolved ones 409, and a MANUAL
/// request without data 422.
pub async fn resolve_handler(
    Extension(engine): Extension<Arc<SyncEngine>>,
    Path(user_id): Path<String>,
    Json(request): Json<ConflictResolutionRequest>,
) -> Result<(StatusCode, Json<ConflictResolutionResponse>), ApiError> {
    let outcome = engine.resolve(&user_id, request).await?;
    Ok((resolve_status(&outcome), Json(outcome.into())))
}

fn resolve_status(outcome: &ResolveOutcome) -> StatusCode {
    match outcome {
        ResolveOutcome::Resolved(_) => StatusCode::OK,
        ResolveOutcome::NotFound { .. } => StatusCode::NOT_FOUND,
        ResolveOutcome::AlreadyResolved { .. } => StatusCode::CONFLICT,
        ResolveOutcome::NeedsInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}
