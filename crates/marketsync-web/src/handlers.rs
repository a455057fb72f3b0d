use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use marketsync_core::{JobKind, RunConfig, RunController, RunError, RunRequest, UtcDateTime};

use crate::responses::{ErrorResponse, SyncResponse};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
}

impl AppState {
    pub fn new(controller: RunController) -> Self {
        Self {
            controller: Arc::new(controller),
        }
    }
}

fn run_error_response(error: &RunError) -> Response {
    let status = StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::new(error.to_string(), error.code()))).into_response()
}

async fn run_job(state: AppState, job: JobKind, body: Bytes) -> Response {
    let request = RunRequest::from_json_lenient(&body);
    let config = RunConfig::from_request(&request);

    match state.controller.run(job, config).await {
        Ok(summary) => (StatusCode::OK, Json(SyncResponse::from(summary))).into_response(),
        Err(error) => run_error_response(&error),
    }
}

/// `POST /api/v1/sync/peers`
pub async fn sync_peers(State(state): State<AppState>, body: Bytes) -> Response {
    run_job(state, JobKind::Peers, body).await
}

/// `POST /api/v1/sync/watchlist`
pub async fn sync_watchlist(State(state): State<AppState>, body: Bytes) -> Response {
    run_job(state, JobKind::Watchlist, body).await
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, OPTIONS")],
        Json(ErrorResponse::method_not_allowed()),
    )
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": UtcDateTime::now().format_rfc3339()
    }))
}
