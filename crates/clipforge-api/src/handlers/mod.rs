//! HTTP handlers.

pub mod artifacts;
pub mod events;
pub mod jobs;
pub mod upload;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub queued_interactive: usize,
    pub queued_batch: usize,
    pub queued_retries: usize,
    pub running: usize,
}

/// GET /ready — readiness with scheduler depth.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (interactive, batch, delayed) = state.scheduler.queue_depth().await;
    let running = state.scheduler.running_count().await;
    (
        StatusCode::OK,
        Json(ReadyResponse {
            status: "ready",
            queued_interactive: interactive,
            queued_batch: batch,
            queued_retries: delayed,
            running,
        }),
    )
}
