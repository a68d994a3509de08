//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::handlers::artifacts::{fetch_artifact_file, get_artifact, list_job_artifacts};
use crate::handlers::events::job_events;
use crate::handlers::jobs::{cancel_job, get_job, get_transcript, list_jobs, submit_job};
use crate::handlers::upload::{
    abort_upload, complete_upload, init_upload, upload_chunk, upload_status,
};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Chunk bodies carry the chunk plus multipart overhead.
    let chunk_body_limit = (state.config.upload_chunk_bytes as usize) + 64 * 1024;

    let upload_routes = Router::new()
        .route("/upload/init", post(init_upload))
        .route(
            "/upload/chunk/:id",
            post(upload_chunk).layer(DefaultBodyLimit::max(chunk_body_limit)),
        )
        .route("/upload/complete/:id", post(complete_upload))
        .route("/upload/abort/:id", post(abort_upload))
        .route("/upload/:id", get(upload_status));

    let job_routes = Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/events", get(job_events))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/transcript", get(get_transcript))
        .route("/jobs/:id/artifacts", get(list_job_artifacts));

    let artifact_routes = Router::new()
        .route("/artifacts/:id", get(get_artifact))
        .route("/artifacts/:id/file", get(fetch_artifact_file));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(job_routes)
        .merge(artifact_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
