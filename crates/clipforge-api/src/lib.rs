//! Axum HTTP surface for the ClipForge pipeline.
//!
//! This crate provides:
//! - Resumable chunked upload endpoints
//! - Job submit/status/list/cancel and the SSE progress stream
//! - The artifact registry surface with signed delivery URLs
//! - Per-principal rate limiting and Prometheus metrics
//!
//! Authentication is an upstream concern: requests arrive with a
//! verified principal header attached by the gateway.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod principal;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use principal::{Principal, PLAN_HEADER, PRINCIPAL_HEADER};
pub use routes::create_router;
pub use state::AppState;
