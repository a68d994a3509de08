//! API error types and their wire mapping.
//!
//! Non-2xx responses carry `{"error": {"kind", "message", "retryable"}}`;
//! internal details never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upload session expired")]
    Expired,

    #[error("Upload incomplete: {0}")]
    Incomplete(String),

    #[error("Payload too large: {0}")]
    Oversize(String),

    #[error("Unsupported media type: {0}")]
    RejectedType(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidParameters(_) | ApiError::Incomplete(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Expired => StatusCode::GONE,
            ApiError::Oversize(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RejectedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not-found",
            ApiError::InvalidParameters(_) => "invalid-parameters",
            ApiError::Conflict(_) => "conflict",
            ApiError::Expired => "expired",
            ApiError::Incomplete(_) => "incomplete",
            ApiError::Oversize(_) => "oversize",
            ApiError::RejectedType(_) => "rejected-type",
            ApiError::RateLimited => "rate-limited",
            ApiError::Unavailable(_) => "unavailable",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<clipforge_store::StoreError> for ApiError {
    fn from(e: clipforge_store::StoreError) -> Self {
        use clipforge_store::StoreError;
        match e {
            StoreError::NotFound(id) => ApiError::NotFound(id),
            StoreError::IllegalTransition { from, to } => {
                ApiError::Conflict(format!("illegal transition {from} -> {to}"))
            }
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<clipforge_blob::BlobError> for ApiError {
    fn from(e: clipforge_blob::BlobError) -> Self {
        use clipforge_blob::BlobError;
        match e {
            BlobError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<clipforge_queue::QueueError> for ApiError {
    fn from(e: clipforge_queue::QueueError) -> Self {
        use clipforge_queue::QueueError;
        match e {
            QueueError::JobNotFound(id) => ApiError::NotFound(id),
            QueueError::Store(inner) => inner.into(),
            QueueError::NotCancellable(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            // Internal details stay in the logs.
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.kind(),
                message,
                retryable: matches!(self, ApiError::Unavailable(_) | ApiError::RateLimited),
            },
        };

        (status, Json(body)).into_response()
    }
}
