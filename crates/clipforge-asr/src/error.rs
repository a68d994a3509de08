//! ASR client error types.

use thiserror::Error;

pub type AsrResult<T> = Result<T, AsrError>;

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("ASR service returned {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Audio file unreadable: {0}")]
    AudioUnreadable(String),
}

impl AsrError {
    pub fn request_failed(status: u16, body: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            body: body.into(),
        }
    }

    /// Whether the call may succeed on retry (network faults and 5xx).
    pub fn is_retryable(&self) -> bool {
        match self {
            AsrError::Network(_) => true,
            AsrError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
