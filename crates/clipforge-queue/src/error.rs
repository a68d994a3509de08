//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job is not cancellable: {0}")]
    NotCancellable(String),

    #[error("Enqueue failed: {0}")]
    EnqueueFailed(String),

    #[error("Scheduler is shut down")]
    ShutDown,

    #[error("Store error: {0}")]
    Store(#[from] clipforge_store::StoreError),

    #[error("Blob error: {0}")]
    Blob(#[from] clipforge_blob::BlobError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }

    pub fn enqueue_failed(msg: impl Into<String>) -> Self {
        Self::EnqueueFailed(msg.into())
    }
}
