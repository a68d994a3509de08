//! Worker error types and failure classification.

use thiserror::Error;

use clipforge_asr::AsrError;
use clipforge_media::MediaError;
use clipforge_models::{ErrorKind, JobError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// User cancellation observed at a checkpoint
    #[error("Job cancelled")]
    Cancelled,

    /// Global job deadline observed at a checkpoint
    #[error("Job deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid job options: {0}")]
    InvalidOptions(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("ASR error: {0}")]
    Asr(#[from] AsrError),

    #[error("Storage error: {0}")]
    Blob(#[from] clipforge_blob::BlobError),

    #[error("Store error: {0}")]
    Store(#[from] clipforge_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] clipforge_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Classify into the shared error taxonomy. The kind alone decides
    /// whether the scheduler retries.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            WorkerError::Cancelled => ErrorKind::Cancelled,
            WorkerError::DeadlineExceeded => ErrorKind::Timeout,
            WorkerError::InvalidOptions(_) => ErrorKind::InvalidParameters,
            WorkerError::ProcessingFailed(_) => ErrorKind::Internal,
            WorkerError::Media(e) => match e {
                MediaError::InvalidVideo(_) | MediaError::FileNotFound(_) => ErrorKind::Unreadable,
                MediaError::UnsupportedCodec(_) => ErrorKind::UnsupportedCodec,
                MediaError::Timeout(_) => ErrorKind::Timeout,
                MediaError::Io(_) => ErrorKind::TransientIo,
                _ => ErrorKind::Internal,
            },
            WorkerError::Asr(e) => {
                if e.is_retryable() {
                    ErrorKind::TransientDependency
                } else {
                    ErrorKind::Internal
                }
            }
            WorkerError::Blob(clipforge_blob::BlobError::Io(_)) => ErrorKind::TransientIo,
            WorkerError::Blob(_) => ErrorKind::Internal,
            WorkerError::Store(clipforge_store::StoreError::Io(_)) => ErrorKind::TransientIo,
            WorkerError::Store(_) => ErrorKind::Internal,
            WorkerError::Queue(_) => ErrorKind::Internal,
            WorkerError::Io(_) => ErrorKind::TransientIo,
        }
    }

    /// Build the wire/persisted error descriptor.
    pub fn to_job_error(&self) -> JobError {
        JobError::new(self.error_kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_taxonomy() {
        let unreadable = WorkerError::Media(MediaError::InvalidVideo("no stream".into()));
        assert_eq!(unreadable.error_kind(), ErrorKind::Unreadable);
        assert!(!unreadable.to_job_error().retryable);

        let timeout = WorkerError::Media(MediaError::Timeout(30));
        assert_eq!(timeout.error_kind(), ErrorKind::Timeout);
        assert!(timeout.to_job_error().retryable);

        let deadline = WorkerError::DeadlineExceeded;
        assert!(deadline.to_job_error().retryable);

        let io = WorkerError::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.error_kind(), ErrorKind::TransientIo);
    }
}
