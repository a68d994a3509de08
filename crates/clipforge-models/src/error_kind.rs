//! Error taxonomy shared by every component.
//!
//! The kind alone decides retryability; the surface (HTTP status mapping)
//! is the API layer's concern.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidParameters,
    NotFound,
    Forbidden,
    Conflict,
    Expired,
    Incomplete,
    Oversize,
    RejectedType,
    Unreadable,
    UnsupportedCodec,
    TransientIo,
    TransientDependency,
    Timeout,
    WorkerLost,
    Cancelled,
    RateLimited,
    Internal,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidParameters => "invalid-parameters",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Expired => "expired",
            ErrorKind::Incomplete => "incomplete",
            ErrorKind::Oversize => "oversize",
            ErrorKind::RejectedType => "rejected-type",
            ErrorKind::Unreadable => "unreadable",
            ErrorKind::UnsupportedCodec => "unsupported-codec",
            ErrorKind::TransientIo => "transient-io",
            ErrorKind::TransientDependency => "transient-dependency",
            ErrorKind::Timeout => "timeout",
            ErrorKind::WorkerLost => "worker-lost",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::Internal => "internal",
            ErrorKind::Unavailable => "unavailable",
        }
    }

    /// Whether a job failing with this kind may be re-enqueued.
    ///
    /// `Cancelled` is terminal but not a failure; it never reaches the
    /// retry decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientIo
                | ErrorKind::TransientDependency
                | ErrorKind::Timeout
                | ErrorKind::WorkerLost
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error descriptor persisted on a FAILED job and returned on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    /// Classified kind
    pub kind: ErrorKind,
    /// Short human-readable message; internal details are not exposed
    pub message: String,
    /// Derived from the kind; duplicated for wire convenience
    pub retryable: bool,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
