//! Job row: the durable unit of pipeline work.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error_kind::JobError;
use crate::ids::{BlobId, JobId, PrincipalId};
use crate::options::JobOptions;
use crate::plan::PriorityClass;
use crate::progress::{Phase, Progress};
use crate::status::JobStatus;

fn default_max_attempts() -> u32 {
    3
}

/// Type of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobType {
    /// Decompose an uploaded video into platform-optimized clips
    #[default]
    Videoclip,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Videoclip => "VIDEOCLIP",
        }
    }
}

/// Structured results, present exactly when the job COMPLETED.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobResults {
    /// Number of artifacts registered for this job
    pub total_clips: u32,
    /// Whether captions were burned into the clips
    pub captions_added: bool,
    /// Total output duration in seconds
    pub total_duration: f64,
}

/// A unit of pipeline work with a durable lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Owning principal
    pub principal_id: PrincipalId,

    /// Job type
    #[serde(default)]
    pub job_type: JobType,

    /// Input blob (validated upload)
    pub input_blob_id: BlobId,

    /// Submission options
    #[serde(default)]
    pub options: JobOptions,

    /// Priority class derived from the principal's plan at submission
    #[serde(default)]
    pub priority: PriorityClass,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress snapshot
    #[serde(default)]
    pub progress: Progress,

    /// Error descriptor, present exactly when status is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// Results, present exactly when status is COMPLETED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,

    /// Number of processing attempts started
    #[serde(default)]
    pub attempts: u32,

    /// Maximum attempts before a retryable failure becomes terminal
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lease token of the worker currently processing this job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_lease: Option<String>,

    /// When the current lease expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,

    /// When the first attempt started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new PENDING job.
    pub fn new(
        principal_id: PrincipalId,
        input_blob_id: BlobId,
        options: JobOptions,
        priority: PriorityClass,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            principal_id,
            job_type: JobType::Videoclip,
            input_blob_id,
            options,
            priority,
            status: JobStatus::Pending,
            progress: Progress::queued(),
            error: None,
            results: None,
            attempts: 0,
            max_attempts,
            worker_lease: None,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Begin an attempt: RUNNING, lease installed, progress reset to 0.
    ///
    /// The progress reset is the one place percent may go backwards, and
    /// only at attempt start.
    pub fn begin_attempt(&mut self, lease: String, lease_expires_at: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.attempts += 1;
        self.worker_lease = Some(lease);
        self.lease_expires_at = Some(lease_expires_at);
        self.progress = Progress::new(Phase::Probe, 0, "Starting");
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Update the progress snapshot. Percent never decreases within an
    /// attempt; regressions are clamped to the current value.
    pub fn set_progress(&mut self, progress: Progress) {
        let percent = progress.percent.max(self.progress.percent);
        self.progress = Progress { percent, ..progress };
        self.touch();
    }

    /// Mark COMPLETED with results.
    pub fn complete(&mut self, results: JobResults) {
        self.status = JobStatus::Completed;
        self.results = Some(results);
        self.error = None;
        self.progress = Progress::new(Phase::Finalize, 100, "Complete");
        self.finished_at = Some(Utc::now());
        self.release_lease();
        self.touch();
    }

    /// Mark terminally FAILED with an error descriptor.
    pub fn fail(&mut self, error: JobError) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.results = None;
        self.finished_at = Some(Utc::now());
        self.release_lease();
        self.touch();
    }

    /// Mark CANCELLED.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        self.release_lease();
        self.touch();
    }

    /// Return to PENDING for a retry attempt.
    pub fn requeue(&mut self) {
        self.status = JobStatus::Pending;
        self.progress = Progress::queued();
        self.release_lease();
        self.touch();
    }

    fn release_lease(&mut self) {
        self.worker_lease = None;
        self.lease_expires_at = None;
    }

    /// Whether another attempt is allowed after a retryable failure.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Whether the lease has expired (no live worker).
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        match self.lease_expires_at {
            Some(exp) => exp < now,
            None => true,
        }
    }
}
