//! Job list filtering and pagination.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use clipforge_models::{Job, JobStatus, JobType};

fn default_limit() -> usize {
    50
}

/// Filters for the job listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JobFilter {
    /// Restrict to a single status
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Restrict to a job type
    #[serde(default)]
    pub job_type: Option<JobType>,
    /// Jobs created at or after this instant
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    /// Jobs created before this instant
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
    /// Page size, capped at 200
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Page offset
    #[serde(default)]
    pub offset: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            status: None,
            job_type: None,
            created_after: None,
            created_before: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(job_type) = self.job_type {
            if job.job_type != job_type {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if job.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if job.created_at >= before {
                return false;
            }
        }
        true
    }

    /// Clamp user-supplied page sizes.
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, 200);
        self
    }
}
