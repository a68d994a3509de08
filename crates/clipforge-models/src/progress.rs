//! Pipeline phases, progress snapshots and progress events.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::status::JobStatus;

/// Pipeline stage names, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Queued,
    Probe,
    Extract,
    Transcribe,
    Score,
    Cut,
    Reframe,
    Caption,
    Finalize,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Probe => "probe",
            Phase::Extract => "extract",
            Phase::Transcribe => "transcribe",
            Phase::Score => "score",
            Phase::Cut => "cut",
            Phase::Reframe => "reframe",
            Phase::Caption => "caption",
            Phase::Finalize => "finalize",
        }
    }

    /// Overall percent sub-range owned by this phase.
    ///
    /// The mapping is fixed so that clients can render a single bar
    /// regardless of which stage is running.
    pub fn percent_range(&self) -> (u8, u8) {
        match self {
            Phase::Queued => (0, 0),
            Phase::Probe => (0, 5),
            Phase::Extract => (5, 10),
            Phase::Transcribe => (10, 40),
            Phase::Score => (40, 45),
            Phase::Cut => (45, 60),
            Phase::Reframe => (60, 75),
            Phase::Caption => (75, 90),
            Phase::Finalize => (90, 100),
        }
    }

    /// Map a within-stage fraction (0.0..=1.0) onto the overall percent.
    pub fn overall_percent(&self, fraction: f64) -> u8 {
        let (lo, hi) = self.percent_range();
        let f = fraction.clamp(0.0, 1.0);
        (lo as f64 + f * (hi - lo) as f64).round() as u8
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress snapshot carried on the job row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Progress {
    /// Currently executing stage
    pub phase: Phase,
    /// Overall percent, 0..=100, non-decreasing within an attempt
    pub percent: u8,
    /// Human-readable description of what is happening
    pub description: String,
}

impl Progress {
    pub fn queued() -> Self {
        Self {
            phase: Phase::Queued,
            percent: 0,
            description: "Waiting for a worker".to_string(),
        }
    }

    pub fn new(phase: Phase, percent: u8, description: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            description: description.into(),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::queued()
    }
}

/// Event pushed to live subscribers on every job mutation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Monotonically increasing per-job sequence number, starting at 1
    pub seq: u64,
    /// Job this event belongs to
    pub job_id: JobId,
    /// Status at the time of the mutation
    pub status: JobStatus,
    /// Stage name
    pub phase: Phase,
    /// Overall percent
    pub percent: u8,
    /// Human-readable description
    pub description: String,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Build an event from a job snapshot; `seq` is assigned by the bus.
    pub fn snapshot(job_id: JobId, status: JobStatus, progress: &Progress) -> Self {
        Self {
            seq: 0,
            job_id,
            status,
            phase: progress.phase,
            percent: progress.percent,
            description: progress.description.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ranges_cover_zero_to_hundred() {
        let phases = [
            Phase::Probe,
            Phase::Extract,
            Phase::Transcribe,
            Phase::Score,
            Phase::Cut,
            Phase::Reframe,
            Phase::Caption,
            Phase::Finalize,
        ];
        let mut expected_lo = 0;
        for p in phases {
            let (lo, hi) = p.percent_range();
            assert_eq!(lo, expected_lo, "gap before {}", p);
            assert!(hi > lo);
            expected_lo = hi;
        }
        assert_eq!(expected_lo, 100);
    }

    #[test]
    fn overall_percent_maps_fraction_into_range() {
        assert_eq!(Phase::Transcribe.overall_percent(0.0), 10);
        assert_eq!(Phase::Transcribe.overall_percent(0.5), 25);
        assert_eq!(Phase::Transcribe.overall_percent(1.0), 40);
        // Clamped
        assert_eq!(Phase::Finalize.overall_percent(2.0), 100);
    }
}
