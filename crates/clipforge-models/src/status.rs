//! Job status state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Job lifecycle status.
///
/// Transitions form a DAG: `Pending -> Running -> {Completed, Failed,
/// Cancelled}`, with `Cancelled` also reachable directly from `Pending`
/// and `Running -> Pending` allowed for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Job is waiting in queue
    #[default]
    Pending,
    /// Job is being processed by a worker
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed terminally
    Failed,
    /// Job was cancelled by the owner
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// Check if this is a terminal state (no more transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Running -> Pending` is the retry edge; everything else follows the
    /// forward DAG. Self-transitions are not legal (callers use them for
    /// progress updates, which are not status transitions).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Running, Pending)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn legal_transitions() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));
        // Retry edge
        assert!(Running.can_transition_to(Pending));
    }

    #[test]
    fn illegal_transitions() {
        use JobStatus::*;
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn serde_shape_is_uppercase() {
        let s = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(s, "\"RUNNING\"");
    }
}
