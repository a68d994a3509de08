//! Job scheduling and progress fan-out.
//!
//! This crate provides:
//! - The job scheduler: two-class priority FIFO, per-principal caps,
//!   retry with exponential backoff and jitter, leases, deadlines and
//!   crash recovery
//! - The per-job event bus: bounded ring, seq-numbered events,
//!   snapshot-then-tail subscription
//! - Cooperative cancellation flags shared with the worker pool

pub mod backoff;
pub mod cancel;
pub mod error;
pub mod events;
pub mod scheduler;

pub use backoff::RetryPolicy;
pub use cancel::{CancelFlag, CancelReason};
pub use error::{QueueError, QueueResult};
pub use events::{EventBus, DEFAULT_RING_SIZE, RING_RETENTION_SECS, SUBSCRIBER_BUFFER};
pub use scheduler::{JobAssignment, JobOutcome, Scheduler, SchedulerConfig};
