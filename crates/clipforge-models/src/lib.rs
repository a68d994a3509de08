//! Shared data models for the ClipForge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job options and the job status state machine
//! - Pipeline phases and progress snapshots
//! - Progress events pushed to subscribers
//! - Artifacts (finished clips) and transcripts
//! - Resumable upload sessions and their chunk bitmaps
//! - Error taxonomy shared by every component
//! - Encoding presets and plan-derived priority classes

pub mod artifact;
pub mod encoding;
pub mod error_kind;
pub mod ids;
pub mod job;
pub mod options;
pub mod plan;
pub mod progress;
pub mod status;
pub mod transcript;
pub mod upload;

// Re-export common types
pub use artifact::Artifact;
pub use encoding::EncodingConfig;
pub use error_kind::{ErrorKind, JobError};
pub use ids::{ArtifactId, BlobId, JobId, PrincipalId, UploadId};
pub use job::{Job, JobResults, JobType};
pub use options::{AspectRatio, CaptionStyle, JobOptions, QualityPreset};
pub use plan::{PlanTier, PriorityClass};
pub use progress::{Phase, Progress, ProgressEvent};
pub use status::JobStatus;
pub use transcript::{Transcript, TranscriptSegment, WordTiming};
pub use upload::{ChunkBitmap, UploadSession};
