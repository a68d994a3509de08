//! Artifact (clip) metadata.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{ArtifactId, BlobId, JobId};
use crate::options::AspectRatio;

/// A finished clip belonging to a job.
///
/// Ordinals are dense within a job: a job with N artifacts carries
/// ordinals 1..=N exactly once each.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// Unique artifact ID
    pub id: ArtifactId,
    /// Owning job
    pub job_id: JobId,
    /// Position within the job, 1-based
    pub ordinal: u32,
    /// Blob holding the final encoded file
    pub blob_id: BlobId,
    /// Clip duration in seconds
    pub duration: f64,
    /// Start of the source window within the input, seconds
    pub source_start: f64,
    /// End of the source window within the input, seconds
    pub source_end: f64,
    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,
    /// Whether captions were burned in
    pub captions_added: bool,
    /// Heuristic score in [0, 10]
    pub viral_score: f64,
    /// Caption track blob, when captions were rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_track_id: Option<BlobId>,
    /// File name suggested for downloads (platform tags included)
    pub file_name: String,
    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Validate that `artifacts` carries dense ordinals 1..=N.
    pub fn ordinals_are_dense(artifacts: &[Artifact]) -> bool {
        let mut seen: Vec<u32> = artifacts.iter().map(|a| a.ordinal).collect();
        seen.sort_unstable();
        seen.iter()
            .enumerate()
            .all(|(i, &o)| o == (i as u32) + 1)
    }
}
