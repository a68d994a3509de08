//! Transcript repository.
//!
//! Transcripts are intermediate job state, persisted so the social-copy
//! collaborator can read them without re-running ASR.

use std::path::Path;
use std::sync::Arc;

use clipforge_models::{JobId, Transcript};

use crate::doc::DocMap;
use crate::error::{StoreError, StoreResult};

/// Typed repository over the `transcripts` collection, keyed by job id.
#[derive(Clone)]
pub struct TranscriptRepo {
    docs: Arc<DocMap<Transcript>>,
}

impl TranscriptRepo {
    pub(crate) async fn open(dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            docs: Arc::new(DocMap::open(dir.join("transcripts")).await?),
        })
    }

    /// Store a transcript, replacing any previous attempt's output.
    pub async fn put(&self, transcript: &Transcript) -> StoreResult<()> {
        self.docs
            .put(transcript.job_id.as_str(), transcript.clone())
            .await
    }

    pub async fn get(&self, job_id: &JobId) -> StoreResult<Transcript> {
        self.docs
            .get(job_id.as_str())
            .await
            .ok_or_else(|| StoreError::not_found(job_id.as_str()))
    }

    pub async fn remove(&self, job_id: &JobId) -> StoreResult<()> {
        self.docs.remove(job_id.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_overwrites_previous_attempt() {
        let dir = TempDir::new().unwrap();
        let repo = TranscriptRepo::open(dir.path()).await.unwrap();
        let job_id = JobId::from("job-1");

        repo.put(&Transcript::empty(job_id.clone())).await.unwrap();
        assert!(repo.get(&job_id).await.unwrap().is_empty());

        let full = Transcript {
            job_id: job_id.clone(),
            segments: vec![clipforge_models::TranscriptSegment {
                start: 0.0,
                end: 1.0,
                text: "hi".into(),
                words: vec![],
            }],
        };
        repo.put(&full).await.unwrap();
        assert_eq!(repo.get(&job_id).await.unwrap().segments.len(), 1);
    }
}
