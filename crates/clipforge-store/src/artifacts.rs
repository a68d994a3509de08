//! Artifact registry.
//!
//! Artifacts are registered in one atomic batch per job (the finalize
//! stage's only observable external effect). Lookup by artifact id goes
//! through an in-memory index rebuilt from the per-job documents at open.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use clipforge_models::{Artifact, ArtifactId, JobId};

use crate::doc::DocMap;
use crate::error::{StoreError, StoreResult};

/// Typed repository over the `artifacts` collection, keyed by job id.
#[derive(Clone)]
pub struct ArtifactRepo {
    docs: Arc<DocMap<Vec<Artifact>>>,
    by_artifact: Arc<RwLock<HashMap<String, JobId>>>,
}

impl ArtifactRepo {
    pub(crate) async fn open(dir: &Path) -> StoreResult<Self> {
        let docs: DocMap<Vec<Artifact>> = DocMap::open(dir.join("artifacts")).await?;

        let mut by_artifact = HashMap::new();
        for batch in docs.all().await {
            for artifact in &batch {
                by_artifact.insert(artifact.id.as_str().to_string(), artifact.job_id.clone());
            }
        }

        Ok(Self {
            docs: Arc::new(docs),
            by_artifact: Arc::new(RwLock::new(by_artifact)),
        })
    }

    /// Register a job's artifacts in a single atomic write.
    ///
    /// Rejects batches whose ordinals are not dense 1..=N. Re-registering
    /// the same job replaces the batch (idempotent finalize re-execution).
    pub async fn put_batch(&self, job_id: &JobId, artifacts: Vec<Artifact>) -> StoreResult<()> {
        if !Artifact::ordinals_are_dense(&artifacts) {
            return Err(StoreError::conflict(format!(
                "artifact ordinals for job {job_id} are not dense"
            )));
        }
        if artifacts.iter().any(|a| &a.job_id != job_id) {
            return Err(StoreError::conflict("artifact batch crosses jobs"));
        }

        self.docs.put(job_id.as_str(), artifacts.clone()).await?;

        let mut index = self.by_artifact.write().await;
        index.retain(|_, j| j != job_id);
        for artifact in &artifacts {
            index.insert(artifact.id.as_str().to_string(), job_id.clone());
        }
        debug!(job_id = %job_id, count = artifacts.len(), "Registered artifact batch");
        Ok(())
    }

    /// Artifacts for a job, in ordinal order. Empty for unknown jobs.
    pub async fn list_by_job(&self, job_id: &JobId) -> Vec<Artifact> {
        let mut artifacts = self.docs.get(job_id.as_str()).await.unwrap_or_default();
        artifacts.sort_by_key(|a| a.ordinal);
        artifacts
    }

    /// Look up a single artifact by id.
    pub async fn get(&self, artifact_id: &ArtifactId) -> StoreResult<Artifact> {
        let job_id = self
            .by_artifact
            .read()
            .await
            .get(artifact_id.as_str())
            .cloned()
            .ok_or_else(|| StoreError::not_found(artifact_id.as_str()))?;

        self.list_by_job(&job_id)
            .await
            .into_iter()
            .find(|a| &a.id == artifact_id)
            .ok_or_else(|| StoreError::not_found(artifact_id.as_str()))
    }

    /// Delete a job's artifacts (job deletion cascades here).
    pub async fn remove_job(&self, job_id: &JobId) -> StoreResult<Vec<Artifact>> {
        let artifacts = self.list_by_job(job_id).await;
        if !artifacts.is_empty() {
            self.docs.remove(job_id.as_str()).await?;
        }
        let mut index = self.by_artifact.write().await;
        index.retain(|_, j| j != job_id);
        Ok(artifacts)
    }
}
