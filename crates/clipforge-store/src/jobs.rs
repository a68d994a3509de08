//! Job repository: durable job rows with state-machine enforcement.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use clipforge_models::{Job, JobId, PrincipalId};

use crate::doc::DocMap;
use crate::error::{StoreError, StoreResult};
use crate::filter::JobFilter;

/// Typed repository over the `jobs` collection.
#[derive(Clone)]
pub struct JobRepo {
    docs: Arc<DocMap<Job>>,
}

impl JobRepo {
    pub(crate) async fn open(dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            docs: Arc::new(DocMap::open(dir.join("jobs")).await?),
        })
    }

    /// Persist a freshly created PENDING job.
    pub async fn create(&self, job: &Job) -> StoreResult<()> {
        self.docs.insert(job.id.as_str(), job.clone()).await?;
        debug!(job_id = %job.id, "Created job row");
        Ok(())
    }

    pub async fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.docs
            .get(id.as_str())
            .await
            .ok_or_else(|| StoreError::not_found(id.as_str()))
    }

    /// Fetch a job, verifying principal ownership.
    pub async fn get_owned(&self, id: &JobId, principal: &PrincipalId) -> StoreResult<Job> {
        let job = self.get(id).await?;
        if &job.principal_id != principal {
            // Ownership failures surface as not-found to avoid leaking ids
            return Err(StoreError::not_found(id.as_str()));
        }
        Ok(job)
    }

    /// Apply a mutation under the row lock.
    ///
    /// Status changes are checked against the state machine; an illegal
    /// transition aborts the whole mutation. `updated_at` is bumped on
    /// every successful application.
    pub async fn update<R, F>(&self, id: &JobId, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Job) -> StoreResult<R>,
    {
        self.docs
            .update(id.as_str(), |job| {
                let before = job.status;
                let out = f(job)?;
                let after = job.status;
                if before != after && !before.can_transition_to(after) {
                    return Err(StoreError::IllegalTransition {
                        from: before,
                        to: after,
                    });
                }
                job.updated_at = Utc::now();
                Ok(out)
            })
            .await
    }

    /// All jobs, unfiltered. Used by the recovery sweep at startup.
    pub async fn all(&self) -> Vec<Job> {
        self.docs.all().await
    }

    /// List a principal's jobs, filtered and paginated, newest first.
    pub async fn list(&self, principal: &PrincipalId, filter: &JobFilter) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .docs
            .all()
            .await
            .into_iter()
            .filter(|j| &j.principal_id == principal)
            .filter(|j| filter.matches(j))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect()
    }

    pub async fn remove(&self, id: &JobId) -> StoreResult<()> {
        self.docs.remove(id.as_str()).await
    }
}
