//! Upload session repository.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use clipforge_models::{PrincipalId, UploadId, UploadSession};

use crate::doc::DocMap;
use crate::error::{StoreError, StoreResult};

/// Typed repository over the `uploads` collection.
#[derive(Clone)]
pub struct UploadRepo {
    docs: Arc<DocMap<UploadSession>>,
}

impl UploadRepo {
    pub(crate) async fn open(dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            docs: Arc::new(DocMap::open(dir.join("uploads")).await?),
        })
    }

    pub async fn create(&self, session: &UploadSession) -> StoreResult<()> {
        self.docs.insert(session.id.as_str(), session.clone()).await
    }

    pub async fn get(&self, id: &UploadId) -> StoreResult<UploadSession> {
        self.docs
            .get(id.as_str())
            .await
            .ok_or_else(|| StoreError::not_found(id.as_str()))
    }

    /// Fetch a session, verifying principal ownership.
    pub async fn get_owned(
        &self,
        id: &UploadId,
        principal: &PrincipalId,
    ) -> StoreResult<UploadSession> {
        let session = self.get(id).await?;
        if &session.principal_id != principal {
            return Err(StoreError::not_found(id.as_str()));
        }
        Ok(session)
    }

    /// Apply a mutation under the row lock (bitmap updates are atomic).
    pub async fn update<R, F>(&self, id: &UploadId, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut UploadSession) -> StoreResult<R>,
    {
        self.docs.update(id.as_str(), f).await
    }

    pub async fn remove(&self, id: &UploadId) -> StoreResult<()> {
        self.docs.remove(id.as_str()).await
    }

    /// Sessions past their TTL, for the expiry sweeper.
    pub async fn expired(&self) -> Vec<UploadSession> {
        let now = Utc::now();
        self.docs
            .all()
            .await
            .into_iter()
            .filter(|s| s.is_expired(now))
            .collect()
    }
}
