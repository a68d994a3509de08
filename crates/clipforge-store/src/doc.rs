//! Document-per-row persistence primitive.
//!
//! Rows live in memory behind an `RwLock` and are written through to
//! `<dir>/<id>.json` with an atomic replace. A per-row mutex serializes
//! read-modify-write cycles; readers never block on writers of other
//! rows.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::{StoreError, StoreResult};

pub(crate) struct DocMap<T> {
    dir: PathBuf,
    rows: RwLock<HashMap<String, T>>,
    row_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<T> DocMap<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Open a collection, loading every existing document.
    pub async fn open(dir: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&dir).await?;

        let mut rows = HashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match serde_json::from_slice::<T>(&fs::read(&path).await?) {
                Ok(row) => {
                    rows.insert(stem.to_string(), row);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                }
            }
        }

        Ok(Self {
            dir,
            rows: RwLock::new(rows),
            row_locks: Mutex::new(HashMap::new()),
        })
    }

    async fn row_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.rows.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.rows.read().await.contains_key(id)
    }

    pub async fn all(&self) -> Vec<T> {
        self.rows.read().await.values().cloned().collect()
    }

    /// Insert a new row. Fails with `Conflict` if the id already exists.
    pub async fn insert(&self, id: &str, row: T) -> StoreResult<()> {
        let lock = self.row_lock(id).await;
        let _guard = lock.lock().await;

        if self.rows.read().await.contains_key(id) {
            return Err(StoreError::conflict(format!("row {id} already exists")));
        }
        self.persist(id, &row).await?;
        self.rows.write().await.insert(id.to_string(), row);
        Ok(())
    }

    /// Replace a row unconditionally (creates if missing).
    pub async fn put(&self, id: &str, row: T) -> StoreResult<()> {
        let lock = self.row_lock(id).await;
        let _guard = lock.lock().await;
        self.persist(id, &row).await?;
        self.rows.write().await.insert(id.to_string(), row);
        Ok(())
    }

    /// Read-modify-write under the row lock. The closure may fail, in
    /// which case nothing is persisted.
    pub async fn update<R, F>(&self, id: &str, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut T) -> StoreResult<R>,
    {
        let lock = self.row_lock(id).await;
        let _guard = lock.lock().await;

        let mut row = self
            .rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))?;

        let out = f(&mut row)?;
        self.persist(id, &row).await?;
        self.rows.write().await.insert(id.to_string(), row);
        Ok(out)
    }

    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let lock = self.row_lock(id).await;
        let _guard = lock.lock().await;

        if self.rows.write().await.remove(id).is_none() {
            return Err(StoreError::not_found(id));
        }
        let path = self.doc_path(id);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Atomic replace: write a temp file then rename over the document.
    async fn persist(&self, id: &str, row: &T) -> StoreResult<()> {
        let path = self.doc_path(id);
        let tmp = self.dir.join(format!(".{id}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(row)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
