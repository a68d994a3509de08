//! Content-addressed store implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use clipforge_models::BlobId;

use crate::error::{BlobError, BlobResult};
use crate::sniff::detect_content_type;

const INDEX_FILE: &str = "index.json";
const SNIFF_BYTES: usize = 64;

/// Configuration for the blob store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Root directory for blob files and the metadata index
    pub root: PathBuf,
}

impl BlobConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("CLIPFORGE_BLOB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/blobs")),
        }
    }
}

/// Metadata for a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMeta {
    pub id: BlobId,
    pub size: u64,
    /// Detected from leading bytes at ingest
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    /// Number of live references (jobs, artifacts, uploads)
    pub refcount: u32,
}

/// Content-addressed, write-once blob store on local disk.
///
/// Files live at `<root>/<shard>/<digest>`; the metadata index is a JSON
/// document rewritten atomically under the store mutex. Concurrent puts
/// of the same content are idempotent.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    index: Arc<Mutex<HashMap<String, BlobMeta>>>,
}

impl BlobStore {
    /// Open (or create) a store rooted at `config.root`.
    pub async fn open(config: BlobConfig) -> BlobResult<Self> {
        fs::create_dir_all(&config.root).await?;

        let index_path = config.root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let raw = fs::read(&index_path).await?;
            serde_json::from_slice(&raw)?
        } else {
            HashMap::new()
        };

        info!(root = %config.root.display(), blobs = index.len(), "Opened blob store");

        Ok(Self {
            root: config.root,
            index: Arc::new(Mutex::new(index)),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> BlobResult<Self> {
        Self::open(BlobConfig::from_env()).await
    }

    /// Ingest from an async reader, returning the blob metadata.
    ///
    /// The stream is spooled to a temp file while the SHA-256 digest is
    /// computed, then moved into its content-addressed location. The
    /// initial refcount is 1.
    pub async fn put_stream<R>(&self, mut reader: R) -> BlobResult<BlobMeta>
    where
        R: AsyncRead + Unpin,
    {
        let tmp_path = self.root.join(format!(".ingest-{}", uuid_suffix()));
        let mut tmp = fs::File::create(&tmp_path).await?;

        let mut hasher = Sha256::new();
        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_BYTES);
        let mut size: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            if head.len() < SNIFF_BYTES {
                let take = (SNIFF_BYTES - head.len()).min(n);
                head.extend_from_slice(&buf[..take]);
            }
            tmp.write_all(&buf[..n]).await?;
            size += n as u64;
        }
        tmp.flush().await?;
        drop(tmp);

        let digest = format!("{:x}", hasher.finalize());
        let id = BlobId::from_digest(digest);
        let content_type = detect_content_type(&head)
            .unwrap_or("application/octet-stream")
            .to_string();

        self.finalize(tmp_path, id, size, content_type).await
    }

    /// Ingest an existing file by copying it into the store.
    pub async fn put_file(&self, path: impl AsRef<Path>) -> BlobResult<BlobMeta> {
        let file = fs::File::open(path.as_ref()).await?;
        self.put_stream(file).await
    }

    /// Ingest an in-memory buffer.
    pub async fn put_bytes(&self, data: &[u8]) -> BlobResult<BlobMeta> {
        self.put_stream(data).await
    }

    async fn finalize(
        &self,
        tmp_path: PathBuf,
        id: BlobId,
        size: u64,
        content_type: String,
    ) -> BlobResult<BlobMeta> {
        let dest = self.blob_path(&id);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut index = self.index.lock().await;

        if let Some(existing) = index.get(id.as_str()) {
            // Write-once: same digest means identical content.
            debug!(blob_id = %id, "Duplicate ingest, keeping existing blob");
            fs::remove_file(&tmp_path).await.ok();
            return Ok(existing.clone());
        }

        fs::rename(&tmp_path, &dest).await?;

        let meta = BlobMeta {
            id: id.clone(),
            size,
            content_type,
            created_at: Utc::now(),
            refcount: 1,
        };
        index.insert(id.as_str().to_string(), meta.clone());
        self.persist_index(&index).await?;

        debug!(blob_id = %id, size, content_type = %meta.content_type, "Stored blob");
        Ok(meta)
    }

    /// Path of a stored blob. Errors if the blob is unknown.
    pub async fn path(&self, id: &BlobId) -> BlobResult<PathBuf> {
        let index = self.index.lock().await;
        if !index.contains_key(id.as_str()) {
            return Err(BlobError::not_found(id.as_str()));
        }
        Ok(self.blob_path(id))
    }

    /// Open a stored blob for reading.
    pub async fn open_blob(&self, id: &BlobId) -> BlobResult<fs::File> {
        let path = self.path(id).await?;
        Ok(fs::File::open(path).await?)
    }

    /// Metadata for a stored blob.
    pub async fn stat(&self, id: &BlobId) -> BlobResult<BlobMeta> {
        let index = self.index.lock().await;
        index
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BlobError::not_found(id.as_str()))
    }

    pub async fn exists(&self, id: &BlobId) -> bool {
        self.index.lock().await.contains_key(id.as_str())
    }

    /// Take an additional reference on a blob.
    pub async fn add_ref(&self, id: &BlobId) -> BlobResult<u32> {
        let mut index = self.index.lock().await;
        let meta = index
            .get_mut(id.as_str())
            .ok_or_else(|| BlobError::not_found(id.as_str()))?;
        meta.refcount += 1;
        let count = meta.refcount;
        self.persist_index(&index).await?;
        Ok(count)
    }

    /// Release a reference. The blob file is removed when the count
    /// reaches zero.
    pub async fn release(&self, id: &BlobId) -> BlobResult<u32> {
        let mut index = self.index.lock().await;
        let meta = index
            .get_mut(id.as_str())
            .ok_or_else(|| BlobError::not_found(id.as_str()))?;
        if meta.refcount == 0 {
            return Err(BlobError::RefcountUnderflow(id.as_str().to_string()));
        }
        meta.refcount -= 1;
        let count = meta.refcount;

        if count == 0 {
            let path = self.blob_path(id);
            index.remove(id.as_str());
            if let Err(e) = fs::remove_file(&path).await {
                warn!(blob_id = %id, error = %e, "Failed to remove blob file");
            }
            debug!(blob_id = %id, "Blob released and removed");
        }

        self.persist_index(&index).await?;
        Ok(count)
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.root.join(id.shard()).join(id.as_str())
    }

    /// Atomic index rewrite: write to a temp file then rename over.
    async fn persist_index(&self, index: &HashMap<String, BlobMeta>) -> BlobResult<()> {
        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        let data = serde_json::to_vec_pretty(index)?;
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, self.root.join(INDEX_FILE)).await?;
        Ok(())
    }
}

fn uuid_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("{}-{:x}", std::process::id(), nanos)
}
