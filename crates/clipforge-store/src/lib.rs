//! Durable persistence for the ClipForge pipeline.
//!
//! This crate provides:
//! - Job rows with state-machine enforcement and per-row serialized writes
//! - Upload sessions with atomic bitmap updates
//! - Transcripts keyed by job
//! - The artifact registry (atomic per-job batches, dense ordinals)
//!
//! Rows are JSON documents under a data directory, replaced atomically;
//! concurrent readers observe consistent snapshots per row.

pub mod artifacts;
mod doc;
pub mod error;
pub mod filter;
pub mod jobs;
pub mod transcripts;
pub mod uploads;

use std::path::PathBuf;

use tracing::info;

pub use artifacts::ArtifactRepo;
pub use error::{StoreError, StoreResult};
pub use filter::JobFilter;
pub use jobs::JobRepo;
pub use transcripts::TranscriptRepo;
pub use uploads::UploadRepo;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for all collections
    pub root: PathBuf,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("CLIPFORGE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/store")),
        }
    }
}

/// Handle bundling every repository over one data directory.
#[derive(Clone)]
pub struct Store {
    pub jobs: JobRepo,
    pub uploads: UploadRepo,
    pub transcripts: TranscriptRepo,
    pub artifacts: ArtifactRepo,
}

impl Store {
    /// Open (or create) all collections under `config.root`.
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        tokio::fs::create_dir_all(&config.root).await?;
        let store = Self {
            jobs: JobRepo::open(&config.root).await?,
            uploads: UploadRepo::open(&config.root).await?,
            transcripts: TranscriptRepo::open(&config.root).await?,
            artifacts: ArtifactRepo::open(&config.root).await?,
        };
        info!(root = %config.root.display(), "Opened job store");
        Ok(store)
    }

    /// Create from environment variables.
    pub async fn from_env() -> StoreResult<Self> {
        Self::open(StoreConfig::from_env()).await
    }
}
