//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Per-stage wall-clock deadlines.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub probe: Duration,
    pub extract: Duration,
    pub transcribe: Duration,
    pub score: Duration,
    /// Total across all cut operations
    pub cut: Duration,
    /// Total across all reframe operations
    pub reframe: Duration,
    /// Total across all caption burns
    pub caption: Duration,
    /// Total across all final encodes
    pub finalize: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(30),
            extract: Duration::from_secs(120),
            transcribe: Duration::from_secs(600),
            score: Duration::from_secs(30),
            cut: Duration::from_secs(180),
            reframe: Duration::from_secs(300),
            caption: Duration::from_secs(300),
            finalize: Duration::from_secs(120),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Work directory for per-attempt intermediates
    pub work_dir: PathBuf,
    /// Target number of clips per job
    pub default_clip_count: usize,
    /// Lease renewal interval while processing
    pub heartbeat_interval: Duration,
    /// Stage deadlines
    pub stage_timeouts: StageTimeouts,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/clipforge"),
            default_clip_count: 3,
            heartbeat_interval: Duration::from_secs(20),
            stage_timeouts: StageTimeouts::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("CLIPFORGE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            default_clip_count: std::env::var("DEFAULT_CLIP_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_clip_count),
            heartbeat_interval: Duration::from_secs(
                std::env::var("WORKER_HEARTBEAT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20),
            ),
            stage_timeouts: defaults.stage_timeouts,
        }
    }

    /// Per-attempt scratch directory.
    pub fn attempt_dir(&self, job_id: &str, attempt: u32) -> PathBuf {
        self.work_dir.join(format!("{job_id}-a{attempt}"))
    }
}
