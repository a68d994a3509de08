//! End-to-end pipeline tests against a fake media backend.
//!
//! These exercise the stage machine without FFmpeg or a live ASR
//! service: the backend fabricates outputs, the stores are real.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use clipforge_blob::{BlobConfig, BlobStore};
use clipforge_media::{MediaInfo, ReframePlan};
use clipforge_models::{
    AspectRatio, EncodingConfig, Job, JobOptions, JobStatus, PrincipalId, PriorityClass,
    TranscriptSegment, WordTiming,
};
use clipforge_queue::{CancelFlag, CancelReason, EventBus};
use clipforge_store::{Store, StoreConfig};
use clipforge_worker::{
    run_pipeline, MediaBackend, ProcessingContext, WorkerConfig, WorkerError, WorkerResult,
};

/// Backend that fabricates files instead of running FFmpeg.
#[derive(Clone)]
struct FakeBackend {
    duration: f64,
    width: u32,
    height: u32,
    has_audio: bool,
    segments: Vec<TranscriptSegment>,
    transcribe_delay: Duration,
}

impl FakeBackend {
    fn new(duration: f64, has_audio: bool, segments: Vec<TranscriptSegment>) -> Self {
        Self {
            duration,
            width: 1920,
            height: 1080,
            has_audio,
            segments,
            transcribe_delay: Duration::ZERO,
        }
    }
}

async fn fabricate(output: &Path, tag: &str, source: &Path) -> WorkerResult<()> {
    let content = format!("{tag}:{}", source.display());
    tokio::fs::write(output, content).await?;
    Ok(())
}

impl MediaBackend for FakeBackend {
    async fn probe(&self, _input: &Path, _timeout: Duration) -> WorkerResult<MediaInfo> {
        Ok(MediaInfo {
            duration: self.duration,
            width: self.width,
            height: self.height,
            fps: 30.0,
            video_codec: "h264".to_string(),
            has_audio: self.has_audio,
            sample_rate: self.has_audio.then_some(48_000),
            size: 8 * 1024 * 1024,
            bitrate: 1_500_000,
        })
    }

    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        _timeout: Duration,
    ) -> WorkerResult<()> {
        fabricate(output, "audio", input).await
    }

    async fn transcribe(&self, _audio: &Path) -> WorkerResult<Vec<TranscriptSegment>> {
        if !self.transcribe_delay.is_zero() {
            tokio::time::sleep(self.transcribe_delay).await;
        }
        Ok(self.segments.clone())
    }

    async fn cut(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        _length: f64,
        _timeout: Duration,
    ) -> WorkerResult<()> {
        fabricate(output, &format!("cut@{start}"), input).await
    }

    async fn reframe(
        &self,
        input: &Path,
        output: &Path,
        _plan: &ReframePlan,
        _target: AspectRatio,
        _timeout: Duration,
    ) -> WorkerResult<()> {
        fabricate(output, "reframe", input).await
    }

    async fn burn_captions(
        &self,
        input: &Path,
        output: &Path,
        _ass_path: &Path,
        _timeout: Duration,
    ) -> WorkerResult<()> {
        fabricate(output, "captioned", input).await
    }

    async fn finalize(
        &self,
        input: &Path,
        output: &Path,
        _encoding: &EncodingConfig,
        _timeout: Duration,
    ) -> WorkerResult<()> {
        fabricate(output, "final", input).await
    }
}

struct Fixture {
    _dir: TempDir,
    ctx: Arc<ProcessingContext<FakeBackend>>,
}

async fn fixture(backend: FakeBackend) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig {
        root: dir.path().join("store"),
    })
    .await
    .unwrap();
    let blobs = BlobStore::open(BlobConfig {
        root: dir.path().join("blobs"),
    })
    .await
    .unwrap();
    let ctx = Arc::new(ProcessingContext {
        store,
        blobs,
        events: EventBus::new(128),
        backend,
        config: WorkerConfig {
            work_dir: dir.path().join("work"),
            ..WorkerConfig::default()
        },
    });
    Fixture { _dir: dir, ctx }
}

async fn running_job(ctx: &ProcessingContext<FakeBackend>, options: JobOptions) -> Job {
    let input = ctx.blobs.put_bytes(b"pretend this is a video").await.unwrap();
    let mut job = Job::new(
        PrincipalId::from("user-1"),
        input.id,
        options,
        PriorityClass::Interactive,
        3,
    );
    ctx.store.jobs.create(&job).await.unwrap();
    job = ctx
        .store
        .jobs
        .update(&job.id, |row| {
            row.begin_attempt("lease-1".into(), Utc::now() + chrono::Duration::seconds(60));
            Ok(row.clone())
        })
        .await
        .unwrap();
    job
}

/// Three spread-out spoken segments in a 45s input.
fn talky_segments() -> Vec<TranscriptSegment> {
    [0.0_f64, 16.0, 31.0]
        .iter()
        .map(|&start| TranscriptSegment {
            start,
            end: start + 4.0,
            text: "this amazing trick is crazy!".to_string(),
            words: (0..8)
                .map(|i| WordTiming {
                    word: format!("word{i}"),
                    start: start + i as f64 * 0.5,
                    end: start + i as f64 * 0.5 + 0.4,
                })
                .collect(),
        })
        .collect()
}

#[tokio::test]
async fn happy_path_portrait_with_captions() {
    let f = fixture(FakeBackend::new(45.0, true, talky_segments())).await;
    let job = running_job(
        &f.ctx,
        JobOptions {
            add_captions: true,
            aspect_ratio: AspectRatio::Portrait,
            ..Default::default()
        },
    )
    .await;

    let mut events = f.ctx.events.subscribe(&job.id).await;
    let cancel = CancelFlag::new();
    let results = run_pipeline(&f.ctx, &job, &cancel).await.unwrap();

    assert_eq!(results.total_clips, 3);
    assert!(results.captions_added);

    // Artifacts registered with dense ordinals and the requested shape.
    let artifacts = f.ctx.store.artifacts.list_by_job(&job.id).await;
    assert_eq!(artifacts.len(), 3);
    for (i, artifact) in artifacts.iter().enumerate() {
        assert_eq!(artifact.ordinal, (i + 1) as u32);
        assert_eq!(artifact.aspect_ratio, AspectRatio::Portrait);
        assert!(artifact.captions_added);
        assert!(artifact.caption_track_id.is_some());
        assert!((artifact.duration - 15.0).abs() < 0.5);
        assert!((0.0..=10.0).contains(&artifact.viral_score));
        assert!(f.ctx.blobs.exists(&artifact.blob_id).await);
    }

    // Transcript persisted for downstream consumers.
    let transcript = f.ctx.store.transcripts.get(&job.id).await.unwrap();
    assert_eq!(transcript.segments.len(), 3);

    // Progress events: seq strictly increasing, percent non-decreasing.
    drop(f);
    let mut last_seq = 0;
    let mut last_percent = 0;
    while let Some(event) = events.recv().await {
        assert!(event.seq > last_seq);
        assert!(event.percent >= last_percent);
        last_seq = event.seq;
        last_percent = event.percent;
    }
    assert!(last_percent >= 90, "pipeline should reach the finalize range");
}

#[tokio::test]
async fn silent_video_completes_without_captions() {
    let f = fixture(FakeBackend::new(120.0, false, Vec::new())).await;
    let job = running_job(
        &f.ctx,
        JobOptions {
            add_captions: true,
            ..Default::default()
        },
    )
    .await;

    let cancel = CancelFlag::new();
    let results = run_pipeline(&f.ctx, &job, &cancel).await.unwrap();

    assert!(!results.captions_added);
    assert!(results.total_clips >= 1);

    let transcript = f.ctx.store.transcripts.get(&job.id).await.unwrap();
    assert!(transcript.is_empty());

    let artifacts = f.ctx.store.artifacts.list_by_job(&job.id).await;
    assert!(artifacts.iter().all(|a| !a.captions_added));
    assert!(artifacts.iter().all(|a| a.caption_track_id.is_none()));
}

#[tokio::test]
async fn cancellation_mid_transcribe_is_prompt_and_clean() {
    let mut backend = FakeBackend::new(600.0, true, talky_segments());
    backend.transcribe_delay = Duration::from_secs(30);
    let f = fixture(backend).await;
    let job = running_job(&f.ctx, JobOptions::default()).await;

    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        flag.cancel(CancelReason::User);
    });

    let started = std::time::Instant::now();
    let err = run_pipeline(&f.ctx, &job, &cancel).await.unwrap_err();
    assert!(matches!(err, WorkerError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));

    // No artifacts were registered for the aborted attempt.
    assert!(f.ctx.store.artifacts.list_by_job(&job.id).await.is_empty());
}

#[tokio::test]
async fn deadline_cancellation_classifies_as_timeout() {
    let mut backend = FakeBackend::new(600.0, true, talky_segments());
    backend.transcribe_delay = Duration::from_secs(30);
    let f = fixture(backend).await;
    let job = running_job(&f.ctx, JobOptions::default()).await;

    let cancel = CancelFlag::new();
    cancel.cancel(CancelReason::Deadline);

    let err = run_pipeline(&f.ctx, &job, &cancel).await.unwrap_err();
    let job_error = err.to_job_error();
    assert_eq!(job_error.kind, clipforge_models::ErrorKind::Timeout);
    assert!(job_error.retryable);
}

#[tokio::test]
async fn single_candidate_produces_single_artifact() {
    let segments = vec![TranscriptSegment {
        start: 2.0,
        end: 6.0,
        text: "short and sweet".to_string(),
        words: vec![WordTiming {
            word: "short".into(),
            start: 2.0,
            end: 2.4,
        }],
    }];
    let f = fixture(FakeBackend::new(10.0, true, segments)).await;
    let job = running_job(&f.ctx, JobOptions::default()).await;

    let cancel = CancelFlag::new();
    let results = run_pipeline(&f.ctx, &job, &cancel).await.unwrap();
    assert_eq!(results.total_clips, 1);

    let artifacts = f.ctx.store.artifacts.list_by_job(&job.id).await;
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].ordinal, 1);
}

#[tokio::test]
async fn job_row_stays_running_until_executor_finishes() {
    let f = fixture(FakeBackend::new(45.0, true, talky_segments())).await;
    let job = running_job(&f.ctx, JobOptions::default()).await;

    let cancel = CancelFlag::new();
    run_pipeline(&f.ctx, &job, &cancel).await.unwrap();

    // The COMPLETED transition belongs to the executor (after the credit
    // hook); the pipeline itself leaves the row RUNNING.
    let row = f.ctx.store.jobs.get(&job.id).await.unwrap();
    assert_eq!(row.status, JobStatus::Running);
}
