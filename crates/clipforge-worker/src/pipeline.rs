//! The per-job stage machine: probe → extract → transcribe → score →
//! cut → reframe → caption → finalize.
//!
//! Stages are strictly serial within a job. The cancellation flag is
//! checked before and after every external operation, and long calls
//! race against it so a cancel is observed promptly. Each stage maps its
//! internal fraction onto the fixed overall percent ranges.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use clipforge_blob::BlobStore;
use clipforge_media::{plan_reframe, ReframePlan};
use clipforge_models::{
    Artifact, ArtifactId, EncodingConfig, Job, JobId, JobResults, Phase, Progress, Transcript,
};
use clipforge_queue::{CancelFlag, CancelReason, EventBus};
use clipforge_store::Store;

use crate::backend::MediaBackend;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::scoring::{self, CandidateWindow};

/// Everything a pipeline run needs.
pub struct ProcessingContext<B> {
    pub store: Store,
    pub blobs: BlobStore,
    pub events: EventBus,
    pub backend: B,
    pub config: WorkerConfig,
}

/// Map the cancellation flag to the matching worker error.
fn checkpoint(cancel: &CancelFlag) -> WorkerResult<()> {
    match cancel.get() {
        None => Ok(()),
        Some(CancelReason::User) => Err(WorkerError::Cancelled),
        Some(CancelReason::Deadline) => Err(WorkerError::DeadlineExceeded),
    }
}

/// Race a backend call against cancellation so in-flight work is
/// abandoned as soon as the flag trips.
async fn cancellable<T, F>(cancel: &CancelFlag, fut: F) -> WorkerResult<T>
where
    F: std::future::Future<Output = WorkerResult<T>>,
{
    tokio::select! {
        biased;
        reason = cancel.cancelled() => Err(match reason {
            CancelReason::User => WorkerError::Cancelled,
            CancelReason::Deadline => WorkerError::DeadlineExceeded,
        }),
        result = fut => result,
    }
}

/// Per-operation timeout when a stage deadline covers `count` operations.
fn per_op(total: Duration, count: usize) -> Duration {
    let split = total.div_f64(count.max(1) as f64);
    split.max(Duration::from_secs(10))
}

/// Run the full stage machine for one attempt.
///
/// On success the artifacts are registered (the one observable external
/// effect, written as a single batch) and the results are returned; the
/// caller performs the credit hook and the COMPLETED transition.
pub async fn run_pipeline<B: MediaBackend>(
    ctx: &ProcessingContext<B>,
    job: &Job,
    cancel: &CancelFlag,
) -> WorkerResult<JobResults> {
    let timeouts = &ctx.config.stage_timeouts;
    let work = ctx.config.attempt_dir(job.id.as_str(), job.attempts);
    tokio::fs::create_dir_all(&work).await?;

    // -- Probe ------------------------------------------------------------
    checkpoint(cancel)?;
    report(ctx, &job.id, Phase::Probe, 0.0, "Probing input").await?;
    let input = ctx.blobs.path(&job.input_blob_id).await?;
    let info = cancellable(cancel, ctx.backend.probe(&input, timeouts.probe)).await?;
    report(
        ctx,
        &job.id,
        Phase::Probe,
        1.0,
        format!(
            "{}x{} {:.1}s {}",
            info.width, info.height, info.duration, info.video_codec
        ),
    )
    .await?;

    // -- Extract audio ----------------------------------------------------
    checkpoint(cancel)?;
    report(ctx, &job.id, Phase::Extract, 0.0, "Extracting audio").await?;
    let audio_path = if info.has_audio {
        let path = work.join("audio.wav");
        cancellable(
            cancel,
            ctx.backend.extract_audio(&input, &path, timeouts.extract),
        )
        .await?;
        Some(path)
    } else {
        debug!(job_id = %job.id, "Input has no audio stream");
        None
    };
    report(ctx, &job.id, Phase::Extract, 1.0, "Audio ready").await?;

    // -- Transcribe -------------------------------------------------------
    checkpoint(cancel)?;
    report(ctx, &job.id, Phase::Transcribe, 0.0, "Transcribing speech").await?;
    let segments = match &audio_path {
        Some(path) => cancellable(cancel, ctx.backend.transcribe(path)).await?,
        None => Vec::new(),
    };
    let transcript = Transcript {
        job_id: job.id.clone(),
        segments,
    };
    ctx.store.transcripts.put(&transcript).await?;
    let captions_requested = job.options.add_captions && !transcript.is_empty();
    let transcribe_desc = if transcript.is_empty() {
        "No speech detected".to_string()
    } else {
        format!("{} transcript segments", transcript.segments.len())
    };
    report(ctx, &job.id, Phase::Transcribe, 1.0, transcribe_desc).await?;

    // -- Score ------------------------------------------------------------
    checkpoint(cancel)?;
    report(ctx, &job.id, Phase::Score, 0.0, "Scoring moments").await?;
    let clip_len = job.options.clip_length_for(info.duration);
    let windows = scoring::score_candidates(
        &transcript,
        info.duration,
        clip_len,
        ctx.config.default_clip_count,
    );
    if windows.is_empty() {
        return Err(WorkerError::processing_failed("scorer produced no windows"));
    }
    report(
        ctx,
        &job.id,
        Phase::Score,
        1.0,
        format!("Selected {} clip windows", windows.len()),
    )
    .await?;

    // -- Cut --------------------------------------------------------------
    let n = windows.len();
    let cut_timeout = per_op(timeouts.cut, n);
    let mut cut_paths = Vec::with_capacity(n);
    for (i, window) in windows.iter().enumerate() {
        checkpoint(cancel)?;
        let path = work.join(format!("cut_{i:02}.mp4"));
        cancellable(
            cancel,
            ctx.backend
                .cut(&input, &path, window.start, window.duration(), cut_timeout),
        )
        .await?;
        cut_paths.push(path);
        report(
            ctx,
            &job.id,
            Phase::Cut,
            (i + 1) as f64 / n as f64,
            format!("Cut clip {}/{}", i + 1, n),
        )
        .await?;
    }

    // -- Reframe ----------------------------------------------------------
    let aspect = job.options.aspect_ratio;
    let plan = plan_reframe(info.width, info.height, aspect);
    let reframe_timeout = per_op(timeouts.reframe, n);
    let mut reframed_paths = Vec::with_capacity(n);
    for (i, cut_path) in cut_paths.iter().enumerate() {
        checkpoint(cancel)?;
        let path = work.join(format!("reframed_{i:02}.mp4"));
        cancellable(
            cancel,
            ctx.backend
                .reframe(cut_path, &path, &plan, aspect, reframe_timeout),
        )
        .await?;
        reframed_paths.push(path);
        report(
            ctx,
            &job.id,
            Phase::Reframe,
            (i + 1) as f64 / n as f64,
            format!("Reframed clip {}/{} to {}", i + 1, n, aspect),
        )
        .await?;
    }
    if matches!(plan, ReframePlan::Letterbox) {
        debug!(job_id = %job.id, "Using letterbox fallback for reframe");
    }

    // -- Caption burn -----------------------------------------------------
    // Only when requested and the transcript has words in the window; a
    // clip whose window is silent ships without captions.
    let mut caption_assets: Vec<Option<(PathBuf, PathBuf)>> = vec![None; n];
    if captions_requested {
        let caption_timeout = per_op(timeouts.caption, n);
        for (i, window) in windows.iter().enumerate() {
            checkpoint(cancel)?;
            let cues = clipforge_media::build_cues(&transcript, window.start, window.end);
            if cues.is_empty() {
                continue;
            }
            let ass_path = work.join(format!("captions_{i:02}.ass"));
            let doc = clipforge_media::render_ass(&cues, job.options.caption_style);
            tokio::fs::write(&ass_path, doc).await?;

            let out = work.join(format!("captioned_{i:02}.mp4"));
            cancellable(
                cancel,
                ctx.backend
                    .burn_captions(&reframed_paths[i], &out, &ass_path, caption_timeout),
            )
            .await?;
            caption_assets[i] = Some((out, ass_path));
            report(
                ctx,
                &job.id,
                Phase::Caption,
                (i + 1) as f64 / n as f64,
                format!("Captioned clip {}/{}", i + 1, n),
            )
            .await?;
        }
    }
    report(ctx, &job.id, Phase::Caption, 1.0, "Captions done").await?;

    // -- Finalize ---------------------------------------------------------
    let encoding = EncodingConfig::for_preset(job.options.quality_preset);
    let finalize_timeout = per_op(timeouts.finalize, n);
    let mut artifacts = Vec::with_capacity(n);
    let mut total_duration = 0.0;
    let mut any_captions = false;

    for (i, window) in windows.iter().enumerate() {
        checkpoint(cancel)?;
        let (encode_input, ass_path) = match &caption_assets[i] {
            Some((captioned, ass)) => (captioned.as_path(), Some(ass.as_path())),
            None => (reframed_paths[i].as_path(), None),
        };
        let out = work.join(format!("final_{i:02}.mp4"));
        cancellable(
            cancel,
            ctx.backend
                .finalize(encode_input, &out, &encoding, finalize_timeout),
        )
        .await?;

        let blob = ctx.blobs.put_file(&out).await?;
        let caption_track_id = match ass_path {
            Some(path) => Some(ctx.blobs.put_file(path).await?.id),
            None => None,
        };

        let captions_added = caption_track_id.is_some();
        any_captions |= captions_added;
        total_duration += window.duration();

        artifacts.push(Artifact {
            id: ArtifactId::new(),
            job_id: job.id.clone(),
            ordinal: (i + 1) as u32,
            blob_id: blob.id,
            duration: window.duration(),
            source_start: window.start,
            source_end: window.end,
            aspect_ratio: aspect,
            captions_added,
            viral_score: window.score,
            caption_track_id,
            file_name: artifact_file_name(job, i + 1, window),
            created_at: chrono::Utc::now(),
        });
        report(
            ctx,
            &job.id,
            Phase::Finalize,
            (i + 1) as f64 / (n + 1) as f64,
            format!("Encoded clip {}/{}", i + 1, n),
        )
        .await?;
    }

    // The single observable external effect: one atomic batch.
    checkpoint(cancel)?;
    ctx.store.artifacts.put_batch(&job.id, artifacts).await?;

    info!(job_id = %job.id, clips = n, "Pipeline finished");
    Ok(JobResults {
        total_clips: n as u32,
        captions_added: any_captions,
        total_duration,
    })
}

/// Download name for an artifact; platform tags are advisory and only
/// affect naming.
fn artifact_file_name(job: &Job, ordinal: usize, window: &CandidateWindow) -> String {
    let aspect_tag = job.options.aspect_ratio.as_str().replace(':', "x");
    let platforms = if job.options.target_platforms.is_empty() {
        String::new()
    } else {
        let tags: Vec<&str> = job
            .options
            .target_platforms
            .iter()
            .map(|s| s.as_str())
            .collect();
        format!("_{}", tags.join("-"))
    };
    format!(
        "clip_{ordinal:02}_{aspect_tag}{platforms}_{}s.mp4",
        window.duration().round() as u64
    )
}

/// Write a progress snapshot to the row and fan it out to subscribers.
async fn report<B>(
    ctx: &ProcessingContext<B>,
    job_id: &JobId,
    phase: Phase,
    fraction: f64,
    description: impl Into<String>,
) -> WorkerResult<()> {
    let progress = Progress::new(phase, phase.overall_percent(fraction), description);
    let updated = ctx
        .store
        .jobs
        .update(job_id, move |row| {
            row.set_progress(progress);
            Ok(row.clone())
        })
        .await?;
    ctx.events.publish_job(&updated).await;
    Ok(())
}

/// Remove an attempt's intermediates.
pub async fn cleanup_attempt(config: &WorkerConfig, job_id: &str, attempt: u32) {
    let dir = config.attempt_dir(job_id, attempt);
    if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to clean attempt dir");
        }
    }
}
