//! Media backend abstraction.
//!
//! The stage machine drives this trait; the production implementation
//! shells out to FFmpeg and the ASR service, tests substitute a fake
//! that fabricates files and transcripts.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use clipforge_asr::AsrClient;
use clipforge_media::{MediaInfo, ReframePlan};
use clipforge_models::{AspectRatio, EncodingConfig, TranscriptSegment};

use crate::error::WorkerResult;

/// Media operations the pipeline needs, one method per external effect.
pub trait MediaBackend: Send + Sync + 'static {
    /// Read container metadata; fails on inputs without a video stream.
    fn probe(
        &self,
        input: &Path,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<MediaInfo>> + Send;

    /// Produce a mono 16 kHz WAV for ASR.
    fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<()>> + Send;

    /// Transcribe extracted audio. An empty result means no speech.
    fn transcribe(
        &self,
        audio: &Path,
    ) -> impl Future<Output = WorkerResult<Vec<TranscriptSegment>>> + Send;

    /// Extract a sub-clip without re-encoding.
    fn cut(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        length: f64,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<()>> + Send;

    /// Crop/pad a sub-clip to the target aspect ratio.
    fn reframe(
        &self,
        input: &Path,
        output: &Path,
        plan: &ReframePlan,
        target: AspectRatio,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<()>> + Send;

    /// Burn an ASS caption track into a sub-clip.
    fn burn_captions(
        &self,
        input: &Path,
        output: &Path,
        ass_path: &Path,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<()>> + Send;

    /// Final encode with the preset's parameters.
    fn finalize(
        &self,
        input: &Path,
        output: &Path,
        encoding: &EncodingConfig,
        timeout: Duration,
    ) -> impl Future<Output = WorkerResult<()>> + Send;
}

/// Production backend: FFmpeg/FFprobe plus the ASR service.
#[derive(Clone)]
pub struct FfmpegBackend {
    asr: AsrClient,
}

impl FfmpegBackend {
    pub fn new(asr: AsrClient) -> Self {
        Self { asr }
    }
}

impl MediaBackend for FfmpegBackend {
    async fn probe(&self, input: &Path, _timeout: Duration) -> WorkerResult<MediaInfo> {
        Ok(clipforge_media::probe_media(input).await?)
    }

    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> WorkerResult<()> {
        Ok(clipforge_media::extract_asr_audio(input, output, timeout).await?)
    }

    async fn transcribe(&self, audio: &Path) -> WorkerResult<Vec<TranscriptSegment>> {
        let response = self.asr.transcribe(audio).await?;
        Ok(response.into_segments())
    }

    async fn cut(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        length: f64,
        timeout: Duration,
    ) -> WorkerResult<()> {
        Ok(clipforge_media::cut_segment(input, output, start, length, timeout).await?)
    }

    async fn reframe(
        &self,
        input: &Path,
        output: &Path,
        plan: &ReframePlan,
        target: AspectRatio,
        timeout: Duration,
    ) -> WorkerResult<()> {
        Ok(clipforge_media::reframe_clip(input, output, plan, target, timeout).await?)
    }

    async fn burn_captions(
        &self,
        input: &Path,
        output: &Path,
        ass_path: &Path,
        timeout: Duration,
    ) -> WorkerResult<()> {
        Ok(clipforge_media::burn_captions(input, output, ass_path, timeout).await?)
    }

    async fn finalize(
        &self,
        input: &Path,
        output: &Path,
        encoding: &EncodingConfig,
        timeout: Duration,
    ) -> WorkerResult<()> {
        Ok(clipforge_media::finalize_encode(input, output, encoding, timeout).await?)
    }
}
