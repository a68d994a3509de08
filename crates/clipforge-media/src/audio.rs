//! Audio extraction for ASR.

use std::path::Path;
use std::time::Duration;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Extract a mono 16 kHz PCM WAV suitable for speech recognition.
pub async fn extract_asr_audio(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<()> {
    FfmpegCommand::new(input, output)
        .no_video()
        .output_args(["-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"])
        .run(Some(timeout))
        .await
}
