//! Final encode to the requested quality preset.

use std::path::Path;
use std::time::Duration;

use clipforge_models::EncodingConfig;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Encode a finished clip with the preset's encoder parameters.
///
/// `faststart` moves the moov atom up front so clips start playing
/// before they finish downloading.
pub async fn finalize_encode(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
    timeout: Duration,
) -> MediaResult<()> {
    FfmpegCommand::new(input, output)
        .output_args(encoding.to_ffmpeg_args())
        .output_args(["-movflags", "+faststart"])
        .output_args(["-pix_fmt", "yuv420p"])
        .run(Some(timeout))
        .await
}
