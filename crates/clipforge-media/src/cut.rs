//! Sub-clip extraction.

use std::path::Path;
use std::time::Duration;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Extract `[start, start + length)` from the input without re-encoding.
///
/// Stream copy snaps to the nearest preceding keyframe, so the cut is
/// lossless within the GOP; exact frame boundaries are restored by the
/// final encode.
pub async fn cut_segment(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    length: f64,
    timeout: Duration,
) -> MediaResult<()> {
    FfmpegCommand::new(input, output)
        .seek(start.max(0.0))
        .duration(length)
        .stream_copy()
        // Negative timestamps confuse some players after stream copy
        .output_arg("-avoid_negative_ts")
        .output_arg("make_zero")
        .run(Some(timeout))
        .await
}
