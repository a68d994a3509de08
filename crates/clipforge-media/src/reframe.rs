//! Aspect-ratio reframing: center crop with a letterbox fallback.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use clipforge_models::AspectRatio;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Fraction of horizontal content a 9:16 crop may discard before the
/// planner falls back to letterboxing.
pub const MAX_HORIZONTAL_LOSS: f64 = 0.40;

/// How a source frame maps onto the target aspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReframePlan {
    /// Source aspect already matches; plain scale
    Scale,
    /// Center crop to the target aspect, then scale
    Crop {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    },
    /// Scale to fit and pad (letterbox/pillarbox)
    Letterbox,
}

/// Decide how to reframe `src_width` x `src_height` to `target`.
///
/// The crop is center-biased. For a portrait target, a crop that would
/// discard more than [`MAX_HORIZONTAL_LOSS`] of the width letterboxes
/// instead, keeping wide shots intact.
pub fn plan_reframe(src_width: u32, src_height: u32, target: AspectRatio) -> ReframePlan {
    let src_ratio = src_width as f64 / src_height as f64;
    let target_ratio = target.ratio();

    if (src_ratio - target_ratio).abs() < 0.01 {
        return ReframePlan::Scale;
    }

    if src_ratio > target_ratio {
        // Source is wider: crop horizontally.
        let crop_width = even(src_height as f64 * target_ratio);
        let loss = 1.0 - crop_width as f64 / src_width as f64;
        if target == AspectRatio::Portrait && loss > MAX_HORIZONTAL_LOSS {
            debug!(loss = format!("{loss:.2}"), "Crop too aggressive, letterboxing");
            return ReframePlan::Letterbox;
        }
        let x = (src_width - crop_width) / 2;
        ReframePlan::Crop {
            width: crop_width,
            height: even(src_height as f64),
            x,
            y: 0,
        }
    } else {
        // Source is taller: crop vertically.
        let crop_height = even(src_width as f64 / target_ratio);
        let y = (src_height - crop_height) / 2;
        ReframePlan::Crop {
            width: even(src_width as f64),
            height: crop_height,
            x: 0,
            y,
        }
    }
}

fn even(v: f64) -> u32 {
    let n = v.floor() as u32;
    n - (n % 2)
}

impl ReframePlan {
    /// FFmpeg video filter realizing this plan at the target's canonical
    /// output dimensions.
    pub fn to_filter(&self, target: AspectRatio) -> String {
        let (out_w, out_h) = target.output_dimensions();
        match self {
            ReframePlan::Scale => format!("scale={out_w}:{out_h}"),
            ReframePlan::Crop {
                width,
                height,
                x,
                y,
            } => format!("crop={width}:{height}:{x}:{y},scale={out_w}:{out_h}"),
            ReframePlan::Letterbox => format!(
                "scale={out_w}:{out_h}:force_original_aspect_ratio=decrease,\
                 pad={out_w}:{out_h}:(ow-iw)/2:(oh-ih)/2:color=black"
            ),
        }
    }
}

/// Reframe a clip to the target aspect ratio.
///
/// Produces a high-quality intermediate; the finalize stage applies the
/// requested quality preset.
pub async fn reframe_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    plan: &ReframePlan,
    target: AspectRatio,
    timeout: Duration,
) -> MediaResult<()> {
    FfmpegCommand::new(input, output)
        .video_filter(plan.to_filter(target))
        .output_args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "18"])
        .output_args(["-c:a", "copy"])
        .run(Some(timeout))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_aspect_scales() {
        assert_eq!(
            plan_reframe(1920, 1080, AspectRatio::Landscape),
            ReframePlan::Scale
        );
        assert_eq!(
            plan_reframe(1080, 1920, AspectRatio::Portrait),
            ReframePlan::Scale
        );
    }

    #[test]
    fn landscape_to_portrait_letterboxes_past_loss_threshold() {
        // 1920x1080 -> 9:16 would keep only 607 of 1920 px (~68% loss).
        assert_eq!(
            plan_reframe(1920, 1080, AspectRatio::Portrait),
            ReframePlan::Letterbox
        );
    }

    #[test]
    fn mild_crop_is_kept() {
        // 1280x1080 -> 9:16 crop keeps 606/1280 px... still >40% loss.
        assert_eq!(
            plan_reframe(1280, 1080, AspectRatio::Portrait),
            ReframePlan::Letterbox
        );
        // 800x1080 -> 9:16 keeps 606/800 px (~24% loss): crop.
        match plan_reframe(800, 1080, AspectRatio::Portrait) {
            ReframePlan::Crop { width, x, .. } => {
                assert_eq!(width, 606);
                assert_eq!(x, 97);
            }
            other => panic!("expected crop, got {other:?}"),
        }
    }

    #[test]
    fn square_target_crops_landscape() {
        match plan_reframe(1920, 1080, AspectRatio::Square) {
            ReframePlan::Crop { width, height, x, y } => {
                assert_eq!(width, 1080);
                assert_eq!(height, 1080);
                assert_eq!(x, 420);
                assert_eq!(y, 0);
            }
            other => panic!("expected crop, got {other:?}"),
        }
    }

    #[test]
    fn portrait_to_landscape_crops_vertically() {
        match plan_reframe(1080, 1920, AspectRatio::Landscape) {
            ReframePlan::Crop { width, height, x, y } => {
                assert_eq!(width, 1080);
                assert_eq!(height, 606);
                assert_eq!(x, 0);
                assert!(y > 0);
            }
            other => panic!("expected crop, got {other:?}"),
        }
    }

    #[test]
    fn crop_dimensions_are_even() {
        for (w, h) in [(1361, 1080), (999, 777), (1920, 1079)] {
            if let ReframePlan::Crop { width, height, .. } =
                plan_reframe(w, h, AspectRatio::Square)
            {
                assert_eq!(width % 2, 0);
                assert_eq!(height % 2, 0);
            }
        }
    }

    #[test]
    fn filters_render() {
        let f = ReframePlan::Letterbox.to_filter(AspectRatio::Portrait);
        assert!(f.contains("pad=1080:1920"));

        let f = ReframePlan::Scale.to_filter(AspectRatio::Square);
        assert_eq!(f, "scale=1080:1080");
    }
}
