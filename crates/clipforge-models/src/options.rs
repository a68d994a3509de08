//! Job options: aspect ratios, quality presets, caption styles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Valid range for a client-supplied clip duration hint, in seconds.
/// Hints outside this range are ignored, not rejected.
pub const CLIP_DURATION_HINT_MIN: f64 = 5.0;
pub const CLIP_DURATION_HINT_MAX: f64 = 120.0;

/// Target aspect ratio for produced clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Vertical 9:16 (Shorts/Reels/TikTok)
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    /// Square 1:1
    #[serde(rename = "1:1")]
    Square,
    /// Horizontal 16:9
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
        }
    }

    /// Width/height ratio as a float.
    pub fn ratio(&self) -> f64 {
        match self {
            AspectRatio::Portrait => 9.0 / 16.0,
            AspectRatio::Square => 1.0,
            AspectRatio::Landscape => 16.0 / 9.0,
        }
    }

    /// Canonical output dimensions (even, encoder-friendly).
    pub fn output_dimensions(&self) -> (u32, u32) {
        match self {
            AspectRatio::Portrait => (1080, 1920),
            AspectRatio::Square => (1080, 1080),
            AspectRatio::Landscape => (1920, 1080),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("invalid aspect ratio: {0}")]
pub struct ParseAspectRatioError(String);

impl FromStr for AspectRatio {
    type Err = ParseAspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            "16:9" => Ok(AspectRatio::Landscape),
            other => Err(ParseAspectRatioError(other.to_string())),
        }
    }
}

/// Encoder quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    /// Speed-optimized, low bitrate
    Fast,
    /// Balanced
    #[default]
    Medium,
    /// Quality-biased
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Fast => "fast",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
        }
    }
}

/// Burned-in caption style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    /// Bold sans, solid highlight box on the active word
    #[default]
    Modern,
    /// Outlined text, active word in accent color
    Classic,
    /// Plain text, active word underlined
    Minimal,
}

impl CaptionStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionStyle::Modern => "modern",
            CaptionStyle::Classic => "classic",
            CaptionStyle::Minimal => "minimal",
        }
    }
}

/// Options supplied at job submission.
///
/// Unknown JSON keys are ignored on deserialization; recognized keys with
/// invalid values are rejected upstream by the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct JobOptions {
    /// Burn word-synchronized captions into the clips
    #[serde(default)]
    pub add_captions: bool,

    /// Target aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Advisory platform tags; affects artifact naming only
    #[serde(default)]
    pub target_platforms: BTreeSet<String>,

    /// Target clip length in seconds; ignored if outside [5, 120]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_duration_hint: Option<f64>,

    /// Encoder quality preset
    #[serde(default)]
    pub quality_preset: QualityPreset,

    /// Caption typography
    #[serde(default)]
    pub caption_style: CaptionStyle,
}

impl JobOptions {
    /// The duration hint, if present and within the accepted range.
    pub fn effective_duration_hint(&self) -> Option<f64> {
        self.clip_duration_hint
            .filter(|d| (CLIP_DURATION_HINT_MIN..=CLIP_DURATION_HINT_MAX).contains(d))
    }

    /// Clip length to target for a source of `total_duration` seconds.
    ///
    /// Without a valid hint, picks from the {15, 30, 60} ladder:
    /// sources up to 60s get 15s clips, up to 3 minutes get 30s,
    /// everything longer gets 60s.
    pub fn clip_length_for(&self, total_duration: f64) -> f64 {
        if let Some(hint) = self.effective_duration_hint() {
            return hint;
        }
        if total_duration <= 60.0 {
            15.0
        } else if total_duration <= 180.0 {
            30.0
        } else {
            60.0
        }
    }
}
