//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::options::QualityPreset;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";

/// Video encoding configuration.
///
/// Quality presets map to an (encoder speed, CRF, audio bitrate) tuple;
/// everything else is fixed for the H.264/AAC output profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    pub codec: String,

    /// x264 speed preset (e.g., "veryfast", "medium", "slow")
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,

    /// Audio codec
    pub audio_codec: String,

    /// Audio bitrate
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl EncodingConfig {
    /// Encoder parameters for a named quality preset.
    pub fn for_preset(preset: QualityPreset) -> Self {
        let (speed, crf, audio_bitrate) = match preset {
            QualityPreset::Fast => ("veryfast", 28, "96k"),
            QualityPreset::Medium => ("medium", 23, "128k"),
            QualityPreset::High => ("slow", 18, "192k"),
        };
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: speed.to_string(),
            crf,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: audio_bitrate.to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Convert to FFmpeg command arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];
        args.extend(self.extra_args.clone());
        args
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_preset(QualityPreset::Medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_tuples() {
        let fast = EncodingConfig::for_preset(QualityPreset::Fast);
        assert_eq!(fast.preset, "veryfast");
        assert_eq!(fast.crf, 28);

        let high = EncodingConfig::for_preset(QualityPreset::High);
        assert_eq!(high.preset, "slow");
        assert_eq!(high.crf, 18);
        assert_eq!(high.audio_bitrate, "192k");
    }

    #[test]
    fn ffmpeg_args() {
        let config = EncodingConfig::default();
        let args = config.to_ffmpeg_args();
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"23".to_string()));
    }
}
