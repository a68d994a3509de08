//! ASR service wire types.

use serde::{Deserialize, Serialize};

use clipforge_models::{TranscriptSegment, WordTiming};

/// Health check response.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// A word with timings as returned by the ASR service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A transcript segment as returned by the ASR service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<AsrWord>,
}

/// Full transcription response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub segments: Vec<AsrSegment>,
    /// Detected language code, if the service reports one
    #[serde(default)]
    pub language: Option<String>,
}

impl TranscribeResponse {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Convert into the shared transcript segment model.
    pub fn into_segments(self) -> Vec<TranscriptSegment> {
        self.segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start: s.start,
                end: s.end,
                text: s.text,
                words: s
                    .words
                    .into_iter()
                    .map(|w| WordTiming {
                        word: w.word,
                        start: w.start,
                        end: w.end,
                    })
                    .collect(),
            })
            .collect()
    }
}
