//! Timed transcripts produced by the transcribe stage.
//!
//! Persisted as job intermediate state so downstream social-copy
//! collaborators can consume them without re-running ASR.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::JobId;

/// A single word with its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    pub word: String,
    /// Start offset in seconds from the beginning of the input
    pub start: f64,
    /// End offset in seconds
    pub end: f64,
}

/// A transcript segment, roughly one sentence or phrase.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Word-level timings within the segment
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl TranscriptSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Words per second; 0 for empty or zero-length segments.
    pub fn word_density(&self) -> f64 {
        let d = self.duration();
        if d <= 0.0 {
            return 0.0;
        }
        self.words.len() as f64 / d
    }
}

/// Full transcript for a job's audio.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub job_id: JobId,
    /// Ordered, non-overlapping segments
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// An empty transcript (silent input or no speech detected).
    pub fn empty(job_id: JobId) -> Self {
        Self {
            job_id,
            segments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All words across segments, in time order.
    pub fn words(&self) -> impl Iterator<Item = &WordTiming> {
        self.segments.iter().flat_map(|s| s.words.iter())
    }

    /// Words whose midpoint falls within `[start, end)`.
    pub fn words_in_window(&self, start: f64, end: f64) -> Vec<&WordTiming> {
        self.words()
            .filter(|w| {
                let mid = (w.start + w.end) / 2.0;
                mid >= start && mid < end
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Transcript {
        Transcript {
            job_id: JobId::from("job-1"),
            segments: vec![TranscriptSegment {
                start: 0.0,
                end: 2.0,
                text: "hello wild world".to_string(),
                words: vec![
                    WordTiming { word: "hello".into(), start: 0.0, end: 0.5 },
                    WordTiming { word: "wild".into(), start: 0.6, end: 1.0 },
                    WordTiming { word: "world".into(), start: 1.1, end: 1.9 },
                ],
            }],
        }
    }

    #[test]
    fn words_in_window_uses_midpoint() {
        let t = transcript();
        let words = t.words_in_window(0.0, 1.0);
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].word, "wild");
    }

    #[test]
    fn density() {
        let t = transcript();
        let seg = &t.segments[0];
        assert!((seg.word_density() - 1.5).abs() < f64::EPSILON);
    }
}
