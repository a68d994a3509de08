//! Heuristic "viral moment" scoring over transcripts.
//!
//! The contract is the output shape: an ordered list of candidate
//! windows scored in [0, 10], deduplicated by interval overlap. The
//! heuristic itself (marker words, speech density, early-position bonus)
//! is implementation policy and private to this module.

use clipforge_models::Transcript;

/// Overlap threshold above which two candidates are considered the same
/// moment; the higher-scored one survives.
pub const DEDUP_IOU: f64 = 0.3;

/// Score assigned to fallback windows when there is no speech to rank.
const SILENT_FALLBACK_SCORE: f64 = 2.5;

/// Marker words that correlate with clip-worthy moments.
const MARKER_WORDS: &[&str] = &[
    "secret", "crazy", "insane", "amazing", "unbelievable", "incredible",
    "never", "nobody", "everyone", "best", "worst", "free", "money",
    "hack", "trick", "mistake", "wow", "laugh", "funny", "love", "hate",
    "truth", "actually", "literally",
];

/// A candidate clip window within the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateWindow {
    /// Start in the source, seconds
    pub start: f64,
    /// End in the source, seconds
    pub end: f64,
    /// Heuristic score in [0, 10]
    pub score: f64,
}

impl CandidateWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Intersection-over-union of two intervals.
pub fn interval_iou(a: (f64, f64), b: (f64, f64)) -> f64 {
    let intersection = (a.1.min(b.1) - a.0.max(b.0)).max(0.0);
    let union = (a.1.max(b.1) - a.0.min(b.0)).max(f64::EPSILON);
    intersection / union
}

/// Produce up to `max_candidates` scored windows of `clip_len` seconds,
/// ordered by source position.
///
/// Each transcript segment seeds a window snapped to the segment's
/// sentence boundary. Overlapping candidates (IoU above [`DEDUP_IOU`])
/// keep the higher score. Silent inputs fall back to evenly spaced
/// windows so clips are still produced.
pub fn score_candidates(
    transcript: &Transcript,
    total_duration: f64,
    clip_len: f64,
    max_candidates: usize,
) -> Vec<CandidateWindow> {
    let clip_len = clip_len.min(total_duration).max(1.0);

    let mut candidates = if transcript.is_empty() {
        fallback_windows(total_duration, clip_len, max_candidates)
    } else {
        scored_windows(transcript, total_duration, clip_len)
    };

    // Highest score first; ties broken by earlier position.
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut selected: Vec<CandidateWindow> = Vec::new();
    for candidate in candidates {
        if selected.len() >= max_candidates {
            break;
        }
        let overlaps = selected.iter().any(|kept| {
            interval_iou((kept.start, kept.end), (candidate.start, candidate.end)) > DEDUP_IOU
        });
        if !overlaps {
            selected.push(candidate);
        }
    }

    // Artifacts are ordered by where they appear in the source.
    selected.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    selected
}

fn scored_windows(
    transcript: &Transcript,
    total_duration: f64,
    clip_len: f64,
) -> Vec<CandidateWindow> {
    let avg_density = {
        let densities: Vec<f64> = transcript
            .segments
            .iter()
            .map(|s| s.word_density())
            .filter(|d| *d > 0.0)
            .collect();
        if densities.is_empty() {
            1.0
        } else {
            densities.iter().sum::<f64>() / densities.len() as f64
        }
    };

    transcript
        .segments
        .iter()
        .map(|segment| {
            // Snap the window to the sentence start, clamped to fit.
            let start = segment.start.min((total_duration - clip_len).max(0.0));
            let end = start + clip_len;

            let text = segment.text.to_lowercase();
            let marker_hits = MARKER_WORDS
                .iter()
                .filter(|m| text.contains(*m))
                .count() as f64;
            let punch = text.matches(['!', '?']).count() as f64;
            let density_ratio = if avg_density > 0.0 {
                (segment.word_density() / avg_density).clamp(0.0, 2.0)
            } else {
                0.0
            };
            let early_bonus = 1.0 - (segment.start / total_duration.max(1.0)).clamp(0.0, 1.0);

            let score = (1.0
                + (marker_hits * 1.5).min(4.5)
                + (punch * 0.75).min(1.5)
                + density_ratio
                + early_bonus)
                .clamp(0.0, 10.0);

            CandidateWindow { start, end, score }
        })
        .collect()
}

/// Evenly spaced windows for inputs with no rankable speech.
fn fallback_windows(total_duration: f64, clip_len: f64, count: usize) -> Vec<CandidateWindow> {
    if total_duration <= clip_len || count <= 1 {
        return vec![CandidateWindow {
            start: 0.0,
            end: clip_len.min(total_duration),
            score: SILENT_FALLBACK_SCORE,
        }];
    }
    let span = total_duration - clip_len;
    (0..count)
        .map(|i| {
            let start = span * i as f64 / (count - 1) as f64;
            CandidateWindow {
                start,
                end: start + clip_len,
                score: SILENT_FALLBACK_SCORE,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::{JobId, TranscriptSegment, WordTiming};

    fn segment(start: f64, end: f64, text: &str, words_per_sec: f64) -> TranscriptSegment {
        let n = ((end - start) * words_per_sec).round() as usize;
        TranscriptSegment {
            start,
            end,
            text: text.to_string(),
            words: (0..n)
                .map(|i| {
                    let t = start + i as f64 / words_per_sec;
                    WordTiming {
                        word: format!("w{i}"),
                        start: t,
                        end: t + 0.2,
                    }
                })
                .collect(),
        }
    }

    fn transcript(segments: Vec<TranscriptSegment>) -> Transcript {
        Transcript {
            job_id: JobId::from("job-1"),
            segments,
        }
    }

    #[test]
    fn iou_math() {
        assert!((interval_iou((0.0, 10.0), (0.0, 10.0)) - 1.0).abs() < 1e-9);
        assert!((interval_iou((0.0, 10.0), (5.0, 15.0)) - 5.0 / 15.0).abs() < 1e-9);
        assert_eq!(interval_iou((0.0, 10.0), (20.0, 30.0)), 0.0);
    }

    #[test]
    fn marker_words_outscore_plain_speech() {
        let t = transcript(vec![
            segment(0.0, 5.0, "so yeah we talked about stuff", 2.0),
            segment(100.0, 105.0, "this crazy secret trick is amazing!", 2.0),
        ]);
        let windows = score_candidates(&t, 300.0, 15.0, 3);
        let plain = windows.iter().find(|w| w.start < 1.0).unwrap();
        let spicy = windows.iter().find(|w| w.start > 50.0).unwrap();
        assert!(spicy.score > plain.score);
    }

    #[test]
    fn scores_stay_in_range() {
        let t = transcript(vec![segment(
            0.0,
            5.0,
            "crazy insane amazing unbelievable secret free money hack wow!!!???",
            8.0,
        )]);
        let windows = score_candidates(&t, 60.0, 15.0, 3);
        assert!(windows.iter().all(|w| (0.0..=10.0).contains(&w.score)));
    }

    #[test]
    fn overlapping_candidates_dedupe_to_higher_score() {
        let t = transcript(vec![
            segment(10.0, 15.0, "plain words here", 2.0),
            segment(12.0, 17.0, "amazing secret hack!", 2.0),
        ]);
        let windows = score_candidates(&t, 300.0, 30.0, 3);
        // The two windows overlap heavily; only the spicier one survives.
        assert_eq!(windows.len(), 1);
        assert!((windows[0].start - 12.0).abs() < 1e-9);
    }

    #[test]
    fn selects_at_most_k_ordered_by_position() {
        let segments = (0..8)
            .map(|i| segment(i as f64 * 60.0, i as f64 * 60.0 + 5.0, "words and words", 2.0))
            .collect();
        let t = transcript(segments);
        let windows = score_candidates(&t, 600.0, 30.0, 3);
        assert_eq!(windows.len(), 3);
        assert!(windows.windows(2).all(|p| p[0].start <= p[1].start));
    }

    #[test]
    fn single_candidate_stays_single() {
        let t = transcript(vec![segment(5.0, 10.0, "only moment", 2.0)]);
        let windows = score_candidates(&t, 60.0, 15.0, 3);
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn silent_input_gets_fallback_windows() {
        let t = transcript(vec![]);
        let windows = score_candidates(&t, 300.0, 30.0, 3);
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.score == SILENT_FALLBACK_SCORE));
        assert!((windows[2].end - 300.0).abs() < 1e-6);
    }

    #[test]
    fn short_silent_input_yields_one_window() {
        let t = transcript(vec![]);
        let windows = score_candidates(&t, 10.0, 15.0, 3);
        assert_eq!(windows.len(), 1);
        assert!((windows[0].end - 10.0).abs() < 1e-9);
    }

    #[test]
    fn windows_fit_inside_source() {
        let t = transcript(vec![segment(290.0, 295.0, "late moment", 2.0)]);
        let windows = score_candidates(&t, 300.0, 30.0, 3);
        assert!(windows[0].end <= 300.0 + 1e-9);
    }
}
