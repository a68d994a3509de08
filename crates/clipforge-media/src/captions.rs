//! Karaoke caption rendering.
//!
//! Captions are a single line per cue with the currently-spoken word
//! highlighted, generated as an ASS subtitle track and burned in with
//! FFmpeg's `ass` filter.

use std::path::Path;
use std::time::Duration;

use clipforge_models::{CaptionStyle, Transcript, WordTiming};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Max words on one karaoke line.
const MAX_WORDS_PER_CUE: usize = 5;

/// Max cue duration in seconds.
const MAX_CUE_SECONDS: f64 = 3.5;

/// A silence gap longer than this starts a new cue.
const CUE_GAP_SECONDS: f64 = 1.2;

/// One on-screen caption line.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// Start within the clip, seconds
    pub start: f64,
    /// End within the clip, seconds
    pub end: f64,
    /// Words with clip-relative timings
    pub words: Vec<WordTiming>,
}

/// Build caption cues for a clip window `[window_start, window_end)` of
/// the source, with timings rebased to the clip.
pub fn build_cues(transcript: &Transcript, window_start: f64, window_end: f64) -> Vec<CaptionCue> {
    let words: Vec<WordTiming> = transcript
        .words_in_window(window_start, window_end)
        .into_iter()
        .map(|w| WordTiming {
            word: w.word.clone(),
            start: (w.start - window_start).max(0.0),
            end: (w.end - window_start).max(0.0),
        })
        .collect();

    let mut cues = Vec::new();
    let mut current: Vec<WordTiming> = Vec::new();

    for word in words {
        let should_break = match current.last() {
            None => false,
            Some(last) => {
                current.len() >= MAX_WORDS_PER_CUE
                    || word.start - last.end > CUE_GAP_SECONDS
                    || word.end - current[0].start > MAX_CUE_SECONDS
            }
        };
        if should_break {
            cues.push(cue_from(std::mem::take(&mut current)));
        }
        current.push(word);
    }
    if !current.is_empty() {
        cues.push(cue_from(current));
    }
    cues
}

fn cue_from(words: Vec<WordTiming>) -> CaptionCue {
    let start = words.first().map(|w| w.start).unwrap_or(0.0);
    let end = words.last().map(|w| w.end).unwrap_or(0.0);
    CaptionCue { start, end, words }
}

/// Render cues as an ASS document.
pub fn render_ass(cues: &[CaptionCue], style: CaptionStyle) -> String {
    let mut out = String::new();
    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    out.push_str("PlayResX: 1080\nPlayResY: 1920\n");
    out.push_str("WrapStyle: 2\nScaledBorderAndShadow: yes\n\n");

    out.push_str("[V4+ Styles]\n");
    out.push_str(
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n",
    );
    out.push_str(style_line(style));
    out.push('\n');

    out.push_str("[Events]\n");
    out.push_str("Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n");
    for cue in cues {
        out.push_str(&format!(
            "Dialogue: 0,{},{},Caption,,0,0,0,,{}\n",
            format_ass_time(cue.start),
            format_ass_time(cue.end),
            karaoke_text(cue)
        ));
    }
    out
}

/// Style header per caption typography. Primary is the highlighted
/// (already spoken) color, secondary the upcoming color.
fn style_line(style: CaptionStyle) -> &'static str {
    match style {
        // Bold sans with an opaque highlight box
        CaptionStyle::Modern => {
            "Style: Caption,Arial Black,72,&H0000FFFF,&H00FFFFFF,&H00000000,&HA0000000,\
             -1,0,0,0,100,100,0,0,3,4,0,2,60,60,120,1\n"
        }
        // Outlined text, accent-colored active word
        CaptionStyle::Classic => {
            "Style: Caption,Georgia,64,&H0000D7FF,&H00FFFFFF,&H00101010,&H00000000,\
             -1,0,0,0,100,100,0,0,1,3,1,2,60,60,120,1\n"
        }
        // Plain text, subdued upcoming words
        CaptionStyle::Minimal => {
            "Style: Caption,Arial,56,&H00FFFFFF,&H00AAAAAA,&H00303030,&H00000000,\
             0,0,0,0,100,100,0,0,1,2,0,2,60,60,120,1\n"
        }
    }
}

/// Karaoke event text: each word carries a `\k` tag with its duration in
/// centiseconds; leading silence within the cue becomes a silent tag.
fn karaoke_text(cue: &CaptionCue) -> String {
    let mut text = String::new();
    let mut cursor = cue.start;
    for (i, word) in cue.words.iter().enumerate() {
        let gap_cs = ((word.start - cursor).max(0.0) * 100.0).round() as u64;
        if gap_cs > 0 {
            text.push_str(&format!("{{\\k{gap_cs}}}"));
        }
        let word_cs = ((word.end - word.start).max(0.01) * 100.0).round() as u64;
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&format!("{{\\k{word_cs}}}{}", escape_ass(&word.word)));
        cursor = word.end;
    }
    text
}

fn escape_ass(word: &str) -> String {
    word.replace('{', "(").replace('}', ")")
}

/// `h:mm:ss.cc` as ASS expects.
fn format_ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let s = (total_cs / 100) % 60;
    let m = (total_cs / 6000) % 60;
    let h = total_cs / 360_000;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

/// Burn an ASS subtitle file into a clip.
pub async fn burn_captions(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    ass_path: impl AsRef<Path>,
    timeout: Duration,
) -> MediaResult<()> {
    // The ass filter parses its argument itself; escape the quote-
    // sensitive characters in the path.
    let ass = ass_path
        .as_ref()
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'");

    FfmpegCommand::new(input, output)
        .video_filter(format!("ass='{ass}'"))
        .output_args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "18"])
        .output_args(["-c:a", "copy"])
        .run(Some(timeout))
        .await
}
