//! FFmpeg-based media operations.
//!
//! This crate provides the mechanical half of the pipeline:
//! - FFmpeg command building and execution with timeouts
//! - Container probing (FFprobe)
//! - ASR audio extraction (mono 16 kHz WAV)
//! - GOP-preserving sub-clip cuts
//! - Aspect-ratio reframing with a letterbox fallback
//! - Karaoke caption generation (ASS) and burn-in
//! - Final encoding per quality preset
//!
//! Stage orchestration, deadlines and progress live in the worker crate.

pub mod audio;
pub mod captions;
pub mod command;
pub mod cut;
pub mod encode;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod reframe;

pub use audio::extract_asr_audio;
pub use captions::{build_cues, burn_captions, render_ass, CaptionCue};
pub use command::FfmpegCommand;
pub use cut::cut_segment;
pub use encode::finalize_encode;
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use probe::{probe_media, MediaInfo};
pub use reframe::{plan_reframe, reframe_clip, ReframePlan, MAX_HORIZONTAL_LOSS};
