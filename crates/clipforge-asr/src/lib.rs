//! Client for the external ASR (speech-to-text) dependency.
//!
//! The transcribe stage sends a mono 16 kHz WAV and receives segments
//! with word-level timings. An empty segment list means no speech was
//! detected; that is not an error.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AsrClient, AsrClientConfig};
pub use error::{AsrError, AsrResult};
pub use types::{AsrSegment, AsrWord, HealthResponse, TranscribeResponse};
