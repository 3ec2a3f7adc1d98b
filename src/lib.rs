//! Debate Scribe - A Rust CLI pipeline for Portuguese political-debate broadcasts
//!
//! This library finds the HLS stream behind a debate page (SIC Notícias, RTP Play),
//! pulls its audio with ffmpeg, transcribes it with whisperx, turns the resulting
//! WebVTT captions into a speaker-attributed JSON transcript, and can publish the
//! video as an HLS playlist of segments stored on an rclone remote.

pub mod captions;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod playlist;
pub mod storage;
pub mod transcribe;
pub mod utils;

pub use captions::{Cue, MalformedCuePolicy, Normalizer, TranscriptEntry};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{ExtractorRegistry, StreamExtractor, StreamInfo};
pub use pipeline::{DebatePipeline, DebateRecord};
pub use playlist::{Playlist, PlaylistAssembler};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the debate pipeline
#[derive(thiserror::Error, Debug)]
pub enum DebateError {
    #[error("Malformed caption cue at {start:.3}s (no speaker separator): {line:?}")]
    MalformedCue { start: f64, line: String },

    #[error("Missing remote reference for segment: {0}")]
    MissingSegment(String),

    #[error("Invalid caption file: {0}")]
    InvalidCaptions(String),

    #[error("Invalid caption timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("Unsupported debate site: {0}")]
    UnsupportedSite(String),

    #[error("Stream extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Credentials error: {0}")]
    Credentials(String),
}
