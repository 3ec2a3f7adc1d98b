//! WebVTT captions and their conversion into speaker-attributed transcripts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod normalizer;
pub mod parser;

pub use normalizer::{MalformedCuePolicy, Normalizer};
pub use parser::{parse_timestamp, parse_vtt};

/// A single timed caption unit as read from a WebVTT file
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Time the cue is shown
    pub start: Duration,

    /// Time the cue is hidden
    pub end: Duration,

    /// Payload lines in file order
    pub lines: Vec<String>,
}

impl Cue {
    pub fn new(start: Duration, end: Duration, lines: Vec<String>) -> Self {
        Self { start, end, lines }
    }
}

/// One line of a debate transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Offset of the cue start, in seconds
    pub time: f64,

    /// Speaker label, e.g. `[SPEAKER_00]`
    pub speaker: String,

    /// What was said
    pub text: String,
}
