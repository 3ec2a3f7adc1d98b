use serde::{Deserialize, Serialize};

use super::{Cue, TranscriptEntry};
use crate::DebateError;

/// Inline markup used by auto-generated captions for interim word-by-word fragments
const INTERIM_MARKER: &str = "<c>";

/// What to do with a cue that has no `speaker: text` separator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedCuePolicy {
    /// Fail the whole conversion
    #[default]
    Abort,
    /// Log the cue and leave it out of the transcript
    Skip,
}

/// Turns caption cues into a deduplicated, speaker-attributed transcript
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    policy: MalformedCuePolicy,
}

impl Normalizer {
    pub fn new(policy: MalformedCuePolicy) -> Self {
        Self { policy }
    }

    /// Normalize a complete cue sequence. Output order follows input order.
    pub fn normalize(&self, cues: &[Cue]) -> Result<Vec<TranscriptEntry>, DebateError> {
        let mut entries = Vec::new();
        let mut prev_line: Option<&str> = None;

        for cue in cues {
            if cue.lines.iter().any(|l| l.contains(INTERIM_MARKER)) {
                continue;
            }

            let mut kept = Vec::new();
            for line in &cue.lines {
                if line.trim().is_empty() {
                    continue;
                }
                if prev_line != Some(line.as_str()) {
                    kept.push(line.as_str());
                }
                prev_line = Some(line.as_str());
            }

            if kept.is_empty() {
                continue;
            }

            let joined = kept.join("\n");
            match split_speaker(&joined) {
                Some((speaker, text)) => entries.push(TranscriptEntry {
                    time: cue.start.as_secs_f64(),
                    speaker: speaker.to_string(),
                    text: text.to_string(),
                }),
                None => {
                    let start = cue.start.as_secs_f64();
                    match self.policy {
                        MalformedCuePolicy::Abort => {
                            return Err(DebateError::MalformedCue {
                                start,
                                line: joined,
                            })
                        }
                        MalformedCuePolicy::Skip => {
                            tracing::warn!(start, line = %joined, "Skipping caption cue without speaker");
                        }
                    }
                }
            }
        }

        Ok(entries)
    }
}

fn split_speaker(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(speaker, text)| (speaker.trim(), text.trim()))
}
