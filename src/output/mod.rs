use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::extractors::StreamInfo;

/// Per-debate JSON descriptor written next to the debate's artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateDescriptor {
    pub slug: String,
    pub title: String,
    pub original_url: String,
    pub m3u8_url: String,
    pub thumbnail_url: String,
    pub headers: Option<BTreeMap<String, String>>,

    /// Playlist of the published segments, relative to the output root
    pub playlist: Option<PathBuf>,

    /// Transcript JSON, relative to the output root
    pub transcript: PathBuf,

    pub processed_at: chrono::DateTime<chrono::Utc>,
}

impl DebateDescriptor {
    pub fn new(slug: &str, title: &str, url: &str, stream: &StreamInfo, transcript: PathBuf) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            original_url: url.to_string(),
            m3u8_url: stream.m3u8_url.clone(),
            thumbnail_url: stream.thumbnail_url.clone(),
            headers: stream.headers.clone(),
            playlist: None,
            transcript,
            processed_at: chrono::Utc::now(),
        }
    }

    pub fn summary(&self) -> DebateSummary {
        DebateSummary {
            title: self.title.clone(),
            thumbnail: self.thumbnail_url.clone(),
            slug: self.slug.clone(),
        }
    }
}

/// Entry of the master debate list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSummary {
    pub title: String,
    pub thumbnail: String,
    pub slug: String,
}

/// Write `value` as pretty-printed JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(value)
        .context("Failed to serialize JSON")?;
    fs_err::write(path, content + "\n")?;

    Ok(())
}

/// Read a JSON file written by [`write_json`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs_err::read_to_string(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Save a text artifact such as a playlist
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    fs_err::write(path, content)?;
    Ok(())
}
