//! ffmpeg/ffprobe wrappers: audio download, video segmenting and segment probing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::extractors::StreamInfo;
use crate::playlist::{is_segment_of, padding_width, segment_file_name, DurationProbe};
use crate::utils::{run_tool, spinner};

/// Drives ffmpeg against a debate stream
pub struct Ffmpeg {
    binary: String,
    show_progress: bool,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<String>, show_progress: bool) -> Self {
        Self {
            binary: binary.into(),
            show_progress,
        }
    }

    /// Input arguments, including the request headers the stream host needs
    fn input_args(stream: &StreamInfo) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(headers) = stream.ffmpeg_headers() {
            args.push("-headers".into());
            args.push(headers.into());
        }
        args.push("-i".into());
        args.push(stream.m3u8_url.clone().into());
        args
    }

    /// Full argument list for an mp3 audio download
    pub fn audio_args(stream: &StreamInfo, output: &Path) -> Vec<OsString> {
        let mut args = Self::input_args(stream);
        for arg in ["-vn", "-acodec", "libmp3lame", "-q:a", "0"] {
            args.push(arg.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Full argument list for cutting the stream into MPEG-TS segments
    pub fn segment_args(stream: &StreamInfo, pattern: &Path, segment_seconds: u32) -> Vec<OsString> {
        let mut args = Self::input_args(stream);
        for arg in ["-map", "0", "-c", "copy", "-f", "segment", "-segment_format", "mpegts"] {
            args.push(arg.into());
        }
        args.push("-segment_time".into());
        args.push(segment_seconds.to_string().into());
        args.push(pattern.as_os_str().to_owned());
        args
    }

    /// Download the stream's audio as mp3. Returns `false` when the file
    /// already exists and nothing was done.
    pub async fn download_audio(&self, stream: &StreamInfo, output: &Path) -> Result<bool> {
        if output.exists() {
            tracing::debug!("Audio already present: {}", output.display());
            return Ok(false);
        }

        if let Some(parent) = output.parent() {
            fs_err::create_dir_all(parent)?;
        }

        tracing::info!("Downloading audio to: {}", output.display());
        let progress = spinner("Downloading audio with ffmpeg...", self.show_progress);

        run_tool(&self.binary, Self::audio_args(stream, output))
            .await
            .context("Failed to download audio")?;

        progress.finish_with_message("Download complete");
        Ok(true)
    }

    /// Cut the stream into `<slug>_segment_<n>.ts` files in `out_dir`, with the
    /// index zero-padded to the width the final count calls for. Returns the
    /// number of segments, doing nothing if segments for `slug` already exist.
    pub async fn segment_video(
        &self,
        stream: &StreamInfo,
        out_dir: &Path,
        slug: &str,
        segment_seconds: u32,
    ) -> Result<usize> {
        let existing = list_local_segments(out_dir, slug)?;
        if !existing.is_empty() {
            tracing::debug!("{} segments already present for {}", existing.len(), slug);
            return Ok(existing.len());
        }

        fs_err::create_dir_all(out_dir)?;

        // ffmpeg cannot know the final padding width up front, so segments are
        // written unpadded to a staging dir and renamed once counted
        let staging = TempDir::new_in(out_dir).context("Failed to create staging directory")?;
        let pattern = staging.path().join(format!("{}_segment_%d.ts", slug));

        tracing::info!("Segmenting video for {} ({}s segments)", slug, segment_seconds);
        let progress = spinner("Segmenting video with ffmpeg...", self.show_progress);

        run_tool(&self.binary, Self::segment_args(stream, &pattern, segment_seconds))
            .await
            .context("Failed to segment video")?;

        let count = list_local_segments(staging.path(), slug)?.len();
        let width = padding_width(count);
        for index in 0..count {
            let from = staging.path().join(segment_file_name(slug, index, 1));
            let to = out_dir.join(segment_file_name(slug, index, width));
            fs_err::rename(&from, &to)?;
        }

        progress.finish_with_message(format!("{} segments written", count));
        Ok(count)
    }
}

/// Segment files of `slug` in `dir`, sorted by name
pub fn list_local_segments(dir: &Path, slug: &str) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_segment = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| is_segment_of(slug, n))
            .unwrap_or(false);
        if is_segment && path.is_file() {
            segments.push(path);
        }
    }

    segments.sort();
    Ok(segments)
}

/// Parse ffprobe's bare `format=duration` output
pub fn parse_duration_output(stdout: &str) -> Result<f64> {
    let trimmed = stdout.trim();
    trimmed
        .parse::<f64>()
        .with_context(|| format!("Unexpected ffprobe duration output: {:?}", trimmed))
}

/// Reads segment durations with ffprobe
pub struct FfprobeProbe {
    binary: String,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn duration(&self, segment: &Path) -> Result<f64> {
        if !segment.is_file() {
            anyhow::bail!("Segment not found locally: {}", segment.display());
        }

        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(segment.as_os_str().to_owned());

        let output = run_tool(&self.binary, args).await?;
        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stream(headers: bool) -> StreamInfo {
        StreamInfo {
            m3u8_url: "https://vod.example/master.m3u8".to_string(),
            thumbnail_url: String::new(),
            headers: headers.then(|| {
                let mut h = BTreeMap::new();
                h.insert("Referer".to_string(), "https://www.rtp.pt/".to_string());
                h
            }),
        }
    }

    #[test]
    fn test_audio_args() {
        let args = Ffmpeg::audio_args(&stream(false), Path::new("out/a.mp3"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "-i",
                "https://vod.example/master.m3u8",
                "-vn",
                "-acodec",
                "libmp3lame",
                "-q:a",
                "0",
                "out/a.mp3"
            ]
        );
    }

    #[test]
    fn test_headers_precede_input() {
        let args = Ffmpeg::segment_args(&stream(true), Path::new("s_segment_%d.ts"), 10);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-headers");
        assert_eq!(args[1], "Referer: https://www.rtp.pt/\r\n");
        assert_eq!(args[2], "-i");
        assert!(args.windows(2).any(|w| w[0] == "-segment_time" && w[1] == "10"));
        assert_eq!(args.last().map(String::as_str), Some("s_segment_%d.ts"));
    }

    #[test]
    fn test_list_local_segments() {
        let dir = TempDir::new().unwrap();
        for name in ["d_segment_1.ts", "d_segment_0.ts", "d.m3u8", "other_segment_0.ts"] {
            fs_err::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = list_local_segments(dir.path(), "d")
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["d_segment_0.ts", "d_segment_1.ts"]);
        assert!(list_local_segments(&dir.path().join("missing"), "d").unwrap().is_empty());
    }

    #[test]
    fn test_parse_duration_output() {
        assert_eq!(parse_duration_output("10.010000\n").unwrap(), 10.01);
        assert!(parse_duration_output("N/A\n").is_err());
    }

    #[tokio::test]
    async fn test_download_audio_skips_existing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("a.mp3");
        fs_err::write(&output, b"mp3").unwrap();

        let ffmpeg = Ffmpeg::new("definitely-not-ffmpeg", false);
        assert!(!ffmpeg.download_audio(&stream(false), &output).await.unwrap());
    }

    #[tokio::test]
    async fn test_probe_requires_local_segment() {
        let probe = FfprobeProbe::new("ffprobe");
        assert!(probe.duration(Path::new("/nonexistent/x_segment_0.ts")).await.is_err());
    }
}
