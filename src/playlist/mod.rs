//! HLS playlist assembly for segments stored on a remote
//!
//! Publishing happens in two explicit phases:
//! 1. [`ensure_segments_present`] makes sure every expected segment exists locally,
//!    fetching the missing ones from a [`SegmentSource`].
//! 2. [`PlaylistAssembler::assemble`] probes each local segment for its duration and
//!    writes one entry per segment pointing at its direct link.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::{DebateError, Result};

/// Declared `#EXT-X-TARGETDURATION` when every segment fits under it
pub const TARGET_DURATION: u64 = 20;

const HLS_VERSION: u32 = 3;

/// Width of the zero-padded segment index for a given segment count
pub fn padding_width(count: usize) -> usize {
    if count < 10 {
        1
    } else if count < 100 {
        2
    } else {
        3
    }
}

/// File name of segment `index` for `slug`, e.g. `debate_segment_07.ts`
pub fn segment_file_name(slug: &str, index: usize, width: usize) -> String {
    format!("{}_segment_{:0width$}.ts", slug, index, width = width)
}

/// Whether `name` follows the segment naming scheme for `slug`
pub fn is_segment_of(slug: &str, name: &str) -> bool {
    name.strip_prefix(slug)
        .and_then(|rest| rest.strip_prefix("_segment_"))
        .and_then(|rest| rest.strip_suffix(".ts"))
        .map(|index| !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Number of segments of `slug` among `names`
pub fn count_segments<'a>(slug: &str, names: impl IntoIterator<Item = &'a String>) -> usize {
    names.into_iter().filter(|n| is_segment_of(slug, n)).count()
}

/// Resolves the playback duration of a local segment file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds
    async fn duration(&self, segment: &Path) -> Result<f64>;
}

/// Somewhere missing segments can be fetched from
#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Copy segment `name` of `slug` to `dest`
    async fn fetch_segment(&self, slug: &str, name: &str, dest: &Path) -> Result<()>;
}

/// Phase one: fetch every expected segment that is not in `local_dir` yet.
///
/// Returns the number of segments fetched.
pub async fn ensure_segments_present(
    slug: &str,
    remote_ids: &HashMap<String, String>,
    local_dir: &Path,
    source: &dyn SegmentSource,
) -> Result<usize> {
    let count = count_segments(slug, remote_ids.keys());
    let width = padding_width(count);
    let mut fetched = 0;

    fs_err::create_dir_all(local_dir)?;

    for index in 0..count {
        let name = segment_file_name(slug, index, width);
        let dest = local_dir.join(&name);
        if dest.exists() {
            continue;
        }

        tracing::info!("Fetching missing segment {}", name);
        source
            .fetch_segment(slug, &name, &dest)
            .await
            .with_context(|| format!("Failed to fetch segment {}", name))?;
        fetched += 1;
    }

    Ok(fetched)
}

/// One `#EXTINF` entry
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub duration: f64,
    pub uri: String,
}

/// A complete VOD media playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Playlist {
    pub target_duration: u64,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    /// Text form of the playlist
    pub fn render(&self) -> String {
        let mut output = String::new();

        output.push_str("#EXTM3U\n");
        output.push_str(&format!("#EXT-X-VERSION:{}\n", HLS_VERSION));
        output.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", self.target_duration));
        output.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");

        for entry in &self.entries {
            output.push_str(&format!("#EXTINF:{:.3},\n", entry.duration));
            output.push_str(&entry.uri);
            output.push('\n');
        }

        output.push_str("#EXT-X-ENDLIST\n");
        output
    }

    /// Longest entry, in seconds
    pub fn max_duration(&self) -> f64 {
        self.entries.iter().map(|e| e.duration).fold(0.0, f64::max)
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Phase two: builds the playlist from the remote ids and local segment files
pub struct PlaylistAssembler<'a, L> {
    probe: &'a dyn DurationProbe,
    link: L,
}

impl<'a, L> PlaylistAssembler<'a, L>
where
    L: Fn(&str) -> String,
{
    /// `link` turns a remote id into the URL written to the playlist
    pub fn new(probe: &'a dyn DurationProbe, link: L) -> Self {
        Self { probe, link }
    }

    /// Assemble the playlist for `slug`. Nothing is produced if any expected
    /// segment has no remote id.
    pub async fn assemble(
        &self,
        slug: &str,
        remote_ids: &HashMap<String, String>,
        local_dir: &Path,
    ) -> Result<Playlist> {
        let count = count_segments(slug, remote_ids.keys());
        let width = padding_width(count);
        let mut entries = Vec::with_capacity(count);

        for index in 0..count {
            let name = segment_file_name(slug, index, width);
            let remote_id = remote_ids
                .get(&name)
                .ok_or_else(|| DebateError::MissingSegment(name.clone()))?;

            let duration = self
                .probe
                .duration(&local_dir.join(&name))
                .await
                .with_context(|| format!("Failed to probe duration of {}", name))?;

            entries.push(PlaylistEntry {
                duration,
                uri: (self.link)(remote_id.as_str()),
            });
        }

        let mut playlist = Playlist {
            target_duration: TARGET_DURATION,
            entries,
        };

        let longest = playlist.max_duration();
        if longest > TARGET_DURATION as f64 {
            playlist.target_duration = longest.ceil() as u64;
            tracing::warn!(
                "Segment of {:.3}s exceeds target duration {}s, declaring {}s",
                longest,
                TARGET_DURATION,
                playlist.target_duration
            );
        }

        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn remote_ids(slug: &str, count: usize) -> HashMap<String, String> {
        let width = padding_width(count);
        (0..count)
            .map(|i| (segment_file_name(slug, i, width), format!("id{}", i)))
            .collect()
    }

    fn fixed_probe(seconds: f64) -> MockDurationProbe {
        let mut probe = MockDurationProbe::new();
        probe.expect_duration().returning(move |_| Ok(seconds));
        probe
    }

    #[test]
    fn test_padding_width() {
        let widths: Vec<usize> = [5, 10, 99, 100].iter().map(|&c| padding_width(c)).collect();
        assert_eq!(widths, vec![1, 2, 2, 3]);
    }

    #[test]
    fn test_segment_naming() {
        assert_eq!(segment_file_name("debate", 3, 1), "debate_segment_3.ts");
        assert_eq!(segment_file_name("debate", 3, 2), "debate_segment_03.ts");
        assert_eq!(segment_file_name("debate", 42, 3), "debate_segment_042.ts");

        assert!(is_segment_of("a-b", "a-b_segment_07.ts"));
        assert!(!is_segment_of("a-b", "a-b.m3u8"));
        assert!(!is_segment_of("a-b", "a-b-c_segment_07.ts"));
        assert!(!is_segment_of("a-b", "a-b_segment_.ts"));
    }

    #[tokio::test]
    async fn test_twelve_segments() {
        let probe = fixed_probe(10.0);
        let assembler = PlaylistAssembler::new(&probe, |id: &str| format!("https://cdn/{}", id));

        let ids = remote_ids("slug", 12);
        assert!(ids.contains_key("slug_segment_00.ts"));
        assert!(ids.contains_key("slug_segment_11.ts"));

        let playlist = assembler.assemble("slug", &ids, Path::new("/tmp")).await.unwrap();
        let text = playlist.render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            &lines[..4],
            &[
                "#EXTM3U",
                "#EXT-X-VERSION:3",
                "#EXT-X-TARGETDURATION:20",
                "#EXT-X-MEDIA-SEQUENCE:0"
            ]
        );
        assert_eq!(lines.iter().filter(|l| l.starts_with("#EXTINF")).count(), 12);
        assert_eq!(lines.len(), 4 + 12 * 2 + 1);
        assert_eq!(lines[4], "#EXTINF:10.000,");
        assert_eq!(lines[5], "https://cdn/id0");
        assert_eq!(lines[lines.len() - 2], "https://cdn/id11");
        assert_eq!(lines[lines.len() - 1], "#EXT-X-ENDLIST");
    }

    #[tokio::test]
    async fn test_probe_receives_local_segment_paths() {
        let mut probe = MockDurationProbe::new();
        probe
            .expect_duration()
            .withf(|p: &Path| p == Path::new("/data/s/s_segment_1.ts"))
            .times(1)
            .returning(|_| Ok(4.0));
        probe
            .expect_duration()
            .withf(|p: &Path| p == Path::new("/data/s/s_segment_0.ts"))
            .times(1)
            .returning(|_| Ok(9.5));

        let assembler = PlaylistAssembler::new(&probe, |id: &str| id.to_string());
        let playlist = assembler
            .assemble("s", &remote_ids("s", 2), Path::new("/data/s"))
            .await
            .unwrap();

        let durations: Vec<f64> = playlist.entries.iter().map(|e| e.duration).collect();
        assert_eq!(durations, vec![9.5, 4.0]);
    }

    #[tokio::test]
    async fn test_missing_segment_aborts() {
        let probe = fixed_probe(10.0);
        let assembler = PlaylistAssembler::new(&probe, |id: &str| id.to_string());

        let mut ids = remote_ids("slug", 3);
        ids.remove("slug_segment_1.ts");
        ids.insert("slug_segment_7.ts".to_string(), "stray".to_string());

        let err = assembler
            .assemble("slug", &ids, Path::new("/tmp"))
            .await
            .unwrap_err();
        match err.downcast_ref::<DebateError>() {
            Some(DebateError::MissingSegment(name)) => assert_eq!(name, "slug_segment_1.ts"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_remote_gives_empty_playlist() {
        let probe = MockDurationProbe::new();
        let assembler = PlaylistAssembler::new(&probe, |id: &str| id.to_string());
        let playlist = assembler
            .assemble("slug", &HashMap::new(), Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(playlist.render().lines().count(), 5);
    }

    #[tokio::test]
    async fn test_long_segment_raises_target_duration() {
        let mut probe = MockDurationProbe::new();
        let mut durations = vec![10.0, 24.2, 8.0].into_iter();
        probe
            .expect_duration()
            .times(3)
            .returning(move |_| Ok(durations.next().unwrap_or(0.0)));

        let assembler = PlaylistAssembler::new(&probe, |id: &str| id.to_string());
        let playlist = assembler
            .assemble("slug", &remote_ids("slug", 3), Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(playlist.target_duration, 25);
        assert!(playlist.render().contains("#EXT-X-TARGETDURATION:25\n"));
    }

    struct RecordingSource {
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SegmentSource for RecordingSource {
        async fn fetch_segment(&self, _slug: &str, name: &str, dest: &Path) -> Result<()> {
            self.fetched.lock().unwrap().push(name.to_string());
            fs_err::write(dest, b"ts")?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ensure_segments_fetches_only_missing() {
        let dir = TempDir::new().unwrap();
        fs_err::write(dir.path().join("slug_segment_0.ts"), b"ts").unwrap();
        fs_err::write(dir.path().join("slug_segment_2.ts"), b"ts").unwrap();

        let source = RecordingSource {
            fetched: Mutex::new(Vec::new()),
        };
        let fetched = ensure_segments_present("slug", &remote_ids("slug", 4), dir.path(), &source)
            .await
            .unwrap();

        assert_eq!(fetched, 2);
        assert_eq!(
            *source.fetched.lock().unwrap(),
            vec!["slug_segment_1.ts".to_string(), "slug_segment_3.ts".to_string()]
        );
        assert!(dir.path().join("slug_segment_3.ts").exists());
    }
}
