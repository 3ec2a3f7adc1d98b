use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::extractors::{ExtractorRegistry, StreamInfo};
use crate::media::{Ffmpeg, FfprobeProbe};
use crate::output::{self, DebateDescriptor, DebateSummary};
use crate::playlist::{ensure_segments_present, Playlist, PlaylistAssembler};
use crate::storage::{self, DriveCredentials, GoogleDrive, RcloneRemote};
use crate::transcribe::{self, WhisperxTranscriber};
use crate::utils::{extract_domain, format_duration, slugify};
use crate::DebateError;

/// One debate in the input list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateRecord {
    pub title: String,
    pub url: String,
}

impl DebateRecord {
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Read the YAML list of debates
pub fn load_records(path: &Path) -> Result<Vec<DebateRecord>> {
    let content = fs_err::read_to_string(path)?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse debate list {}", path.display()))
}

/// Run-wide switches taken from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Re-process debates that already have a descriptor
    pub force: bool,

    /// Log per-debate failures and continue with the next debate
    pub keep_going: bool,

    pub show_progress: bool,
}

/// Main debate processing pipeline
pub struct DebatePipeline {
    config: Config,
    options: PipelineOptions,
    registry: ExtractorRegistry,
    ffmpeg: Ffmpeg,
    transcriber: WhisperxTranscriber,
    remote: RcloneRemote,
    probe: FfprobeProbe,
}

impl DebatePipeline {
    pub fn new(config: Config, options: PipelineOptions) -> Self {
        let tools = &config.tools;
        let show = options.show_progress;

        Self {
            registry: ExtractorRegistry::new(),
            ffmpeg: Ffmpeg::new(&tools.ffmpeg, show),
            transcriber: WhisperxTranscriber::new(&tools.whisperx, config.transcription.clone(), show),
            remote: RcloneRemote::new(&tools.rclone, &config.storage, show),
            probe: FfprobeProbe::new(&tools.ffprobe),
            config,
            options,
        }
    }

    fn root(&self) -> &Path {
        &self.config.paths.output_root
    }

    pub fn descriptor_path(&self, slug: &str) -> PathBuf {
        self.root().join(format!("{}.json", slug))
    }

    pub fn audio_path(&self, slug: &str) -> PathBuf {
        self.root().join("audio").join(format!("{}.mp3", slug))
    }

    pub fn transcriptions_dir(&self) -> PathBuf {
        self.root().join("transcriptions")
    }

    pub fn segments_dir(&self, slug: &str) -> PathBuf {
        self.root().join("segments").join(slug)
    }

    pub fn playlist_path(&self, slug: &str) -> PathBuf {
        self.root().join(format!("{}.m3u8", slug))
    }

    /// Process every debate in order and write the master summary
    pub async fn process_all(&self, records: &[DebateRecord]) -> Result<Vec<DebateSummary>> {
        fs_err::create_dir_all(self.root())?;

        let mut summaries = Vec::new();
        for (i, record) in records.iter().enumerate() {
            tracing::info!("[{}/{}] {}", i + 1, records.len(), record.title);

            match self.process_debate(record).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) if self.options.keep_going => {
                    tracing::error!("Failed to process {}: {:#}", record.title, e);
                }
                Err(e) => {
                    return Err(e.context(format!("Failed to process {}", record.title)));
                }
            }
        }

        output::write_json(&self.config.paths.master_json, &summaries)?;
        tracing::info!(
            "Wrote {} debates to {}",
            summaries.len(),
            self.config.paths.master_json.display()
        );

        Ok(summaries)
    }

    /// Process one debate. Returns `None` when its site is not supported.
    pub async fn process_debate(&self, record: &DebateRecord) -> Result<Option<DebateSummary>> {
        let slug = record.slug();
        let descriptor_path = self.descriptor_path(&slug);

        if descriptor_path.exists() && !self.options.force {
            tracing::info!("Already processed, reusing {}", descriptor_path.display());
            let descriptor: DebateDescriptor = output::read_json(&descriptor_path)?;
            return Ok(Some(descriptor.summary()));
        }

        let stream = match self.registry.extract(&record.url).await {
            Ok(stream) => stream,
            Err(e) => match e.downcast_ref::<DebateError>() {
                Some(DebateError::UnsupportedSite(_)) => {
                    tracing::warn!(
                        "No extractor for {} ({}), skipping",
                        extract_domain(&record.url).unwrap_or_else(|| "unknown site".to_string()),
                        record.url
                    );
                    return Ok(None);
                }
                _ => return Err(e),
            },
        };

        let audio = self.audio_path(&slug);
        self.ffmpeg.download_audio(&stream, &audio).await?;

        let transcriptions = self.transcriptions_dir();
        let vtt = self.transcriber.transcribe(&audio, &transcriptions).await?;
        let transcript = transcriptions.join(format!("{}.json", slug));
        transcribe::convert_captions(&vtt, &transcript, self.config.captions.on_malformed)?;

        let mut descriptor = DebateDescriptor::new(
            &slug,
            &record.title,
            &record.url,
            &stream,
            relative_to(&transcript, self.root()),
        );

        if self.config.video.enabled {
            let playlist = self.publish_video(&slug, &stream).await?;
            descriptor.playlist = Some(relative_to(&playlist, self.root()));
        }

        output::write_json(&descriptor_path, &descriptor)?;
        Ok(Some(descriptor.summary()))
    }

    /// Segment, upload and publish the video of a debate. Returns the playlist path.
    async fn publish_video(&self, slug: &str, stream: &StreamInfo) -> Result<PathBuf> {
        let segments_dir = self.segments_dir(slug);
        let count = self
            .ffmpeg
            .segment_video(stream, &segments_dir, slug, self.config.video.segment_seconds)
            .await?;
        tracing::info!("{} has {} segments", slug, count);

        self.remote.mkdir(slug).await?;
        self.remote.upload_segments(&segments_dir, slug).await?;

        if self.config.storage.share_folder {
            self.share_folder(slug).await?;
        }

        let playlist = self.build_playlist(slug, &segments_dir).await?;
        let path = self.playlist_path(slug);
        output::write_text(&path, &playlist.render())?;
        tracing::info!("Wrote playlist {}", path.display());

        Ok(path)
    }

    /// List the remote segments of `slug`, fetch any missing locally, then
    /// assemble the playlist
    pub async fn build_playlist(&self, slug: &str, segments_dir: &Path) -> Result<Playlist> {
        let remote_ids = self.remote.list_files(slug).await?;

        let fetched = ensure_segments_present(slug, &remote_ids, segments_dir, &self.remote).await?;
        if fetched > 0 {
            tracing::info!("Fetched {} missing segments of {}", fetched, slug);
        }

        let proxy = self.config.storage.direct_link_proxy.as_deref();
        let assembler = PlaylistAssembler::new(&self.probe, |id: &str| storage::direct_link(id, proxy));
        let playlist = assembler.assemble(slug, &remote_ids, segments_dir).await?;

        let total: f64 = playlist.entries.iter().map(|e| e.duration).sum();
        tracing::info!(
            "Playlist for {} has {} segments covering {}",
            slug,
            playlist.entries.len(),
            format_duration(total)
        );
        Ok(playlist)
    }

    async fn share_folder(&self, slug: &str) -> Result<()> {
        let config_path = match &self.config.storage.rclone_config {
            Some(path) => path.clone(),
            None => storage::credentials::default_rclone_config()?,
        };
        let content = fs_err::read_to_string(&config_path)?;
        let credentials = DriveCredentials::from_rclone_config(&content, &self.config.storage.remote)?;

        GoogleDrive::new(credentials).share_folder(slug).await
    }
}

/// `path` relative to `root` when it lies inside it
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pipeline(root: &Path, options: PipelineOptions) -> DebatePipeline {
        let mut config = Config::default();
        config.paths.output_root = root.to_path_buf();
        config.paths.master_json = root.join("master.json");
        DebatePipeline::new(config, options)
    }

    #[test]
    fn test_load_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("debates.yaml");
        fs_err::write(
            &path,
            "- title: Montenegro vs Pedro Nuno Santos\n  url: https://sicnoticias.pt/debate-1\n\
             - title: Ventura vs Raimundo\n  url: https://www.rtp.pt/play/p12900/e746061/debate\n",
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].slug(), "montenegro-vs-pedro-nuno-santos");
        assert_eq!(records[1].url, "https://www.rtp.pt/play/p12900/e746061/debate");
    }

    #[test]
    fn test_artifact_paths() {
        let p = pipeline(Path::new("out"), PipelineOptions::default());
        assert_eq!(p.descriptor_path("a-b"), PathBuf::from("out/a-b.json"));
        assert_eq!(p.audio_path("a-b"), PathBuf::from("out/audio/a-b.mp3"));
        assert_eq!(p.segments_dir("a-b"), PathBuf::from("out/segments/a-b"));
        assert_eq!(p.playlist_path("a-b"), PathBuf::from("out/a-b.m3u8"));
        assert_eq!(
            relative_to(Path::new("out/transcriptions/a-b.json"), Path::new("out")),
            PathBuf::from("transcriptions/a-b.json")
        );
    }

    #[tokio::test]
    async fn test_unsupported_sites_are_skipped() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(dir.path(), PipelineOptions::default());

        let records = vec![DebateRecord {
            title: "Debate Local".to_string(),
            url: "https://example.com/debate".to_string(),
        }];
        let summaries = p.process_all(&records).await.unwrap();

        assert!(summaries.is_empty());
        let master: Vec<DebateSummary> = output::read_json(&dir.path().join("master.json")).unwrap();
        assert!(master.is_empty());
    }

    #[tokio::test]
    async fn test_existing_descriptor_is_reused() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(dir.path(), PipelineOptions::default());

        let record = DebateRecord {
            title: "Debate Final".to_string(),
            url: "https://example.com/unreachable".to_string(),
        };
        let stream = StreamInfo {
            m3u8_url: "https://vod.example/master.m3u8".to_string(),
            thumbnail_url: "https://img.example/final.jpg".to_string(),
            headers: None,
        };
        let descriptor = DebateDescriptor::new(
            "debate-final",
            &record.title,
            &record.url,
            &stream,
            PathBuf::from("transcriptions/debate-final.json"),
        );
        output::write_json(&p.descriptor_path("debate-final"), &descriptor).unwrap();

        let summaries = p.process_all(&[record]).await.unwrap();
        assert_eq!(summaries, vec![descriptor.summary()]);
    }

    #[tokio::test]
    async fn test_failure_aborts_unless_keep_going() {
        let dir = TempDir::new().unwrap();
        // A corrupt descriptor makes the debate fail without touching the network
        fs_err::write(dir.path().join("broken.json"), "{").unwrap();
        let records = vec![DebateRecord {
            title: "Broken".to_string(),
            url: "https://sicnoticias.pt/x".to_string(),
        }];

        let strict = pipeline(dir.path(), PipelineOptions::default());
        assert!(strict.process_all(&records).await.is_err());
        assert!(!dir.path().join("master.json").exists());

        let lenient = pipeline(
            dir.path(),
            PipelineOptions {
                keep_going: true,
                ..PipelineOptions::default()
            },
        );
        assert!(lenient.process_all(&records).await.unwrap().is_empty());
        assert!(dir.path().join("master.json").exists());
    }
}
