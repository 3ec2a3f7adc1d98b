use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::captions::MalformedCuePolicy;

const LOCAL_CONFIG: &str = "debates.config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input and output locations
    pub paths: PathsConfig,

    /// External programs
    pub tools: ToolsConfig,

    /// whisperx settings
    pub transcription: TranscriptionConfig,

    /// Caption conversion settings
    #[serde(default)]
    pub captions: CaptionsConfig,

    /// Video segmenting and playlist publishing
    pub video: VideoConfig,

    /// Cloud storage remote
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// YAML list of debates to process
    pub input: PathBuf,

    /// Root directory for per-debate artifacts
    pub output_root: PathBuf,

    /// Aggregate summary of all processed debates
    pub master_json: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub whisperx: String,
    pub rclone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// whisperx model name
    pub model: String,

    /// Spoken language of the debates
    pub language: String,

    /// Enable speaker diarization
    pub diarize: bool,

    pub min_speakers: u8,

    pub max_speakers: u8,

    /// CTranslate2 compute type
    pub compute_type: String,

    /// Hugging Face token for the diarization model. Usually supplied
    /// through `HF_TOKEN` rather than stored here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hf_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptionsConfig {
    /// What to do with cues that carry no speaker label
    pub on_malformed: MalformedCuePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Cut, upload and publish the video as an HLS playlist
    pub enabled: bool,

    /// Target length of each MPEG-TS segment in seconds
    pub segment_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// rclone remote name (also the rclone config section holding Drive credentials)
    pub remote: String,

    /// Folder on the remote that holds one sub-folder per debate
    pub root_folder: String,

    /// Prefix prepended to the URL-encoded direct link, e.g. a CORS proxy
    pub direct_link_proxy: Option<String>,

    /// Share each debate folder publicly through the Drive API after upload
    pub share_folder: bool,

    /// rclone config file; rclone's default location when unset
    pub rclone_config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                input: PathBuf::from("debates.yaml"),
                output_root: PathBuf::from("public/debates"),
                master_json: PathBuf::from("src/debates.json"),
            },
            tools: ToolsConfig {
                ffmpeg: "ffmpeg".to_string(),
                ffprobe: "ffprobe".to_string(),
                whisperx: "whisperx".to_string(),
                rclone: "rclone".to_string(),
            },
            transcription: TranscriptionConfig {
                model: "large-v2".to_string(),
                language: "pt".to_string(),
                diarize: true,
                min_speakers: 2,
                max_speakers: 4,
                compute_type: "int8".to_string(),
                hf_token: None,
            },
            captions: CaptionsConfig::default(),
            video: VideoConfig {
                enabled: false,
                segment_seconds: 10,
            },
            storage: StorageConfig {
                remote: "debates".to_string(),
                root_folder: "debates2024".to_string(),
                direct_link_proxy: None,
                share_folder: false,
                rclone_config: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or from the default
    /// locations (creating a default file on first use)
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            Ok(config)
        }
    }

    /// Read and validate a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("debate-scribe").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let t = &self.transcription;
        if t.min_speakers > t.max_speakers {
            anyhow::bail!(
                "transcription.min_speakers ({}) exceeds max_speakers ({})",
                t.min_speakers,
                t.max_speakers
            );
        }

        if self.video.segment_seconds == 0 {
            anyhow::bail!("video.segment_seconds must be positive");
        }

        if self.video.enabled && self.storage.remote.trim().is_empty() {
            anyhow::bail!("storage.remote must be configured to publish video");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Input: {}", self.paths.input.display());
        println!("  Output root: {}", self.paths.output_root.display());
        println!("  Master JSON: {}", self.paths.master_json.display());
        println!(
            "  Whisperx: model {} ({}), speakers {}-{}",
            self.transcription.model,
            self.transcription.language,
            self.transcription.min_speakers,
            self.transcription.max_speakers
        );
        println!(
            "  HF token: {}",
            if self.transcription.hf_token.is_some() { "set" } else { "not set" }
        );
        println!("  Malformed cues: {:?}", self.captions.on_malformed);
        println!("  Video publishing: {}", self.video.enabled);
        println!(
            "  Remote: {}:{}",
            self.storage.remote, self.storage.root_folder
        );
        if let Some(proxy) = &self.storage.direct_link_proxy {
            println!("  Direct link proxy: {}", proxy);
        }
    }
}
