use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod credentials;
pub mod drive;

pub use credentials::DriveCredentials;
pub use drive::GoogleDrive;

use crate::config::StorageConfig;
use crate::playlist::SegmentSource;
use crate::utils::{run_tool, spinner};

const DRIVE_DOWNLOAD_URL: &str = "https://drive.google.com/uc?id=";

/// Direct download link of a Drive file, optionally routed through a proxy
/// prefix (the proxy receives the URL-encoded Drive link)
pub fn direct_link(file_id: &str, proxy: Option<&str>) -> String {
    let url = format!("{}{}", DRIVE_DOWNLOAD_URL, file_id);
    match proxy {
        Some(prefix) => format!("{}{}", prefix, urlencoding::encode(&url)),
        None => url,
    }
}

/// One `rclone lsjson` record
#[derive(Debug, Deserialize)]
struct LsJsonEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ID")]
    id: Option<String>,
}

/// Map file name to remote id from `rclone lsjson` output
pub fn parse_lsjson(json: &str) -> Result<HashMap<String, String>> {
    let entries: Vec<LsJsonEntry> =
        serde_json::from_str(json).context("Failed to parse rclone lsjson output")?;

    Ok(entries
        .into_iter()
        .filter_map(|e| e.id.map(|id| (e.name.trim().to_string(), id.trim().to_string())))
        .collect())
}

/// Debate folders on an rclone remote, one sub-folder per slug
pub struct RcloneRemote {
    binary: String,
    remote: String,
    root_folder: String,
    config_file: Option<PathBuf>,
    show_progress: bool,
}

impl RcloneRemote {
    pub fn new(binary: impl Into<String>, storage: &StorageConfig, show_progress: bool) -> Self {
        Self {
            binary: binary.into(),
            remote: storage.remote.clone(),
            root_folder: storage.root_folder.clone(),
            config_file: storage.rclone_config.clone(),
            show_progress,
        }
    }

    /// Folder path relative to the remote root, e.g. `debates2024/<slug>`
    pub fn folder_path(&self, slug: &str) -> String {
        format!("{}/{}", self.root_folder, slug)
    }

    /// Full rclone location, e.g. `debates:debates2024/<slug>`
    pub fn location(&self, slug: &str) -> String {
        format!("{}:{}", self.remote, self.folder_path(slug))
    }

    fn args<I, S>(&self, args: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut all: Vec<OsString> = Vec::new();
        if let Some(config) = &self.config_file {
            all.push("--config".into());
            all.push(config.as_os_str().to_owned());
        }
        all.extend(args.into_iter().map(Into::into));
        all
    }

    /// Create the debate folder
    pub async fn mkdir(&self, slug: &str) -> Result<()> {
        run_tool(&self.binary, self.args(["mkdir".to_string(), self.location(slug)]))
            .await
            .context("Failed to create remote folder")?;
        Ok(())
    }

    /// Copy the local segments of `slug` to its folder, skipping files already uploaded
    pub async fn upload_segments(&self, local_dir: &Path, slug: &str) -> Result<()> {
        tracing::info!("Uploading segments of {} to {}", slug, self.location(slug));
        let progress = spinner("Uploading segments with rclone...", self.show_progress);

        let args: Vec<OsString> = vec![
            "copy".into(),
            "--check-first".into(),
            local_dir.as_os_str().to_owned(),
            "--include".into(),
            format!("{}_segment_*.ts", slug).into(),
            "--ignore-existing".into(),
            self.location(slug).into(),
        ];
        run_tool(&self.binary, self.args(args))
            .await
            .context("Failed to upload segments")?;

        progress.finish_with_message("Upload complete");
        Ok(())
    }

    /// Names and remote ids of the files in the debate folder
    pub async fn list_files(&self, slug: &str) -> Result<HashMap<String, String>> {
        let output = run_tool(
            &self.binary,
            self.args(["lsjson".to_string(), self.location(slug), "--files-only".to_string()]),
        )
        .await
        .context("Failed to list remote folder")?;

        parse_lsjson(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl SegmentSource for RcloneRemote {
    async fn fetch_segment(&self, slug: &str, name: &str, dest: &Path) -> Result<()> {
        let source = format!("{}/{}", self.location(slug), name);
        let args: Vec<OsString> = vec!["copyto".into(), source.into(), dest.as_os_str().to_owned()];
        run_tool(&self.binary, self.args(args)).await?;
        Ok(())
    }
}
