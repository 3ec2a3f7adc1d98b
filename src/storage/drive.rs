use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::DriveCredentials;
use crate::DebateError;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Minimal Google Drive v3 client for sharing uploaded debate folders
pub struct GoogleDrive {
    client: Client,
    credentials: DriveCredentials,
    token_url: String,
    files_url: String,
}

impl GoogleDrive {
    pub fn new(credentials: DriveCredentials) -> Self {
        Self::with_endpoints(credentials, TOKEN_URL, FILES_URL)
    }

    /// Client talking to alternative OAuth and Drive files endpoints
    pub fn with_endpoints(
        credentials: DriveCredentials,
        token_url: impl Into<String>,
        files_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            credentials,
            token_url: token_url.into(),
            files_url: files_url.into(),
        }
    }

    /// Exchange the refresh token for a short-lived access token
    pub async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to reach the Google token endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DebateError::Credentials(format!(
                "token refresh rejected: HTTP {} {}",
                status, body
            ))
            .into());
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Id of the folder called `name`
    pub async fn find_folder(&self, token: &str, name: &str) -> Result<String> {
        let query = folder_query(name);

        let response = self
            .client
            .get(&self.files_url)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Drive folder lookup failed: HTTP {}", response.status());
        }

        let list: FileList = response.json().await?;
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| anyhow::anyhow!("Drive folder not found: {}", name))
    }

    /// Let anyone holding the link read `file_id`
    pub async fn share_publicly(&self, token: &str, file_id: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/{}/permissions", self.files_url, file_id))
            .bearer_auth(token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to share {} publicly: HTTP {}",
                file_id,
                response.status()
            );
        }

        tracing::info!("Shared Drive item {} publicly", file_id);
        Ok(())
    }

    /// Find the debate folder and share it publicly, with a single token exchange
    pub async fn share_folder(&self, name: &str) -> Result<()> {
        let token = self.access_token().await?;
        let folder_id = self.find_folder(&token, name).await?;
        self.share_publicly(&token, &folder_id).await
    }
}

/// Drive search query for a non-trashed folder with exactly this name
fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, FOLDER_MIME
    )
}
