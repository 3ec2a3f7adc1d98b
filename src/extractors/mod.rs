use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub mod rtp;
pub mod sic;

use crate::{DebateError, Result};

/// Where a debate broadcast can be streamed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// HLS master playlist of the broadcast
    pub m3u8_url: String,

    /// Poster image shown in the debate listing
    pub thumbnail_url: String,

    /// Extra HTTP request headers the stream host requires
    pub headers: Option<BTreeMap<String, String>>,
}

impl StreamInfo {
    /// Headers in the `-headers` form ffmpeg expects: `Key: value\r\n` per header
    pub fn ffmpeg_headers(&self) -> Option<String> {
        self.headers.as_ref().map(|headers| {
            headers
                .iter()
                .map(|(k, v)| format!("{}: {}\r\n", k, v))
                .collect()
        })
    }
}

/// Trait for finding the stream behind a debate page
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Extract stream information from a debate page URL
    async fn extract(&self, url: &str) -> Result<StreamInfo>;

    /// Check if this extractor supports the given URL
    fn supports_url(&self, url: &str) -> bool;

    /// Get the name of this site
    fn site_name(&self) -> &'static str;
}

/// Registry for managing the per-site extractors
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn StreamExtractor>>,
}

impl ExtractorRegistry {
    /// Create a new registry with default extractors
    pub fn new() -> Self {
        let client = Client::new();
        let mut registry = Self {
            extractors: Vec::new(),
        };

        registry.register(Box::new(sic::SicExtractor::new(client.clone())));
        registry.register(Box::new(rtp::RtpExtractor::new(client)));

        registry
    }

    /// Register a new extractor
    pub fn register(&mut self, extractor: Box<dyn StreamExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given URL
    pub fn find_extractor(&self, url: &str) -> Option<&dyn StreamExtractor> {
        self.extractors
            .iter()
            .find(|extractor| extractor.supports_url(url))
            .map(|boxed| boxed.as_ref())
    }

    /// List all supported sites
    pub fn list_sites(&self) -> Vec<&'static str> {
        self.extractors
            .iter()
            .map(|extractor| extractor.site_name())
            .collect()
    }

    /// Extract stream info using the appropriate extractor
    pub async fn extract(&self, url: &str) -> Result<StreamInfo> {
        let extractor = self
            .find_extractor(url)
            .ok_or_else(|| DebateError::UnsupportedSite(url.to_string()))?;

        tracing::info!("Extracting stream from {} page: {}", extractor.site_name(), url);
        extractor.extract(url).await
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `url` is an http(s) URL on `domain` or one of its subdomains
pub(crate) fn is_host(url: &str, domain: &str) -> bool {
    Url::parse(url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|host| host == domain || host.ends_with(&format!(".{}", domain)))
        .unwrap_or(false)
}

/// Fetch a page body, failing on non-success status
pub(crate) async fn fetch_page(
    client: &Client,
    url: &str,
    headers: Option<&BTreeMap<String, String>>,
) -> Result<String> {
    let mut request = client.get(url);
    if let Some(headers) = headers {
        for (k, v) in headers {
            request = request.header(k.as_str(), v.as_str());
        }
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Failed to fetch {}: HTTP {}", url, response.status());
    }

    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_host() {
        assert!(is_host("https://sicnoticias.pt/x", "sicnoticias.pt"));
        assert!(is_host("https://www.rtp.pt/play/p1/e2/x", "rtp.pt"));
        assert!(!is_host("https://notrtp.pt/play", "rtp.pt"));
        assert!(!is_host("ftp://www.rtp.pt/play", "rtp.pt"));
        assert!(!is_host("not a url", "rtp.pt"));
    }

    #[test]
    fn test_registry_routing() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.list_sites(), vec!["SIC Notícias", "RTP Play"]);
        assert_eq!(
            registry
                .find_extractor("https://www.rtp.pt/play/p12900/e746061/debates")
                .map(|e| e.site_name()),
            Some("RTP Play")
        );
        assert!(registry.find_extractor("https://www.youtube.com/watch?v=1").is_none());
    }

    #[tokio::test]
    async fn test_unsupported_site() {
        let err = ExtractorRegistry::new()
            .extract("https://example.com/debate")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebateError>(),
            Some(DebateError::UnsupportedSite(_))
        ));
    }

    #[test]
    fn test_ffmpeg_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("Origin".to_string(), "https://www.rtp.pt".to_string());
        headers.insert("Referer".to_string(), "https://www.rtp.pt/".to_string());
        let info = StreamInfo {
            m3u8_url: String::new(),
            thumbnail_url: String::new(),
            headers: Some(headers),
        };
        assert_eq!(
            info.ffmpeg_headers().unwrap(),
            "Origin: https://www.rtp.pt\r\nReferer: https://www.rtp.pt/\r\n"
        );
    }
}
