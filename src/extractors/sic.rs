use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;

use super::{fetch_page, is_host, StreamExtractor, StreamInfo};
use crate::{DebateError, Result};

/// SIC Notícias publishes the stream in a schema.org `VideoObject` ld+json block
pub struct SicExtractor {
    client: Client,
}

impl SicExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Find `(contentUrl, thumbnailUrl)` of the first `VideoObject` on the page
pub fn parse_video_object(html: &str) -> Option<(String, String)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    document.select(&selector).find_map(|script| {
        let body = script.text().collect::<String>();
        let data: Value = serde_json::from_str(&body).ok()?;
        if data["@type"].as_str() != Some("VideoObject") {
            return None;
        }
        let content = data["contentUrl"].as_str()?;
        let thumbnail = data["thumbnailUrl"].as_str()?;
        Some((content.to_string(), thumbnail.to_string()))
    })
}

#[async_trait]
impl StreamExtractor for SicExtractor {
    async fn extract(&self, url: &str) -> Result<StreamInfo> {
        let html = fetch_page(&self.client, url, None).await?;

        let (m3u8_url, thumbnail_url) = parse_video_object(&html).ok_or_else(|| {
            DebateError::ExtractionFailed(format!("no VideoObject found on {}", url))
        })?;

        Ok(StreamInfo {
            m3u8_url,
            thumbnail_url,
            headers: None,
        })
    }

    fn supports_url(&self, url: &str) -> bool {
        is_host(url, "sicnoticias.pt")
    }

    fn site_name(&self) -> &'static str {
        "SIC Notícias"
    }
}
