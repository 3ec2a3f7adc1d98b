use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::collections::BTreeMap;
use url::Url;

use super::{fetch_page, is_host, StreamExtractor, StreamInfo};
use crate::{DebateError, Result};

const STREAM_BASE: &str = "https://streaming-vod.rtp.pt/hls/nas2.share,/h264/512x384";
const THUMBNAIL_BASE: &str = "https://cdn-images.rtp.pt/multimedia/screenshots";
const THUMBNAIL_QUERY: &str = "q=100&format=pjpg&auto=webp&v=3&w=400";

/// RTP Play episode pages, e.g. `https://www.rtp.pt/play/p12900/e746061/debates-legislativas-2024`
///
/// The media reference is only exposed through the seek-bar preview track
/// (`seekBarThumbnailsLoc: '//.../preview/p12900_1_2024020515461_preview.vtt'`),
/// from which both the stream and the thumbnail URL are derived.
pub struct RtpExtractor {
    client: Client,
}

impl RtpExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Browser-like headers the RTP stream host insists on
    pub fn stream_headers() -> BTreeMap<String, String> {
        [
            ("User-Agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:122.0) Gecko/20100101 Firefox/122.0"),
            ("Accept", "*/*"),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Accept-Encoding", "gzip, deflate, br"),
            ("Referer", "https://www.rtp.pt/"),
            ("Origin", "https://www.rtp.pt"),
            ("DNT", "1"),
            ("Sec-GPC", "1"),
            ("Connection", "keep-alive"),
            ("Sec-Fetch-Dest", "empty"),
            ("Sec-Fetch-Mode", "cors"),
            ("Sec-Fetch-Site", "same-site"),
            ("TE", "trailers"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}

/// Programme id of an episode URL: the third-to-last path segment
pub fn series_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments[segments.len() - 3].to_string())
}

/// Media reference (`p12900_1_2024020515461`) found in the page's preview track
pub fn media_reference(html: &str, series: &str) -> Option<String> {
    let pattern = format!(
        r"seekBarThumbnailsLoc: '.*preview/({}.*)\.vtt',",
        regex::escape(series)
    );
    let re = Regex::new(&pattern).ok()?;
    let preview = re.captures(html)?.get(1)?.as_str();

    // Drop the trailing `_preview`
    let mut parts: Vec<&str> = preview.split('_').collect();
    parts.pop();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("_"))
}

/// Build the stream info for an episode page
pub fn stream_info(url: &str, html: &str) -> Result<StreamInfo> {
    let series = series_id(url).ok_or_else(|| {
        DebateError::ExtractionFailed(format!("cannot find the programme id in {}", url))
    })?;
    let reference = media_reference(html, &series).ok_or_else(|| {
        DebateError::ExtractionFailed(format!("no preview track for {} on {}", series, url))
    })?;

    Ok(StreamInfo {
        m3u8_url: format!(
            "{}/{}/{}.mp4,.urlset/master.m3u8",
            STREAM_BASE, series, reference
        ),
        thumbnail_url: format!(
            "{}/{}/{}.jpg?{}",
            THUMBNAIL_BASE, series, reference, THUMBNAIL_QUERY
        ),
        headers: Some(RtpExtractor::stream_headers()),
    })
}

#[async_trait]
impl StreamExtractor for RtpExtractor {
    async fn extract(&self, url: &str) -> Result<StreamInfo> {
        let html = fetch_page(&self.client, url, None).await?;
        stream_info(url, &html)
    }

    fn supports_url(&self, url: &str) -> bool {
        is_host(url, "rtp.pt")
    }

    fn site_name(&self) -> &'static str {
        "RTP Play"
    }
}
