// src/ingest/providers/youtube.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::ingest::error::SourceError;
use crate::ingest::http::HttpFetcher;
use crate::ingest::normalize::{
    count_from_json, log_scale, normalize_description, normalize_text, parse_timestamp,
};
use crate::ingest::types::{MediaItem, MetricValue, SourceName, TrendQuery, TrendSource};

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
pub const MAX_PAGE_SIZE: usize = 50;
const MAX_PROVIDER_TAGS: usize = 5;

#[derive(Debug, Deserialize)]
struct Video {
    id: Option<String>,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    tags: Vec<String>,
}

/// Most-popular chart from the YouTube Data API v3.
pub struct YoutubeSource {
    api_key: Option<String>,
    default_region: String,
    base_url: String,
    http: HttpFetcher,
}

impl YoutubeSource {
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        Ok(Self {
            api_key: settings.youtube_api_key.clone(),
            default_region: settings.default_region.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: HttpFetcher::new(settings.http_policy())?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Normalize a `videos.list` response body. Records that don't fit the
    /// expected shape or lack an id are skipped individually.
    pub fn parse_response(body: &Value, query: &TrendQuery, region: &str) -> Vec<MediaItem> {
        let t0 = std::time::Instant::now();
        let entries = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(entries.len());
        for raw in entries {
            let video: Video = match serde_json::from_value(raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(error = %e, source = "youtube", "skipping malformed record");
                    continue;
                }
            };
            let Some(video_id) = video.id.filter(|id| !id.trim().is_empty()) else {
                continue;
            };

            let stats = video.statistics.unwrap_or(Value::Null);
            let views = count_from_json(stats.get("viewCount"));
            let likes = count_from_json(stats.get("likeCount"));

            let mut metrics = BTreeMap::new();
            metrics.insert("views".to_string(), MetricValue::Number(views));
            metrics.insert("likes".to_string(), MetricValue::Number(likes));
            if stats.get("commentCount").is_some() {
                metrics.insert(
                    "comments".to_string(),
                    MetricValue::Number(count_from_json(stats.get("commentCount"))),
                );
            }

            let mut tags = vec!["video".to_string(), "youtube".to_string()];
            tags.extend(
                video
                    .snippet
                    .tags
                    .iter()
                    .map(|t| normalize_text(t))
                    .filter(|t| !t.is_empty())
                    .take(MAX_PROVIDER_TAGS),
            );

            out.push(MediaItem {
                id: format!("{}{}", SourceName::Youtube.id_prefix(), video_id.trim()),
                title: normalize_text(video.snippet.title.as_deref().unwrap_or_default()),
                source: SourceName::Youtube,
                url: format!("https://www.youtube.com/watch?v={}", video_id.trim()),
                description: normalize_description(video.snippet.description.as_deref()),
                published_at: parse_timestamp(video.snippet.published_at.as_deref()),
                region: Some(region.to_string()),
                topic: query.topic.clone(),
                metrics,
                popularity_score: log_scale(views) + 0.1 * log_scale(likes),
                tags,
            });
        }
        out.truncate(query.limit);

        histogram!("ingest_parse_ms", "source" => "youtube")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => "youtube").increment(out.len() as u64);
        out
    }
}

#[async_trait]
impl TrendSource for YoutubeSource {
    fn name(&self) -> SourceName {
        SourceName::Youtube
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<MediaItem>, SourceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(SourceError::NotConfigured(SourceName::Youtube));
        };
        let region = query
            .region
            .clone()
            .unwrap_or_else(|| self.default_region.clone());

        let url = format!("{}/youtube/v3/videos", self.base_url);
        let params = [
            ("part", "snippet,statistics".to_string()),
            ("chart", "mostPopular".to_string()),
            ("regionCode", region.clone()),
            ("maxResults", query.page_size(MAX_PAGE_SIZE).to_string()),
            ("key", key.to_string()),
        ];
        let body = self.http.get_json(&url, &params, &[]).await?;
        Ok(Self::parse_response(&body, query, &region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "kind": "youtube#videoListResponse",
            "items": [
                {
                    "id": "abc123",
                    "snippet": {
                        "title": "AI breakthroughs &amp; what they mean",
                        "description": "Long form explainer",
                        "publishedAt": "2024-03-01T12:00:00Z",
                        "tags": ["ai", "ml"]
                    },
                    "statistics": { "viewCount": "1000000", "likeCount": "10000", "commentCount": "42" }
                },
                {
                    "id": "nolikes",
                    "snippet": { "title": "Hidden likes" },
                    "statistics": { "viewCount": "100" }
                },
                { "snippet": { "title": "missing id" } },
                "not an object"
            ]
        })
    }

    #[test]
    fn parses_views_likes_and_ids() {
        let q = TrendQuery::new(Some("ai".into()), None, 10);
        let items = YoutubeSource::parse_response(&fixture(), &q, "US");
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.id, "yt_abc123");
        assert_eq!(first.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(first.title, "AI breakthroughs & what they mean");
        assert_eq!(first.region.as_deref(), Some("US"));
        assert_eq!(first.topic.as_deref(), Some("ai"));
        assert!(first.published_at.is_some());
        assert!((first.popularity_score - 6.4).abs() < 1e-9);
        assert_eq!(first.metrics.get("comments"), Some(&MetricValue::Number(42.0)));
        assert_eq!(first.tags, vec!["video", "youtube", "ai", "ml"]);

        let second = &items[1];
        assert!((second.popularity_score - 2.0).abs() < 1e-9);
        assert_eq!(second.metrics.get("likes"), Some(&MetricValue::Number(0.0)));
        assert!(second.description.is_none());
    }

    #[test]
    fn respects_limit_and_tolerates_missing_items() {
        let q = TrendQuery::new(None, None, 1);
        assert_eq!(YoutubeSource::parse_response(&fixture(), &q, "IN").len(), 1);
        assert!(YoutubeSource::parse_response(&json!({}), &q, "IN").is_empty());
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let src = YoutubeSource::from_settings(&Settings::default()).unwrap();
        assert!(!src.is_configured());
        let err = src.fetch(&TrendQuery::new(None, None, 5)).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(SourceName::Youtube)));
    }

    #[tokio::test]
    async fn fetch_sends_chart_query_and_clamps_page_size() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("chart".into(), "mostPopular".into()),
                mockito::Matcher::UrlEncoded("regionCode".into(), "IN".into()),
                mockito::Matcher::UrlEncoded("maxResults".into(), "50".into()),
                mockito::Matcher::UrlEncoded("key".into(), "k".into()),
            ]))
            .with_status(200)
            .with_body(fixture().to_string())
            .create_async()
            .await;

        let settings = Settings {
            youtube_api_key: Some("k".into()),
            ..Settings::default()
        };
        let src = YoutubeSource::from_settings(&settings).unwrap().with_base_url(server.url());
        let items = src.fetch(&TrendQuery::new(None, None, 500)).await.unwrap();
        assert_eq!(items.len(), 2);
        m.assert_async().await;
    }
}
