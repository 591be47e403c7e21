// src/ingest/providers/reddit.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::ingest::error::SourceError;
use crate::ingest::http::HttpFetcher;
use crate::ingest::normalize::{
    count_from_json, log_scale, normalize_description, normalize_text, timestamp_from_unix,
};
use crate::ingest::types::{MediaItem, MetricValue, SourceName, TrendQuery, TrendSource};

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com";
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    num_comments: Option<Value>,
    #[serde(default)]
    created_utc: Option<f64>,
}

struct Credentials {
    client_id: String,
    client_secret: String,
    user_agent: String,
}

/// Hot posts from r/all, or from the subreddit named by the topic.
pub struct RedditSource {
    credentials: Option<Credentials>,
    auth_url: String,
    api_url: String,
    http: HttpFetcher,
}

/// Topic → subreddit name. Anything outside `[A-Za-z0-9_]` is dropped.
pub fn subreddit_for(topic: Option<&str>) -> String {
    let cleaned: String = topic
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "all".to_string()
    } else {
        cleaned
    }
}

impl RedditSource {
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        let credentials = match (
            settings.reddit_client_id.as_ref(),
            settings.reddit_client_secret.as_ref(),
            settings.reddit_user_agent.as_ref(),
        ) {
            (Some(id), Some(secret), Some(agent)) => Some(Credentials {
                client_id: id.clone(),
                client_secret: secret.clone(),
                user_agent: agent.clone(),
            }),
            _ => None,
        };
        Ok(Self {
            credentials,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http: HttpFetcher::new(settings.http_policy())?,
        })
    }

    pub fn with_base_urls(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into().trim_end_matches('/').to_string();
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self, creds: &Credentials) -> Result<String, SourceError> {
        let url = format!("{}/api/v1/access_token", self.auth_url);
        let body = self
            .http
            .post_form_basic(
                &url,
                &[("grant_type", "client_credentials")],
                &creds.client_id,
                &creds.client_secret,
                &[("User-Agent", creds.user_agent.clone())],
            )
            .await?;
        match body.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(SourceError::Upstream(
                body.get("error")
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "token response without access_token".to_string()),
            )),
        }
    }

    /// Normalize a listing body (`data.children[].data`).
    pub fn parse_listing(body: &Value, query: &TrendQuery) -> Vec<MediaItem> {
        let t0 = std::time::Instant::now();
        let children = body
            .pointer("/data/children")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(children.len());
        for child in children {
            let Some(data) = child.get("data").cloned() else {
                continue;
            };
            let post: Post = match serde_json::from_value(data) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(error = %e, source = "reddit", "skipping malformed record");
                    continue;
                }
            };
            let Some(post_id) = post.id.filter(|id| !id.trim().is_empty()) else {
                continue;
            };

            let score = count_from_json(post.score.as_ref());
            let comments = count_from_json(post.num_comments.as_ref());

            let url = match post.url.as_deref().map(str::trim) {
                Some(u) if !u.is_empty() => html_escape::decode_html_entities(u).to_string(),
                _ => format!(
                    "https://reddit.com{}",
                    post.permalink.as_deref().unwrap_or_default()
                ),
            };

            let mut metrics = BTreeMap::new();
            metrics.insert("score".to_string(), MetricValue::Number(score));
            metrics.insert("comments".to_string(), MetricValue::Number(comments));
            if let Some(sub) = post.subreddit.filter(|s| !s.is_empty()) {
                metrics.insert("subreddit".to_string(), MetricValue::Text(sub));
            }

            out.push(MediaItem {
                id: format!("{}{}", SourceName::Reddit.id_prefix(), post_id.trim()),
                title: normalize_text(post.title.as_deref().unwrap_or_default()),
                source: SourceName::Reddit,
                url,
                description: normalize_description(post.selftext.as_deref()),
                published_at: timestamp_from_unix(post.created_utc),
                region: query.region.clone(),
                topic: query.topic.clone(),
                metrics,
                popularity_score: log_scale(score) + 0.1 * log_scale(comments),
                tags: vec!["reddit".to_string(), "post".to_string()],
            });
        }
        out.truncate(query.limit);

        histogram!("ingest_parse_ms", "source" => "reddit")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => "reddit").increment(out.len() as u64);
        out
    }
}

#[async_trait]
impl TrendSource for RedditSource {
    fn name(&self) -> SourceName {
        SourceName::Reddit
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<MediaItem>, SourceError> {
        let Some(creds) = self.credentials.as_ref() else {
            return Err(SourceError::NotConfigured(SourceName::Reddit));
        };
        let token = self.access_token(creds).await?;

        let subreddit = subreddit_for(query.topic.as_deref());
        let url = format!("{}/r/{}/hot", self.api_url, subreddit);
        let params = [
            ("limit", query.page_size(MAX_PAGE_SIZE).to_string()),
            ("raw_json", "1".to_string()),
        ];
        let headers = [
            ("Authorization", format!("bearer {token}")),
            ("User-Agent", creds.user_agent.clone()),
        ];
        let body = self.http.get_json(&url, &params, &headers).await?;
        Ok(Self::parse_listing(&body, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing() -> Value {
        json!({
            "kind": "Listing",
            "data": {
                "children": [
                    { "kind": "t3", "data": {
                        "id": "p1", "title": "Rust &amp; WebAssembly", "url": "https://example.test/a",
                        "permalink": "/r/rust/comments/p1/x/", "selftext": "",
                        "subreddit": "rust", "score": 1000, "num_comments": 100, "created_utc": 1700000000.0
                    }},
                    { "kind": "t3", "data": {
                        "id": "p2", "title": "Self post", "url": "", "permalink": "/r/rust/comments/p2/y/",
                        "selftext": "body text", "score": -5, "num_comments": 0
                    }},
                    { "kind": "t3", "data": { "title": "no id" } },
                    { "kind": "more" }
                ]
            }
        })
    }

    #[test]
    fn titles_and_long_selftext_survive_for_matching() {
        use crate::analyze::{score_item, ScoringWeights, UserPrefs};

        let body = json!({ "data": { "children": [
            { "kind": "t3", "data": {
                "id": "g1", "title": "Why Vec<String> beats &str",
                "url": "https://example.test/g1", "score": 10, "num_comments": 1,
                "selftext": format!("{} quantum", "filler ".repeat(230))
            }}
        ]}});
        let q = TrendQuery::new(Some("rust".into()), None, 5);
        let items = RedditSource::parse_listing(&body, &q);
        assert_eq!(items[0].title, "Why Vec<String> beats &str");
        assert!(items[0].description.as_ref().unwrap().chars().count() > 1_600);

        let prefs = UserPrefs::new(Vec::<String>::new(), ["quantum"]);
        let r = score_item(items[0].clone(), "vec<string>", &prefs, &ScoringWeights::default());
        assert_eq!(r.breakdown.topic_match_boost, 0.25);
        assert_eq!(r.breakdown.user_pref_boost, 0.2);
    }

    #[test]
    fn subreddit_from_topic() {
        assert_eq!(subreddit_for(None), "all");
        assert_eq!(subreddit_for(Some("machine learning")), "machinelearning");
        assert_eq!(subreddit_for(Some("??")), "all");
        assert_eq!(subreddit_for(Some("rust_gamedev")), "rust_gamedev");
    }

    #[test]
    fn parses_listing_with_permalink_fallback() {
        let q = TrendQuery::new(Some("rust".into()), None, 20);
        let items = RedditSource::parse_listing(&listing(), &q);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "rd_p1");
        assert_eq!(items[0].title, "Rust & WebAssembly");
        assert_eq!(items[0].description, None);
        assert!(items[0].published_at.is_some());
        assert!((items[0].popularity_score - 3.2).abs() < 1e-9);
        assert_eq!(
            items[0].metrics.get("subreddit"),
            Some(&MetricValue::Text("rust".into()))
        );

        assert_eq!(items[1].url, "https://reddit.com/r/rust/comments/p2/y/");
        assert_eq!(items[1].description.as_deref(), Some("body text"));
        assert_eq!(items[1].popularity_score, 0.0);
        assert_eq!(items[1].region, None);
    }

    #[tokio::test]
    async fn missing_credentials_is_not_configured() {
        let settings = Settings {
            reddit_client_id: Some("id".into()),
            ..Settings::default()
        };
        let src = RedditSource::from_settings(&settings).unwrap();
        assert!(!src.is_configured());
        let err = src.fetch(&TrendQuery::new(None, None, 5)).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(SourceName::Reddit)));
    }

    #[tokio::test]
    async fn fetch_exchanges_token_then_reads_listing() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token":"t0k","token_type":"bearer"}"#)
            .create_async()
            .await;
        let hot = server
            .mock("GET", "/r/all/hot")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "2".into()))
            .match_header("authorization", "bearer t0k")
            .with_status(200)
            .with_body(listing().to_string())
            .create_async()
            .await;

        let settings = Settings {
            reddit_client_id: Some("id".into()),
            reddit_client_secret: Some("secret".into()),
            reddit_user_agent: Some("agg-test/0.1".into()),
            ..Settings::default()
        };
        let src = RedditSource::from_settings(&settings).unwrap().with_base_urls(server.url(), server.url());
        let items = src.fetch(&TrendQuery::new(None, None, 2)).await.unwrap();
        assert_eq!(items.len(), 2);
        token.assert_async().await;
        hot.assert_async().await;
    }

    #[tokio::test]
    async fn token_response_without_token_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"error":"unsupported_grant_type"}"#)
            .create_async()
            .await;
        let settings = Settings {
            reddit_client_id: Some("id".into()),
            reddit_client_secret: Some("secret".into()),
            reddit_user_agent: Some("agg-test/0.1".into()),
            ..Settings::default()
        };
        let src = RedditSource::from_settings(&settings).unwrap().with_base_urls(server.url(), server.url());
        let err = src.fetch(&TrendQuery::new(None, None, 2)).await.unwrap_err();
        assert!(matches!(err, SourceError::Upstream(_)));
    }
}
