// src/ingest/providers/newsapi.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::config::Settings;
use crate::ingest::error::SourceError;
use crate::ingest::http::HttpFetcher;
use crate::ingest::normalize::{normalize_description, normalize_text, parse_timestamp, stable_id};
use crate::ingest::types::{MediaItem, MetricValue, SourceName, TrendQuery, TrendSource};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";
pub const MAX_PAGE_SIZE: usize = 100;

/// Headlines carry no engagement numbers; popularity is a metadata heuristic.
const BASE_POPULARITY: f64 = 0.3;
const PER_SOURCE_NAME_CHAR: f64 = 0.05;
const DESCRIPTION_BONUS: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

/// Headline popularity: `0.3 + 0.05 * len(source_name) + 0.1 if description`.
pub fn headline_popularity(source_name: &str, has_description: bool) -> f64 {
    let mut p = BASE_POPULARITY + PER_SOURCE_NAME_CHAR * source_name.chars().count() as f64;
    if has_description {
        p += DESCRIPTION_BONUS;
    }
    p
}

/// `country` is only sent for two-letter codes; NewsAPI rejects anything else.
pub fn country_param(region: &str) -> Option<String> {
    let c = region.trim().to_ascii_lowercase();
    (c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic())).then_some(c)
}

/// Top headlines from NewsAPI.org.
pub struct NewsApiSource {
    api_key: Option<String>,
    default_region: String,
    base_url: String,
    http: HttpFetcher,
}

impl NewsApiSource {
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        Ok(Self {
            api_key: settings.newsapi_key.clone(),
            default_region: settings.default_region.clone(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: HttpFetcher::new(settings.http_policy())?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Normalize a `top-headlines` body. A provider-level `status: "error"` is
    /// reported as `SourceError::Upstream`.
    pub fn parse_response(
        body: &Value,
        query: &TrendQuery,
        region: &str,
    ) -> Result<Vec<MediaItem>, SourceError> {
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let msg = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown NewsAPI error");
            return Err(SourceError::Upstream(msg.to_string()));
        }

        let t0 = std::time::Instant::now();
        let articles = body
            .get("articles")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(articles.len().min(query.limit));
        // Repeated articles hash to the same id; first one wins.
        let mut seen = HashSet::new();
        for raw in articles {
            if out.len() >= query.limit {
                break;
            }
            let article: Article = match serde_json::from_value(raw) {
                Ok(a) => a,
                Err(e) => {
                    tracing::debug!(error = %e, source = "newsapi", "skipping malformed record");
                    continue;
                }
            };

            let title = normalize_text(article.title.as_deref().unwrap_or_default());
            let url = article.url.unwrap_or_default().trim().to_string();
            let description = normalize_description(article.description.as_deref());
            let source_name = article
                .source
                .and_then(|s| s.name)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "news".to_string());

            let popularity = headline_popularity(&source_name, description.is_some());
            let id = stable_id(&["news", &title, &url]);
            if !seen.insert(id.clone()) {
                tracing::debug!(id = %id, source = "newsapi", "skipping repeated article");
                continue;
            }

            let mut metrics = BTreeMap::new();
            metrics.insert("source_name".to_string(), MetricValue::Text(source_name));

            out.push(MediaItem {
                id: format!("{}{}", SourceName::Newsapi.id_prefix(), id),
                title,
                source: SourceName::Newsapi,
                url,
                description,
                published_at: parse_timestamp(article.published_at.as_deref()),
                region: Some(region.to_string()),
                topic: query.topic.clone(),
                metrics,
                popularity_score: popularity,
                tags: vec!["news".to_string(), "headline".to_string()],
            });
        }

        histogram!("ingest_parse_ms", "source" => "newsapi")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => "newsapi").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl TrendSource for NewsApiSource {
    fn name(&self) -> SourceName {
        SourceName::Newsapi
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<MediaItem>, SourceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(SourceError::NotConfigured(SourceName::Newsapi));
        };
        let region = query
            .region
            .as_deref()
            .unwrap_or(&self.default_region)
            .to_ascii_lowercase();

        let mut params = vec![
            ("apiKey", key.to_string()),
            ("pageSize", query.page_size(MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(country) = country_param(&region) {
            params.push(("country", country));
        }
        if let Some(topic) = query.topic.as_deref() {
            params.push(("q", topic.to_string()));
        }

        let url = format!("{}/v2/top-headlines", self.base_url);
        let body = self.http.get_json(&url, &params, &[]).await?;
        Self::parse_response(&body, query, &region)
    }
}
