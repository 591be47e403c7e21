// src/ingest/mod.rs
pub mod error;
pub mod http;
pub mod normalize;
pub mod providers;
pub mod types;

use futures::future::join_all;
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::ingest::error::{AggregatorError, SourceError};
use crate::ingest::providers::{newsapi::NewsApiSource, reddit::RedditSource, youtube::YoutubeSource};
use crate::ingest::types::{MediaItem, SourceName, TrendQuery, TrendSource};

/// HELP text for the ingest series. Safe to call repeatedly; the metrics
/// exporter calls it again after installing its recorder.
pub fn describe_metrics() {
    describe_counter!("ingest_events_total", "Items normalized by source adapters.");
    describe_counter!(
        "ingest_provider_errors_total",
        "Adapter calls that failed and degraded to an empty result."
    );
    describe_counter!(
        "ingest_provider_skipped_total",
        "Adapter calls skipped because credentials are missing."
    );
    describe_histogram!("ingest_fetch_ms", "Adapter call duration in milliseconds.");
    describe_histogram!("ingest_parse_ms", "Provider payload normalization time in milliseconds.");
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Ordered registry entry: registration order is the tie-break order.
pub type RegisteredSource = (SourceName, Arc<dyn TrendSource>);

/// Stable sort by `popularity_score` descending, then truncate.
/// Equal scores keep their input order.
pub fn sort_and_limit(mut items: Vec<MediaItem>, limit: usize) -> Vec<MediaItem> {
    items.sort_by(|a, b| b.popularity_score.total_cmp(&a.popularity_score));
    items.truncate(limit);
    items
}

/// Fans out to every registered adapter and merges their items.
#[derive(Clone)]
pub struct Aggregator {
    sources: Vec<RegisteredSource>,
    call_timeout: Duration,
}

impl Aggregator {
    /// The production registry: youtube, reddit, newsapi.
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        let sources: Vec<RegisteredSource> = vec![
            (SourceName::Youtube, Arc::new(YoutubeSource::from_settings(settings)?)),
            (SourceName::Reddit, Arc::new(RedditSource::from_settings(settings)?)),
            (SourceName::Newsapi, Arc::new(NewsApiSource::from_settings(settings)?)),
        ];
        // Reddit makes two upstream calls (token + listing).
        let call_timeout = settings.http_policy().budget().saturating_mul(2);
        Ok(Self::with_sources(sources, call_timeout))
    }

    /// Custom registry, e.g. stub adapters in tests. Order is preserved as given.
    pub fn with_sources(sources: Vec<RegisteredSource>, call_timeout: Duration) -> Self {
        ensure_metrics_described();
        Self {
            sources,
            call_timeout,
        }
    }

    /// Registry keys in registration order.
    pub fn source_names(&self) -> Vec<SourceName> {
        self.sources.iter().map(|(name, _)| *name).collect()
    }

    pub fn resolve_source(&self, requested: &str) -> Result<SourceName, AggregatorError> {
        SourceName::parse(requested)
            .filter(|name| self.sources.iter().any(|(n, _)| n == name))
            .ok_or_else(|| AggregatorError::UnsupportedSource {
                requested: requested.to_string(),
                supported: self.sources.iter().map(|(n, _)| n.to_string()).collect(),
            })
    }

    /// All sources concurrently, merged, sorted by popularity and cut to `limit`.
    /// A negative limit behaves as zero.
    pub async fn fetch_trends(
        &self,
        topic: Option<String>,
        region: Option<String>,
        limit: i64,
    ) -> Vec<MediaItem> {
        let query = TrendQuery::new(topic, region, limit);
        if query.limit == 0 {
            return Vec::new();
        }

        let calls = self
            .sources
            .iter()
            .map(|(name, source)| self.fetch_isolated(*name, source.as_ref(), &query));
        // join_all yields results in input order, independent of completion order.
        let per_source = join_all(calls).await;

        let merged: Vec<MediaItem> = per_source.into_iter().flatten().collect();
        tracing::info!(
            target: "ingest",
            merged = merged.len(),
            limit = query.limit,
            "aggregated trends"
        );
        sort_and_limit(merged, query.limit)
    }

    /// One named source; unknown names are a caller error listing the valid set.
    pub async fn fetch_trends_by_source(
        &self,
        source: &str,
        topic: Option<String>,
        region: Option<String>,
        limit: i64,
    ) -> Result<Vec<MediaItem>, AggregatorError> {
        let name = self.resolve_source(source)?;
        let query = TrendQuery::new(topic, region, limit);
        if query.limit == 0 {
            return Ok(Vec::new());
        }
        let Some((_, adapter)) = self.sources.iter().find(|(n, _)| *n == name) else {
            return Err(AggregatorError::unsupported(source));
        };
        let items = self.fetch_isolated(name, adapter.as_ref(), &query).await;
        Ok(sort_and_limit(items, query.limit))
    }

    /// Run one adapter call and degrade every failure mode to an empty list:
    /// missing credentials, upstream errors, timeouts and panics alike.
    async fn fetch_isolated(
        &self,
        name: SourceName,
        source: &dyn TrendSource,
        query: &TrendQuery,
    ) -> Vec<MediaItem> {
        let t0 = Instant::now();
        let call = AssertUnwindSafe(source.fetch(query)).catch_unwind();
        let outcome = tokio::time::timeout(self.call_timeout, call).await;
        histogram!("ingest_fetch_ms", "source" => name.as_str())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        match outcome {
            Ok(Ok(Ok(items))) => {
                let mut seen = HashSet::new();
                items
                    .into_iter()
                    .filter(|it| !it.id.is_empty() && it.source == name)
                    .filter(|it| seen.insert(it.id.clone()))
                    .collect()
            }
            Ok(Ok(Err(SourceError::NotConfigured(_)))) => {
                tracing::info!(source = %name, "skipping fetch: missing credentials");
                counter!("ingest_provider_skipped_total", "source" => name.as_str()).increment(1);
                Vec::new()
            }
            Ok(Ok(Err(e))) => {
                tracing::warn!(source = %name, error = %e, "failed to fetch trends");
                counter!("ingest_provider_errors_total", "source" => name.as_str()).increment(1);
                Vec::new()
            }
            Ok(Err(_panic)) => {
                tracing::warn!(source = %name, "adapter panicked; contribution dropped");
                counter!("ingest_provider_errors_total", "source" => name.as_str()).increment(1);
                Vec::new()
            }
            Err(_elapsed) => {
                tracing::warn!(
                    source = %name,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "adapter call timed out"
                );
                counter!("ingest_provider_errors_total", "source" => name.as_str()).increment(1);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn item(id: &str, score: f64) -> MediaItem {
        MediaItem {
            id: id.to_string(),
            title: id.to_string(),
            source: SourceName::Youtube,
            url: format!("https://example.test/{id}"),
            description: None,
            published_at: None,
            region: None,
            topic: None,
            metrics: BTreeMap::new(),
            popularity_score: score,
            tags: vec![],
        }
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let items = vec![item("a", 1.0), item("b", 2.0), item("c", 1.0), item("d", 2.0)];
        let out = sort_and_limit(items, 10);
        let ids: Vec<_> = out.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn limit_truncates() {
        let out = sort_and_limit(vec![item("a", 1.0), item("b", 2.0)], 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");
        assert!(sort_and_limit(vec![item("a", 1.0)], 0).is_empty());
    }

    #[tokio::test]
    async fn unconfigured_registry_yields_empty_not_error() {
        let agg = Aggregator::from_settings(&Settings::default()).unwrap();
        assert_eq!(
            agg.source_names(),
            vec![SourceName::Youtube, SourceName::Reddit, SourceName::Newsapi]
        );
        assert!(agg.fetch_trends(Some("ai".into()), None, 10).await.is_empty());
        let by = agg
            .fetch_trends_by_source("reddit", None, None, 10)
            .await
            .unwrap();
        assert!(by.is_empty());
    }

    #[test]
    fn resolve_source_is_case_insensitive() {
        let agg = Aggregator::from_settings(&Settings::default()).unwrap();
        assert_eq!(agg.resolve_source(" NewsAPI ").unwrap(), SourceName::Newsapi);
        let err = agg.resolve_source("unknown_source").unwrap_err();
        assert!(err.to_string().contains("youtube, reddit, newsapi"));
    }
}
