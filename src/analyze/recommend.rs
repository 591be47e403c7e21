// src/analyze/recommend.rs
//! Personalized re-ranking over a widened candidate pool from the aggregator.

use metrics::counter;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::analyze::scoring::{score_item, Recommendation, ScoringWeights};
use crate::config::Settings;
use crate::ingest::error::AggregatorError;
use crate::ingest::types::SourceName;
use crate::ingest::Aggregator;

/// Recognized user preferences. Unknown keys and non-string entries are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPrefs {
    /// Lower-cased source names.
    pub preferred_sources: BTreeSet<String>,
    pub keywords: Vec<String>,
}

impl UserPrefs {
    pub fn new<I, J, S, T>(sources: I, keywords: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            preferred_sources: sources
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Accepts `{"preferred_sources": [...], "keywords": [...]}`; each field may
    /// also be a single string. Anything else is ignored.
    pub fn from_json(v: &Value) -> Self {
        fn strings(v: Option<&Value>) -> Vec<String> {
            match v {
                Some(Value::String(s)) => vec![s.clone()],
                Some(Value::Array(arr)) => arr
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            }
        }
        Self::new(
            strings(v.get("preferred_sources")),
            strings(v.get("keywords")),
        )
    }

    pub fn with_preferred_source(mut self, source: SourceName) -> Self {
        self.preferred_sources.insert(source.as_str().to_string());
        self
    }

    pub fn prefers(&self, source: SourceName) -> bool {
        self.preferred_sources.contains(source.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecommendError {
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error(transparent)]
    Source(#[from] AggregatorError),
}

/// Scores aggregated items for a topic and returns the top-N with breakdowns.
#[derive(Clone)]
pub struct Recommender {
    aggregator: Aggregator,
    weights: ScoringWeights,
    default_limit: i64,
}

impl Recommender {
    pub fn new(aggregator: Aggregator, weights: ScoringWeights, default_limit: i64) -> Self {
        Self {
            aggregator,
            weights,
            default_limit,
        }
    }

    pub fn from_settings(settings: &Settings, aggregator: Aggregator) -> Self {
        Self::new(aggregator, settings.scoring, settings.default_limit)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Registry keys in registration order.
    pub fn list_supported_sources(&self) -> Vec<String> {
        self.aggregator
            .source_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Fetch `max(limit, default_limit)` candidates, score each, stable-sort by
    /// total descending and keep the top `limit`.
    pub async fn generate_recommendations(
        &self,
        topic: &str,
        prefs: &UserPrefs,
        region: Option<String>,
        limit: i64,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(RecommendError::EmptyTopic);
        }
        counter!("recommend_requests_total").increment(1);
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let pool_size = limit.max(self.default_limit);
        let items = self
            .aggregator
            .fetch_trends(Some(topic.to_string()), region, pool_size)
            .await;

        let mut recs: Vec<Recommendation> = items
            .into_iter()
            .map(|item| score_item(item, topic, prefs, &self.weights))
            .collect();
        recs.sort_by(|a, b| b.score.total_cmp(&a.score));
        recs.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        tracing::debug!(topic, returned = recs.len(), pool = pool_size, "recommendations scored");
        Ok(recs)
    }

    /// Tool-level entry: loosely-typed prefs plus an optional source that is
    /// merged into the preferred set after validation.
    pub async fn recommend(
        &self,
        topic: &str,
        user_prefs: Option<&Value>,
        region: Option<String>,
        limit: i64,
        source: Option<&str>,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        let mut prefs = user_prefs.map(UserPrefs::from_json).unwrap_or_default();
        if let Some(s) = source.filter(|s| !s.trim().is_empty()) {
            let name = self.aggregator.resolve_source(s)?;
            prefs = prefs.with_preferred_source(name);
        }
        self.generate_recommendations(topic, &prefs, region, limit)
            .await
    }
}
