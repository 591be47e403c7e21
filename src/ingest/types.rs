// src/ingest/types.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::error::SourceError;

/// Fixed registry of upstream providers, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    Youtube,
    Reddit,
    Newsapi,
}

impl SourceName {
    pub const ALL: [SourceName; 3] = [SourceName::Youtube, SourceName::Reddit, SourceName::Newsapi];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceName::Youtube => "youtube",
            SourceName::Reddit => "reddit",
            SourceName::Newsapi => "newsapi",
        }
    }

    /// Short literal prepended to every item id produced by this source.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SourceName::Youtube => "yt_",
            SourceName::Reddit => "rd_",
            SourceName::Newsapi => "nw_",
        }
    }

    /// Trimmed, case-insensitive lookup.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim();
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

/// Per-source metric value: counts are numbers, some providers add labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Canonical representation of a trending item, whatever the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub source: SourceName,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub popularity_score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MediaItem {
    /// Title and description joined the way topic/keyword matching sees them.
    pub fn searchable_text(&self) -> String {
        format!("{}\n{}", self.title, self.description.as_deref().unwrap_or_default())
    }
}

/// One fetch request as every adapter receives it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendQuery {
    pub topic: Option<String>,
    pub region: Option<String>,
    /// Already floored at zero by the caller.
    pub limit: usize,
}

impl TrendQuery {
    pub fn new(topic: Option<String>, region: Option<String>, limit: i64) -> Self {
        Self {
            topic: topic.filter(|t| !t.trim().is_empty()),
            region: region.filter(|r| !r.trim().is_empty()),
            limit: usize::try_from(limit.max(0)).unwrap_or(0),
        }
    }

    /// Requested limit clamped into the provider's page-size range `[1, max]`.
    pub fn page_size(&self, max: usize) -> usize {
        self.limit.clamp(1, max.max(1))
    }
}

/// Fetch capability every upstream adapter implements.
///
/// Implementations report failures through `SourceError`; the aggregator
/// decides how each failure degrades (always to an empty contribution).
#[async_trait::async_trait]
pub trait TrendSource: Send + Sync {
    fn name(&self) -> SourceName;

    /// True when the credentials this provider needs are present.
    fn is_configured(&self) -> bool;

    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<MediaItem>, SourceError>;
}
