// tests/common/mod.rs
// Stub adapters shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use media_trend_aggregator::ingest::RegisteredSource;
use media_trend_aggregator::{
    Aggregator, MediaItem, SourceError, SourceName, TrendQuery, TrendSource,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Behavior {
    Items(Vec<MediaItem>),
    NotConfigured,
    Fail,
    Panic,
}

pub struct StubSource {
    pub name: SourceName,
    pub behavior: Behavior,
    pub delay: Duration,
    pub seen: Mutex<Vec<TrendQuery>>,
}

impl StubSource {
    pub fn new(name: SourceName, behavior: Behavior) -> Self {
        Self {
            name,
            behavior,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queries(&self) -> Vec<TrendQuery> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrendSource for StubSource {
    fn name(&self) -> SourceName {
        self.name
    }

    fn is_configured(&self) -> bool {
        !matches!(self.behavior, Behavior::NotConfigured)
    }

    async fn fetch(&self, query: &TrendQuery) -> Result<Vec<MediaItem>, SourceError> {
        self.seen.lock().unwrap().push(query.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Items(items) => Ok(items.clone()),
            Behavior::NotConfigured => Err(SourceError::NotConfigured(self.name)),
            Behavior::Fail => Err(SourceError::Status {
                status: 502,
                body: "bad gateway".into(),
            }),
            Behavior::Panic => panic!("adapter bug"),
        }
    }
}

pub fn item(source: SourceName, key: &str, score: f64) -> MediaItem {
    MediaItem {
        id: format!("{}{}", source.id_prefix(), key),
        title: format!("item {key}"),
        source,
        url: format!("https://example.test/{key}"),
        description: None,
        published_at: None,
        region: None,
        topic: None,
        metrics: BTreeMap::new(),
        popularity_score: score,
        tags: vec![],
    }
}

pub fn registry(stubs: Vec<Arc<StubSource>>) -> Vec<RegisteredSource> {
    stubs
        .into_iter()
        .map(|s| (s.name, s as Arc<dyn TrendSource>))
        .collect()
}

pub fn aggregator(stubs: Vec<Arc<StubSource>>) -> Aggregator {
    Aggregator::with_sources(registry(stubs), Duration::from_secs(2))
}
