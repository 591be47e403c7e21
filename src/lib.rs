// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod metrics;

// Source adapters + aggregation (fan-out, isolation, sort/limit)
pub mod ingest;

// Scoring, recommendations and explanations
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{
    explain_ranking, Explanation, Recommendation, Recommender, ScoreBreakdown, UserPrefs,
};
pub use crate::api::router;
pub use crate::config::Settings;
pub use crate::ingest::error::{AggregatorError, SourceError};
pub use crate::ingest::types::{MediaItem, MetricValue, SourceName, TrendQuery, TrendSource};
pub use crate::ingest::Aggregator;
