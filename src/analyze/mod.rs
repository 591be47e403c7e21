// src/analyze/mod.rs
//! Scoring and ranking over aggregated items: per-item breakdowns, personalized
//! recommendations, and stateless explanations.

pub mod explain;
pub mod recommend;
pub mod scoring;

// Re-export convenient types.
pub use crate::analyze::explain::{explain_ranking, Explanation, UNKNOWN_SOURCE};
pub use crate::analyze::recommend::{RecommendError, Recommender, UserPrefs};
pub use crate::analyze::scoring::{score_item, Recommendation, ScoreBreakdown, ScoringWeights};
