//! Transparent, additive recommendation scoring.
//!
//! Every recommendation carries a `ScoreBreakdown`:
//! - `source_weight`     : bonus when the item's source is a preferred source
//! - `topic_match_boost` : bonus when the topic occurs in title/description
//! - `user_pref_boost`   : bonus when any user keyword occurs there
//! - `engagement_score`  : base popularity / 100, clamped to [0, cap]
//! - `recency_boost`     : bonus when the publish time is known
//!
//! total = base popularity + the five components above, nothing else.

use serde::{Deserialize, Serialize};

use crate::analyze::recommend::UserPrefs;
use crate::ingest::normalize::{clamp, text_contains_any};
use crate::ingest::types::MediaItem;

/// Tunable constants, overridable from the `[scoring]` config table.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub source_bonus: f64,
    pub topic_match_bonus: f64,
    pub keyword_bonus: f64,
    pub recency_bonus: f64,
    pub engagement_divisor: f64,
    pub engagement_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            source_bonus: 0.2,
            topic_match_bonus: 0.25,
            keyword_bonus: 0.2,
            recency_bonus: 0.1,
            engagement_divisor: 100.0,
            engagement_cap: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub source_weight: f64,
    pub recency_boost: f64,
    pub engagement_score: f64,
    pub topic_match_boost: f64,
    pub user_pref_boost: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    /// Sum of the additive components (excludes base popularity).
    pub fn boosts(&self) -> f64 {
        self.source_weight
            + self.topic_match_boost
            + self.user_pref_boost
            + self.engagement_score
            + self.recency_boost
    }
}

/// One scored item; `score` always equals `breakdown.total`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: MediaItem,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Score a single item against a topic and user preferences.
pub fn score_item(
    item: MediaItem,
    topic: &str,
    prefs: &UserPrefs,
    w: &ScoringWeights,
) -> Recommendation {
    let base = if item.popularity_score.is_finite() {
        item.popularity_score
    } else {
        0.0
    };
    let text = item.searchable_text();

    let mut b = ScoreBreakdown::default();

    // Empty preference set means "no opinion", so no bonus either way.
    if !prefs.preferred_sources.is_empty() && prefs.prefers(item.source) {
        b.source_weight = w.source_bonus;
    }

    let topic = topic.trim();
    if !topic.is_empty() && text_contains_any(&text, &[topic]) {
        b.topic_match_boost = w.topic_match_bonus;
    }

    if !prefs.keywords.is_empty() && text_contains_any(&text, &prefs.keywords) {
        b.user_pref_boost = w.keyword_bonus;
    }

    let divisor = if w.engagement_divisor > 0.0 {
        w.engagement_divisor
    } else {
        100.0
    };
    b.engagement_score = clamp(base / divisor, 0.0, w.engagement_cap.max(0.0));
    b.recency_boost = if item.published_at.is_some() {
        w.recency_bonus
    } else {
        0.0
    };

    b.total = base + b.boosts();
    Recommendation {
        item,
        score: b.total,
        breakdown: b,
    }
}
