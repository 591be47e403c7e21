// src/analyze/explain.rs
//! Stateless, best-effort ranking explanation. Nothing is remembered between
//! calls, so the actual historical score for an id cannot be reconstructed;
//! only the probable source (from the id prefix) and the generic factors.

use serde::Serialize;

use crate::ingest::types::SourceName;

pub const UNKNOWN_SOURCE: &str = "unknown";

const EXPLANATION: &str =
    "Ranking is based on source popularity score, topic match, and user preference boosts.";

const FACTORS: [&str; 3] = [
    "Base popularity score from the source",
    "Topic and keyword match boosts",
    "Light recency and engagement normalization",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub item_id: String,
    pub explanation: String,
    pub source_hint: String,
    pub factors: Vec<String>,
}

/// Source whose id prefix starts `item_id`, if any.
pub fn source_hint(item_id: &str) -> Option<SourceName> {
    SourceName::ALL
        .into_iter()
        .find(|s| item_id.starts_with(s.id_prefix()))
}

pub fn explain_ranking(item_id: &str) -> Explanation {
    Explanation {
        item_id: item_id.to_string(),
        explanation: EXPLANATION.to_string(),
        source_hint: source_hint(item_id)
            .map(|s| s.to_string())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        factors: FACTORS.iter().map(|f| f.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_map_to_sources() {
        assert_eq!(explain_ranking("yt_abc123").source_hint, "youtube");
        assert_eq!(explain_ranking("rd_9xk").source_hint, "reddit");
        assert_eq!(explain_ranking("nw_0123456789abcdef").source_hint, "newsapi");
    }

    #[test]
    fn unknown_prefix_is_marked() {
        let e = explain_ranking("zz_xyz");
        assert_eq!(e.source_hint, UNKNOWN_SOURCE);
        assert_eq!(e.item_id, "zz_xyz");
        assert_eq!(e.factors.len(), 3);
        assert_eq!(explain_ranking("").source_hint, UNKNOWN_SOURCE);
    }
}
