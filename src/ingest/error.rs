// src/ingest/error.rs
use thiserror::Error;

use crate::ingest::types::SourceName;

/// Why a single adapter call produced nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} credentials are not configured")]
    NotConfigured(SourceName),

    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("provider error: {0}")]
    Upstream(String),
}

impl SourceError {
    /// Transport failures, timeouts, throttling and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport(_) | SourceError::Timeout(_) => true,
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Caller mistakes: the only errors the aggregation core surfaces.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("Unsupported source '{requested}'. Supported: [{}]", .supported.join(", "))]
    UnsupportedSource {
        requested: String,
        supported: Vec<String>,
    },
}

impl AggregatorError {
    pub fn unsupported(requested: &str) -> Self {
        AggregatorError::UnsupportedSource {
            requested: requested.to_string(),
            supported: SourceName::ALL.iter().map(|s| s.to_string()).collect(),
        }
    }
}
