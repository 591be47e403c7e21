// src/config/settings.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyze::scoring::ScoringWeights;

pub const DEFAULT_CONFIG_PATH: &str = "config/aggregator.toml";
pub const ENV_CONFIG_PATH: &str = "AGGREGATOR_CONFIG_PATH";

/// Upper bounds for the HTTP policy; larger configured values are clamped.
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_ATTEMPTS: u32 = 10;
const MAX_BACKOFF_SECS: u64 = 4;

fn default_server_name() -> String {
    "MediaAggregatorMCP".to_string()
}
fn default_region() -> String {
    "IN".to_string()
}
fn default_limit() -> i64 {
    20
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_secs() -> f64 {
    0.5
}

/// Process-wide settings, built once at startup and handed to constructors.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default = "default_limit")]
    pub default_limit: i64,

    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per upstream call (values below 1 behave as 1).
    #[serde(default = "default_max_retries")]
    pub request_max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub request_retry_backoff_secs: f64,

    #[serde(default)]
    pub youtube_api_key: Option<String>,
    #[serde(default)]
    pub newsapi_key: Option<String>,
    #[serde(default)]
    pub reddit_client_id: Option<String>,
    #[serde(default)]
    pub reddit_client_secret: Option<String>,
    #[serde(default)]
    pub reddit_user_agent: Option<String>,

    #[serde(default)]
    pub scoring: ScoringWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            default_region: default_region(),
            default_limit: default_limit(),
            request_timeout_secs: default_timeout_secs(),
            request_max_retries: default_max_retries(),
            request_retry_backoff_secs: default_backoff_secs(),
            youtube_api_key: None,
            newsapi_key: None,
            reddit_client_id: None,
            reddit_client_secret: None,
            reddit_user_agent: None,
            scoring: ScoringWeights::default(),
        }
    }
}

/// Which providers have credentials. The core never looks at key formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CredentialPresence {
    pub youtube: bool,
    pub reddit: bool,
    pub newsapi: bool,
}

/// Timeout and retry policy for upstream HTTP calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HttpPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl HttpPolicy {
    /// Worst case for one logical call: every attempt times out and every backoff is paid.
    pub fn budget(&self) -> Duration {
        let mut total = self.timeout.saturating_mul(self.max_attempts);
        for attempt in 1..self.max_attempts {
            total = total.saturating_add(self.backoff_for(attempt));
        }
        total.saturating_add(Duration::from_secs(1))
    }

    /// Exponential backoff after `attempt` failures, capped at 4s.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff
            .saturating_mul(factor)
            .min(Duration::from_secs(MAX_BACKOFF_SECS))
    }
}

impl Settings {
    /// Defaults → optional TOML file → environment.
    ///
    /// File lookup: `$AGGREGATOR_CONFIG_PATH` (must exist), else
    /// `config/aggregator.toml` when present.
    pub fn load() -> Result<Self> {
        let mut settings = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(Path::new(&p))?,
            Err(_) => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        settings.apply_env(&env)?;
        Ok(settings.sanitized())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let s: Settings = toml::from_str(&content)
            .with_context(|| format!("parsing settings TOML {}", path.display()))?;
        Ok(s.sanitized())
    }

    /// Overlay values from an environment map (keys case-insensitive, blanks ignored).
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| -> Option<String> {
            env.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MCP_SERVER_NAME") {
            self.server_name = v;
        }
        if let Some(v) = get("DEFAULT_REGION") {
            self.default_region = v;
        }
        if let Some(v) = get("DEFAULT_LIMIT") {
            self.default_limit = v.parse().context("DEFAULT_LIMIT must be an integer")?;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_secs = v
                .parse()
                .context("REQUEST_TIMEOUT_SECONDS must be a whole number")?;
        }
        if let Some(v) = get("REQUEST_MAX_RETRIES") {
            self.request_max_retries = v
                .parse()
                .context("REQUEST_MAX_RETRIES must be a whole number")?;
        }
        if let Some(v) = get("REQUEST_RETRY_BACKOFF_SECONDS") {
            self.request_retry_backoff_secs = v
                .parse()
                .context("REQUEST_RETRY_BACKOFF_SECONDS must be a number")?;
        }
        if let Some(v) = get("YOUTUBE_API_KEY") {
            self.youtube_api_key = Some(v);
        }
        if let Some(v) = get("NEWSAPI_KEY") {
            self.newsapi_key = Some(v);
        }
        if let Some(v) = get("REDDIT_CLIENT_ID") {
            self.reddit_client_id = Some(v);
        }
        if let Some(v) = get("REDDIT_CLIENT_SECRET") {
            self.reddit_client_secret = Some(v);
        }
        if let Some(v) = get("REDDIT_USER_AGENT") {
            self.reddit_user_agent = Some(v);
        }
        Ok(())
    }

    /// Blank credentials count as absent; nonsensical numbers fall back to defaults.
    fn sanitized(mut self) -> Self {
        for key in [
            &mut self.youtube_api_key,
            &mut self.newsapi_key,
            &mut self.reddit_client_id,
            &mut self.reddit_client_secret,
            &mut self.reddit_user_agent,
        ] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
        if self.default_region.trim().is_empty() {
            self.default_region = default_region();
        }
        if self.default_limit < 0 {
            self.default_limit = default_limit();
        }
        if !(self.request_retry_backoff_secs.is_finite() && self.request_retry_backoff_secs >= 0.0) {
            self.request_retry_backoff_secs = default_backoff_secs();
        }
        self.request_retry_backoff_secs = self.request_retry_backoff_secs.min(MAX_BACKOFF_SECS as f64);
        self.request_timeout_secs = self.request_timeout_secs.min(MAX_TIMEOUT_SECS);
        self.request_max_retries = self.request_max_retries.min(MAX_ATTEMPTS);
        self
    }

    pub fn credentials(&self) -> CredentialPresence {
        CredentialPresence {
            youtube: self.youtube_api_key.is_some(),
            reddit: self.reddit_client_id.is_some()
                && self.reddit_client_secret.is_some()
                && self.reddit_user_agent.is_some(),
            newsapi: self.newsapi_key.is_some(),
        }
    }

    pub fn http_policy(&self) -> HttpPolicy {
        HttpPolicy {
            timeout: Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_TIMEOUT_SECS)),
            max_attempts: self.request_max_retries.clamp(1, MAX_ATTEMPTS),
            // 0.1s floor; anything unrepresentable falls back to the default.
            backoff: Duration::try_from_secs_f64(
                self.request_retry_backoff_secs
                    .max(0.1)
                    .min(MAX_BACKOFF_SECS as f64),
            )
            .unwrap_or_else(|_| Duration::from_secs_f64(default_backoff_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_service_defaults() {
        let s = Settings::default();
        assert_eq!(s.default_region, "IN");
        assert_eq!(s.default_limit, 20);
        assert_eq!(s.credentials(), CredentialPresence { youtube: false, reddit: false, newsapi: false });
    }

    #[test]
    fn env_overrides_and_blank_keys_are_absent() {
        let mut s = Settings::default();
        s.apply_env(&env(&[
            ("youtube_api_key", "yt-key"),
            ("NEWSAPI_KEY", "   "),
            ("DEFAULT_REGION", "US"),
            ("DEFAULT_LIMIT", "7"),
        ]))
        .unwrap();
        let s = s.sanitized();
        assert_eq!(s.default_region, "US");
        assert_eq!(s.default_limit, 7);
        let c = s.credentials();
        assert!(c.youtube);
        assert!(!c.newsapi);
        assert!(!c.reddit);
    }

    #[test]
    fn reddit_needs_all_three_values() {
        let mut s = Settings::default();
        s.apply_env(&env(&[("REDDIT_CLIENT_ID", "id"), ("REDDIT_CLIENT_SECRET", "secret")]))
            .unwrap();
        assert!(!s.credentials().reddit);
        s.apply_env(&env(&[("REDDIT_USER_AGENT", "agg/0.1")])).unwrap();
        assert!(s.credentials().reddit);
    }

    #[test]
    fn bad_numbers_in_env_are_errors() {
        let mut s = Settings::default();
        assert!(s.apply_env(&env(&[("DEFAULT_LIMIT", "lots")])).is_err());
    }

    #[test]
    fn toml_file_with_scoring_table() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("aggregator.toml");
        fs::write(
            &p,
            r#"
default_region = "GB"
newsapi_key = ""

[scoring]
topic_match_bonus = 0.5
"#,
        )
        .unwrap();
        let s = Settings::load_from_file(&p).unwrap();
        assert_eq!(s.default_region, "GB");
        assert_eq!(s.newsapi_key, None);
        assert!((s.scoring.topic_match_bonus - 0.5).abs() < 1e-12);
        assert!((s.scoring.source_bonus - 0.2).abs() < 1e-12);
    }

    #[test]
    fn huge_http_values_are_clamped_not_panicking() {
        let mut s = Settings::default();
        s.apply_env(&env(&[
            ("REQUEST_TIMEOUT_SECONDS", "18446744073709551615"),
            ("REQUEST_MAX_RETRIES", "4294967295"),
            ("REQUEST_RETRY_BACKOFF_SECONDS", "1e30"),
        ]))
        .unwrap();

        // Unsanitized values must still yield a usable policy.
        let raw = s.http_policy();
        assert_eq!(raw.timeout, Duration::from_secs(MAX_TIMEOUT_SECS));
        assert_eq!(raw.max_attempts, MAX_ATTEMPTS);
        assert_eq!(raw.backoff, Duration::from_secs(MAX_BACKOFF_SECS));
        assert!(raw.budget() > raw.timeout);

        let s = s.sanitized();
        assert_eq!(s.request_timeout_secs, MAX_TIMEOUT_SECS);
        assert_eq!(s.request_max_retries, MAX_ATTEMPTS);
        assert_eq!(s.request_retry_backoff_secs, MAX_BACKOFF_SECS as f64);

        let extreme = HttpPolicy {
            timeout: Duration::MAX,
            max_attempts: 1_000,
            backoff: Duration::MAX,
        };
        assert_eq!(extreme.budget(), Duration::MAX);
        assert_eq!(extreme.backoff_for(40), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = HttpPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        };
        assert_eq!(p.backoff_for(1), Duration::from_millis(500));
        assert_eq!(p.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(p.backoff_for(10), Duration::from_secs(4));
        assert_eq!(p.budget(), Duration::from_millis(3000 + 500 + 1000 + 1000));
    }
}
