// src/ingest/normalize.rs
//! Shared normalization helpers used by every adapter: text cleanup, stable ids,
//! lenient timestamp parsing and log-scaled engagement.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

/// Decode HTML entities, fold whitespace and trim. Provider payloads are
/// plain-text JSON, so angle brackets are content (`Vec<String>`), not markup.
pub fn normalize_text(s: &str) -> String {
    let out = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Normalized description; `None` when the provider sent nothing useful.
/// Never truncated: topic and keyword matching see the full text.
pub fn normalize_description(s: Option<&str>) -> Option<String> {
    let out = normalize_text(s?);
    (!out.is_empty()).then_some(out)
}

/// First 16 hex chars of SHA-256 over the parts, each followed by `|`.
pub fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Lenient timestamp parsing. ISO-8601 first (trailing `Z` accepted), then
/// RFC 2822 style (`Tue, 14 Jan 2025 10:00:00 GMT`). Never fails loudly.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }

    // RFC 2822 knows GMT/UT but not the UTC abbreviation.
    let rfc = match raw.strip_suffix(" UTC") {
        Some(head) => format!("{head} GMT"),
        None => raw.to_string(),
    };
    OffsetDateTime::parse(&rfc, &Rfc2822)
        .ok()
        .and_then(|odt| DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond()))
}

/// Unix seconds (possibly fractional, as Reddit sends them) to UTC.
pub fn timestamp_from_unix(secs: Option<f64>) -> Option<DateTime<Utc>> {
    let secs = secs.filter(|s| s.is_finite() && *s > 0.0)?;
    DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0)
}

/// `log10(max(v, 1))`; zero for missing, negative or non-finite input.
pub fn log_scale(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.max(1.0).log10()
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Case-insensitive substring test of any keyword against `text`.
pub fn text_contains_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| {
        let k = k.as_ref().to_lowercase();
        !k.is_empty() && lowered.contains(&k)
    })
}

/// Counts arrive as JSON numbers or numeric strings depending on the provider.
pub fn count_from_json(v: Option<&serde_json::Value>) -> f64 {
    let n = match v {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}
