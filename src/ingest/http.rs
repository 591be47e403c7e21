// src/ingest/http.rs
//! Thin JSON-over-HTTP helper shared by the adapters: per-request timeout plus
//! a bounded number of attempts with exponential backoff.

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::config::HttpPolicy;
use crate::ingest::error::SourceError;

const USER_AGENT: &str = "media-trend-aggregator/0.1";

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: HttpPolicy,
}

impl HttpFetcher {
    /// Fails only when the TLS backend cannot be initialised.
    pub fn new(policy: HttpPolicy) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(policy.timeout.min(Duration::from_secs(5)))
            .timeout(policy.timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build HTTP client");
                SourceError::from(e)
            })?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> HttpPolicy {
        self.policy
    }

    /// GET `url` with query pairs and headers, decoded as JSON.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> Result<Value, SourceError> {
        self.with_retries(|| {
            let mut req = self.client.get(url).query(query);
            for (k, v) in headers {
                req = req.header(*k, v.as_str());
            }
            req
        })
        .await
    }

    /// POST a form body with basic auth, decoded as JSON (used for OAuth token exchange).
    pub async fn post_form_basic(
        &self,
        url: &str,
        form: &[(&str, &str)],
        user: &str,
        password: &str,
        headers: &[(&str, String)],
    ) -> Result<Value, SourceError> {
        self.with_retries(|| {
            let mut req = self
                .client
                .post(url)
                .basic_auth(user, Some(password))
                .form(form);
            for (k, v) in headers {
                req = req.header(*k, v.as_str());
            }
            req
        })
        .await
    }

    async fn with_retries<F>(&self, build: F) -> Result<Value, SourceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match send_once(build()).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let wait = self.policy.backoff_for(attempt);
                    tracing::debug!(error = %e, attempt, wait_ms = wait.as_millis() as u64, "upstream call failed; retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn send_once(req: RequestBuilder) -> Result<Value, SourceError> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body: String = resp.text().await.unwrap_or_default().chars().take(300).collect();
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
