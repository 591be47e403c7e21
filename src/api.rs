// src/api.rs
//! HTTP boundary: tool calls and discovery resources as JSON endpoints.
//! Upstream failures never surface here as errors; only caller mistakes do.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::analyze::{explain_ranking, Explanation, Recommendation, RecommendError, Recommender};
use crate::config::Settings;
use crate::ingest::error::{AggregatorError, SourceError};
use crate::ingest::types::MediaItem;
use crate::ingest::Aggregator;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub recommender: Arc<Recommender>,
}

impl AppState {
    /// Production wiring: real adapters for every registered source.
    pub fn from_settings(settings: Settings) -> Result<Self, SourceError> {
        let aggregator = Aggregator::from_settings(&settings)?;
        Ok(Self::with_aggregator(settings, aggregator))
    }

    pub fn with_aggregator(settings: Settings, aggregator: Aggregator) -> Self {
        let recommender = Recommender::from_settings(&settings, aggregator);
        Self {
            settings: Arc::new(settings),
            recommender: Arc::new(recommender),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/resources/status", get(status_resource))
        .route("/resources/sources", get(sources_resource))
        .route("/tools/get_trends", post(get_trends))
        .route("/tools/get_trends_by_source", post(get_trends_by_source))
        .route("/tools/recommend", post(recommend))
        .route("/tools/explain", post(explain))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Alias kept for callers that expect `api::router`.
pub fn router(state: AppState) -> Router {
    create_router(state)
}

/// Caller-facing failures, rendered as 400 with a JSON body.
#[derive(Debug)]
pub enum ApiError {
    UnsupportedSource(AggregatorError),
    BadRequest(String),
}

impl From<AggregatorError> for ApiError {
    fn from(e: AggregatorError) -> Self {
        ApiError::UnsupportedSource(e)
    }
}

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self {
        match e {
            RecommendError::Source(inner) => ApiError::UnsupportedSource(inner),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::UnsupportedSource(e) => {
                let AggregatorError::UnsupportedSource { supported, .. } = e;
                json!({ "error": e.to_string(), "supported": supported })
            }
            ApiError::BadRequest(msg) => json!({ "error": msg }),
        };
        tracing::debug!(error = %body, "rejecting tool call");
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

fn default_trends_limit() -> i64 {
    20
}
fn default_recommend_limit() -> i64 {
    10
}

#[derive(Deserialize)]
struct TrendsReq {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default = "default_trends_limit")]
    limit: i64,
}

#[derive(Deserialize)]
struct TrendsBySourceReq {
    source: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default = "default_trends_limit")]
    limit: i64,
}

#[derive(Deserialize)]
struct RecommendReq {
    topic: String,
    #[serde(default)]
    user_prefs: Option<Value>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default = "default_recommend_limit")]
    limit: i64,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct ExplainReq {
    item_id: String,
}

async fn get_trends(
    State(state): State<AppState>,
    Json(req): Json<TrendsReq>,
) -> Json<Vec<MediaItem>> {
    let items = state
        .recommender
        .aggregator()
        .fetch_trends(req.topic, req.region, req.limit)
        .await;
    Json(items)
}

async fn get_trends_by_source(
    State(state): State<AppState>,
    Json(req): Json<TrendsBySourceReq>,
) -> Result<Json<Vec<MediaItem>>, ApiError> {
    let items = state
        .recommender
        .aggregator()
        .fetch_trends_by_source(&req.source, req.topic, req.region, req.limit)
        .await?;
    Ok(Json(items))
}

async fn recommend(
    State(state): State<AppState>,
    Json(req): Json<RecommendReq>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let recs = state
        .recommender
        .recommend(
            &req.topic,
            req.user_prefs.as_ref(),
            req.region,
            req.limit,
            req.source.as_deref(),
        )
        .await?;
    Ok(Json(recs))
}

async fn explain(Json(req): Json<ExplainReq>) -> Json<Explanation> {
    Json(explain_ranking(&req.item_id))
}

async fn status_resource(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.settings.server_name,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn sources_resource(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "sources": state.recommender.list_supported_sources(),
        "default_region": state.settings.default_region,
        "configured": state.settings.credentials(),
    }))
}
