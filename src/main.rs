//! Media trend aggregator — binary entrypoint.
//! Boots the Axum HTTP server with settings, adapters, recommender and metrics.

use anyhow::Context;
use media_trend_aggregator::{api, metrics::Metrics, Settings};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
/// `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("media_trend_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // try_init: the runtime may already have installed a subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let settings = Settings::load()?;
    let creds = settings.credentials();
    tracing::info!(
        name = %settings.server_name,
        region = %settings.default_region,
        default_limit = settings.default_limit,
        youtube = creds.youtube,
        reddit = creds.reddit,
        newsapi = creds.newsapi,
        "settings loaded"
    );

    // Recorder first, so series described while wiring the aggregator are kept.
    let metrics = Metrics::init(settings.default_limit)
        .map_err(|e| tracing::warn!(error = %e, "metrics disabled"))
        .ok();

    let state = api::AppState::from_settings(settings.clone()).context("building source adapters")?;
    let mut router = api::create_router(state);
    if let Some(metrics) = metrics {
        router = router.merge(metrics.router());
    }

    Ok(router.into())
}
