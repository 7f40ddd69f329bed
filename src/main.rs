//! hn-pulse — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the store, the pipeline, and routes.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hn_pulse::ingest::hn::{HnClient, NewsFetcher, StoryFeed};
use hn_pulse::metrics::Metrics;
use hn_pulse::store::{memory::MemoryStore, postgres::PgStore, DynStore};
use hn_pulse::summarize::{build_ai_client, Summarizer};
use hn_pulse::{api, AppConfig, AppState, Pipeline};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - PULSE_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("PULSE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hn_pulse=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    let config = Arc::new(AppConfig::from_env());

    // Storage: Postgres when configured and reachable, in-memory otherwise.
    let store: DynStore = match &config.database_url {
        Some(url) => match PgStore::connect(url).await {
            Ok(pg) => Arc::new(pg),
            Err(e) => {
                tracing::warn!(error = ?e, "database unavailable, falling back to in-memory store");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            tracing::info!("no DATABASE_URL configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let feed: Arc<dyn StoryFeed> = Arc::new(HnClient::new(config.hn_base_url.clone()));
    let summarizer = Arc::new(Summarizer::new(build_ai_client(&config), Arc::clone(&feed)));
    let fetcher = NewsFetcher::new(
        Arc::clone(&feed),
        config.fetch_limit,
        config.fetch_concurrency,
    );
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&store),
        fetcher,
        Arc::clone(&summarizer),
        config.summary_limit,
        config.summary_concurrency,
    ));

    let metrics = Metrics::init();
    let state = AppState {
        config,
        store,
        pipeline,
    };
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
