//! HTTP surface: the ingest trigger, status/run history, and the two
//! read endpoints the browser UI feeds from.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::ingest::Pipeline;
use crate::model::{Article, HotnessTier, IngestRun, RunStatus};
use crate::store::{ArticleQuery, DynStore, SearchQuery, SortOrder, TimeRange};

const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 30;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DynStore,
    pub pipeline: Arc<Pipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/ingest", post(trigger_ingest))
        .route("/api/status", get(status))
        .route("/api/articles", get(list_articles))
        .route("/api/search", get(search_articles))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Article plus its display-only temperature tier.
#[derive(Serialize)]
struct ArticleOut {
    #[serde(flatten)]
    article: Article,
    tier: HotnessTier,
}

impl From<Article> for ArticleOut {
    fn from(article: Article) -> Self {
        let tier = HotnessTier::from_score(article.hotness);
        Self { article, tier }
    }
}

#[derive(Serialize)]
struct PageOut {
    articles: Vec<ArticleOut>,
    total_count: u64,
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.into() }))).into_response()
}

fn internal_error(msg: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": msg.into() })),
    )
        .into_response()
}

/// Bearer token from the Authorization header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trigger one ingest run. The secret check only applies when both a
/// configured secret and a caller token are present; either side missing
/// skips the check so a same-origin UI refresh works without credentials.
async fn trigger_ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let (Some(secret), Some(token)) = (&state.config.ingest_secret, bearer_token(&headers)) {
        if *secret != token {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "invalid ingest token" })),
            )
                .into_response();
        }
    }

    match state.pipeline.run().await {
        Ok(run) => {
            let code = match run.status {
                RunStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::OK,
            };
            (code, Json(run)).into_response()
        }
        Err(e) => internal_error(format!("ingest run could not start: {e:#}")),
    }
}

#[derive(Serialize)]
struct StatusOut {
    store_backend: &'static str,
    ai_provider: &'static str,
    ai_enabled: bool,
    fetch_limit: usize,
    summary_limit: u32,
    recent_runs: Vec<IngestRun>,
}

async fn status(State(state): State<AppState>) -> Response {
    let recent_runs = match state.store.recent_runs(10).await {
        Ok(runs) => runs,
        Err(e) => return internal_error(format!("run history unavailable: {e:#}")),
    };
    let summarizer = state.pipeline.summarizer();
    Json(StatusOut {
        store_backend: state.store.backend(),
        ai_provider: summarizer.provider_name(),
        ai_enabled: summarizer.enabled(),
        fetch_limit: state.config.fetch_limit,
        summary_limit: state.config.summary_limit,
        recent_runs,
    })
    .into_response()
}

#[derive(Deserialize)]
struct ListParams {
    sort: Option<String>,
    range: Option<String>,
    /// Comma-separated tag labels.
    tags: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

fn parse_tags(raw: &Option<String>) -> Option<Vec<String>> {
    let tags: Vec<String> = raw
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if tags.is_empty() {
        None
    } else {
        Some(tags)
    }
}

async fn list_articles(State(state): State<AppState>, Query(p): Query<ListParams>) -> Response {
    let sort = match p.sort.as_deref() {
        None => SortOrder::Hot,
        Some(raw) => match SortOrder::parse(raw) {
            Some(s) => s,
            None => return bad_request(format!("unknown sort '{raw}'")),
        },
    };
    let range = match p.range.as_deref() {
        None => TimeRange::All,
        Some(raw) => match TimeRange::parse(raw) {
            Some(r) => r,
            None => return bad_request(format!("unknown range '{raw}'")),
        },
    };

    let query = ArticleQuery {
        sort,
        range,
        tags: parse_tags(&p.tags),
        limit: p.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        offset: p.offset.unwrap_or(0),
    };
    match state.store.query(&query).await {
        Ok(page) => Json(PageOut {
            articles: page.articles.into_iter().map(ArticleOut::from).collect(),
            total_count: page.total_count,
        })
        .into_response(),
        Err(e) => internal_error(format!("query failed: {e:#}")),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    tags: Option<String>,
    /// RFC 3339 timestamps.
    from: Option<String>,
    to: Option<String>,
    sort: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn search_articles(
    State(state): State<AppState>,
    Query(p): Query<SearchParams>,
) -> Response {
    let text = match p.q.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return bad_request("missing search text 'q'"),
    };
    let sort = match p.sort.as_deref() {
        None => None,
        Some(raw) => match SortOrder::parse(raw) {
            Some(s) => Some(s),
            None => return bad_request(format!("unknown sort '{raw}'")),
        },
    };
    let from = match p.from.as_deref() {
        None => None,
        Some(raw) => match parse_ts(raw) {
            Some(ts) => Some(ts),
            None => return bad_request(format!("invalid 'from' timestamp '{raw}'")),
        },
    };
    let to = match p.to.as_deref() {
        None => None,
        Some(raw) => match parse_ts(raw) {
            Some(ts) => Some(ts),
            None => return bad_request(format!("invalid 'to' timestamp '{raw}'")),
        },
    };

    let query = SearchQuery {
        text,
        tags: parse_tags(&p.tags),
        from,
        to,
        sort,
        limit: p.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        offset: p.offset.unwrap_or(0),
    };
    match state.store.search(&query).await {
        Ok(page) => Json(PageOut {
            articles: page.articles.into_iter().map(ArticleOut::from).collect(),
            total_count: page.total_count,
        })
        .into_response(),
        Err(e) => internal_error(format!("search failed: {e:#}")),
    }
}
