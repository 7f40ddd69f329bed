//! Process configuration, resolved once at startup from the environment and
//! passed by reference into each component. Missing credentials disable the
//! dependent capability instead of failing the boot.

use std::env;

pub const DEFAULT_HN_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// Everything the service reads from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the Hacker News Firebase API.
    pub hn_base_url: String,
    /// How many top stories to pull per run.
    pub fetch_limit: usize,
    /// Concurrency bound for item-detail fetches.
    pub fetch_concurrency: usize,
    /// How many unsummarized articles to enrich per run.
    pub summary_limit: u32,
    /// Concurrency bound for summarization (much lower than fetch:
    /// each call is far more expensive).
    pub summary_concurrency: usize,
    /// Shared secret for the ingest trigger. Checked only when both the
    /// secret and a bearer token are present, so a same-origin UI can still
    /// trigger a manual refresh without credentials.
    pub ingest_secret: Option<String>,
    /// Postgres connection string. Absent -> in-memory store.
    pub database_url: Option<String>,
    /// OpenAI credentials. Absent -> summarization disabled.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            hn_base_url: env_or("HN_BASE_URL", DEFAULT_HN_BASE_URL),
            fetch_limit: env_parse("HN_FETCH_LIMIT", 30),
            fetch_concurrency: env_parse("HN_FETCH_CONCURRENCY", 10),
            summary_limit: env_parse("SUMMARY_LIMIT", 15),
            summary_concurrency: env_parse("SUMMARY_CONCURRENCY", 3),
            ingest_secret: env_nonempty("INGEST_SECRET"),
            database_url: env_nonempty("DATABASE_URL"),
            openai_api_key: env_nonempty("OPENAI_API_KEY"),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env_nonempty(name).unwrap_or_else(|| default.to_string())
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
