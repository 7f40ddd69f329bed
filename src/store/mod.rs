//! # Persistence Gateway
//!
//! The merge/upsert and query contract the pipeline depends on. Two
//! implementations: [`memory::MemoryStore`] when no database is configured
//! (and in tests), [`postgres::PgStore`] against Postgres.
//!
//! The one contract detail that matters most: `merge_upsert` must never
//! erase an existing summary, regardless of what the incoming article
//! carries. Both backends implement that as a single write that simply
//! excludes summary fields on update, so the guarantee holds even if two
//! runs overlap.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{Article, IngestRun, StructuredSummary, SummarySource};

/// Ordering options for article listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    /// Stored hotness, descending. The default ranking.
    Hot,
    /// Publish time, descending.
    New,
    /// Comment count, descending, nulls last.
    MostDiscussed,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hot" => Some(SortOrder::Hot),
            "new" => Some(SortOrder::New),
            "mostDiscussed" => Some(SortOrder::MostDiscussed),
            _ => None,
        }
    }
}

/// Publish-time window for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(TimeRange::Day),
            "7d" => Some(TimeRange::Week),
            "30d" => Some(TimeRange::Month),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    /// Lower publish-time bound, or `None` for `all`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Day => Some(now - Duration::hours(24)),
            TimeRange::Week => Some(now - Duration::days(7)),
            TimeRange::Month => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

/// Parameters for the standard listing query.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    pub sort: SortOrder,
    pub range: TimeRange,
    /// Keep articles carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    pub limit: u32,
    pub offset: u32,
}

/// Parameters for full-text search. With no explicit `sort`, results are
/// ranked by text relevance.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub tags: Option<Vec<String>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub sort: Option<SortOrder>,
    pub limit: u32,
    pub offset: u32,
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total_count: u64,
}

/// Outcome of a merge-upsert pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub inserted: u64,
    pub updated: u64,
    pub errors: u64,
}

/// The storage contract. The store is the sole arbiter of merge conflicts.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Backend label for the status endpoint ("memory" / "postgres").
    fn backend(&self) -> &'static str;

    async fn exists(&self, source: &str, external_id: &str) -> Result<bool>;

    /// Insert-or-update keyed by primary identity. Existing rows keep their
    /// summary fields untouched. Per-row failures are counted, not raised.
    async fn merge_upsert(&self, articles: &[Article]) -> Result<MergeStats>;

    async fn query(&self, q: &ArticleQuery) -> Result<ArticlePage>;

    async fn search(&self, q: &SearchQuery) -> Result<ArticlePage>;

    /// Unsummarized articles, hottest first.
    async fn find_needing_summary(&self, limit: u32) -> Result<Vec<Article>>;

    /// Attach a generated summary. Returns false when the id is unknown.
    async fn update_summary(
        &self,
        id: &str,
        summary: &StructuredSummary,
        source: SummarySource,
    ) -> Result<bool>;

    /// Open a new run record in `running` state, returning its id.
    async fn record_run(&self, started_at: DateTime<Utc>) -> Result<i64>;

    /// Finalize (or otherwise rewrite) a run record.
    async fn update_run(&self, run: &IngestRun) -> Result<()>;

    /// Most recent runs, newest first.
    async fn recent_runs(&self, limit: u32) -> Result<Vec<IngestRun>>;
}

pub type DynStore = Arc<dyn ArticleStore>;
