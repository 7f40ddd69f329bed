//! Core data model: articles, summaries, and ingest run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derive the stable primary identity for an article.
/// Re-fetching the same upstream item must always yield the same id.
pub fn article_id(source: &str, external_id: &str) -> String {
    format!("{source}-{external_id}")
}

/// A normalized news item as stored and served.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Primary key: `{source}-{external_id}`.
    pub id: String,
    pub source: String,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    /// At most 4 labels, never empty (falls back to the catch-all tag).
    pub tags: Vec<String>,
    pub points: Option<i64>,
    pub comment_count: Option<i64>,
    /// Link to the upstream discussion thread, when the source has one.
    pub comments_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_source: Option<SummarySource>,
    /// Decayed popularity score, recomputed at every fetch.
    pub hotness: f64,
}

/// Stored summary payload. Older rows carry a plain sentence; newer rows the
/// structured three-field shape. Read paths must match on the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Summary {
    Structured(StructuredSummary),
    Legacy(String),
}

/// Three-field synopsis produced by the summarizer. `what` and
/// `why_it_matters` are required; a missing field fails deserialization,
/// which is exactly how malformed model output gets rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredSummary {
    pub what: String,
    #[serde(rename = "whyItMatters")]
    pub why_it_matters: String,
    #[serde(rename = "keyDetail", skip_serializing_if = "Option::is_none")]
    pub key_detail: Option<String>,
}

/// Which enrichment inputs contributed to a generated summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    /// Generated from the title and engagement numbers alone.
    Title,
    /// Extracted page content was part of the prompt.
    Content,
    /// Top discussion comments were part of the prompt.
    Comments,
}

impl SummarySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarySource::Title => "title",
            SummarySource::Content => "content",
            SummarySource::Comments => "comments",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "title" => Some(SummarySource::Title),
            "content" => Some(SummarySource::Content),
            "comments" => Some(SummarySource::Comments),
            _ => None,
        }
    }
}

/// Display-only temperature classification derived from hotness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HotnessTier {
    Hot,
    Warm,
    Normal,
}

impl HotnessTier {
    pub fn from_score(score: f64) -> Self {
        if score > 5.0 {
            HotnessTier::Hot
        } else if score > 2.0 {
            HotnessTier::Warm
        } else {
            HotnessTier::Normal
        }
    }
}

/// Lifecycle of one pipeline execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Audit record of one ingest run. Created in `running` state, finalized
/// exactly once as `completed` or `failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub fetched: i64,
    pub inserted: i64,
    pub updated: i64,
    pub summarized: i64,
    pub errors: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestRun {
    pub fn started(id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            fetched: 0,
            inserted: 0,
            updated: 0,
            summarized: 0,
            errors: 0,
            error: None,
        }
    }
}
