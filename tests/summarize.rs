// tests/summarize.rs
//
// Summarizer contract over mock backends: structural validation of model
// output, batch order/count preservation, provenance, and the disabled path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use hn_pulse::ingest::hn::{HnItem, StoryFeed};
use hn_pulse::model::{article_id, Article, SummarySource};
use hn_pulse::summarize::{
    AiClient, DisabledClient, MockClient, SummarizeOptions, Summarizer,
};

/// Feed exposing one story with three comment children.
struct CommentFeed;

#[async_trait]
impl StoryFeed for CommentFeed {
    async fn top_story_ids(&self) -> Result<Vec<u64>> {
        Ok(vec![1])
    }

    async fn item(&self, id: u64) -> Result<HnItem> {
        match id {
            1 => Ok(HnItem {
                id: 1,
                kids: Some(vec![11, 12, 13, 14]),
                ..Default::default()
            }),
            11 | 12 => Ok(HnItem {
                id,
                text: Some(format!("<p>Comment body {id} with &amp; markup</p>")),
                ..Default::default()
            }),
            // A child without text: dropped silently.
            13 => Ok(HnItem {
                id,
                ..Default::default()
            }),
            _ => bail!("no such item"),
        }
    }
}

/// Backend returning a canned payload and counting calls.
struct CountingClient {
    payload: String,
    calls: AtomicUsize,
}

#[async_trait]
impl AiClient for CountingClient {
    async fn complete(&self, _system: &str, _user: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(self.payload.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

fn article(id: u64) -> Article {
    Article {
        id: article_id("hackernews", &id.to_string()),
        source: "hackernews".into(),
        external_id: id.to_string(),
        // Unroutable local port so content fetches fail fast when enabled.
        url: format!("http://127.0.0.1:1/story/{id}"),
        title: format!("Story {id}"),
        author: None,
        published_at: Utc::now(),
        fetched_at: Utc::now(),
        tags: vec!["Tech".into()],
        points: Some(10),
        comment_count: Some(4),
        comments_url: None,
        summary: None,
        summary_source: None,
        hotness: 1.0,
    }
}

fn title_only() -> SummarizeOptions {
    SummarizeOptions {
        fetch_content: false,
        fetch_comments: false,
        concurrency: 3,
    }
}

const VALID: &str = r#"{"what":"A thing shipped.","whyItMatters":"Big deal.","keyDetail":"2x"}"#;

#[tokio::test]
async fn valid_output_yields_title_provenance_without_enrichment() {
    let summarizer = Summarizer::new(
        Arc::new(MockClient {
            fixed: VALID.to_string(),
        }),
        Arc::new(CommentFeed),
    );
    let out = summarizer
        .summarize_one(&article(1), &title_only())
        .await
        .expect("summary");
    assert_eq!(out.source, SummarySource::Title);
    assert_eq!(out.summary.what, "A thing shipped.");
    assert_eq!(out.summary.key_detail.as_deref(), Some("2x"));
}

#[tokio::test]
async fn missing_required_field_is_treated_as_backend_failure() {
    let summarizer = Summarizer::new(
        Arc::new(MockClient {
            fixed: r#"{"what":"A thing shipped."}"#.to_string(),
        }),
        Arc::new(CommentFeed),
    );
    assert!(summarizer
        .summarize_one(&article(1), &title_only())
        .await
        .is_none());
}

#[tokio::test]
async fn disabled_backend_returns_no_summary() {
    let summarizer = Summarizer::new(Arc::new(DisabledClient), Arc::new(CommentFeed));
    assert!(!summarizer.enabled());
    assert!(summarizer
        .summarize_one(&article(1), &title_only())
        .await
        .is_none());
}

#[tokio::test]
async fn comment_context_marks_comment_provenance() {
    let summarizer = Summarizer::new(
        Arc::new(MockClient {
            fixed: VALID.to_string(),
        }),
        Arc::new(CommentFeed),
    );
    let opts = SummarizeOptions {
        fetch_content: false,
        fetch_comments: true,
        concurrency: 3,
    };
    let out = summarizer
        .summarize_one(&article(1), &opts)
        .await
        .expect("summary");
    assert_eq!(out.source, SummarySource::Comments);
}

#[tokio::test]
async fn content_fetch_failure_degrades_to_title_provenance() {
    // fetch_content enabled, but the URL is unreachable: provenance stays
    // title-only and the summary still goes through.
    let summarizer = Summarizer::new(
        Arc::new(MockClient {
            fixed: VALID.to_string(),
        }),
        Arc::new(CommentFeed),
    );
    let opts = SummarizeOptions {
        fetch_content: true,
        fetch_comments: false,
        concurrency: 3,
    };
    let out = summarizer
        .summarize_one(&article(1), &opts)
        .await
        .expect("summary");
    assert_eq!(out.source, SummarySource::Title);
}

#[tokio::test]
async fn batch_preserves_input_order_and_count() {
    let client = Arc::new(CountingClient {
        payload: VALID.to_string(),
        calls: AtomicUsize::new(0),
    });
    let summarizer = Summarizer::new(client.clone(), Arc::new(CommentFeed));

    let articles: Vec<Article> = (1..=7).map(article).collect();
    let out = summarizer.summarize_batch(&articles, &title_only()).await;

    assert_eq!(out.len(), articles.len());
    assert!(out.iter().all(|o| o.is_some()));
    assert_eq!(client.calls.load(Ordering::SeqCst), 7);
}
