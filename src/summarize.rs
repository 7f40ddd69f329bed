//! # Summarizer
//!
//! Provider abstraction over a chat-completion backend plus the batch logic
//! that enriches articles with a three-field structured synopsis. Every call
//! is best-effort: a missing key, a failed request, or output that does not
//! parse into the expected shape all yield "no summary", never an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::extract;
use crate::extract::comments::{fetch_top_comments, DEFAULT_COMMENT_LIMIT};
use crate::ingest::hn::{self, StoryFeed};
use crate::model::{Article, StructuredSummary, SummarySource};

/// Fixed instruction sent with every request. The backend must return one
/// JSON object and nothing else.
const SYSTEM_PROMPT: &str = "You are a news analyst. Given a story, respond with a single JSON \
object with exactly these fields: \"what\" (one factual sentence, max 25 words), \
\"whyItMatters\" (why this is significant, max 25 words), and optionally \"keyDetail\" \
(one striking number, quote, or claim). No markdown, no extra keys, no prose outside the JSON.";

/// Page excerpt budget inside the prompt.
const MAX_EXCERPT_CHARS: usize = 800;

/// Chat-completion backend. Implementations must swallow their own failures.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// One completion call. `None` on any failure.
    async fn complete(&self, system: &str, user: &str) -> Option<String>;
    /// Provider name for diagnostics and the status endpoint.
    fn provider_name(&self) -> &'static str;
}

pub type DynAiClient = Arc<dyn AiClient>;

/// Returns `None` always; used when no backend is configured.
pub struct DisabledClient;

#[async_trait]
impl AiClient for DisabledClient {
    async fn complete(&self, _system: &str, _user: &str) -> Option<String> {
        None
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic client for tests and local runs (`AI_TEST_MODE=mock`).
#[derive(Clone)]
pub struct MockClient {
    pub fixed: String,
}

#[async_trait]
impl AiClient for MockClient {
    async fn complete(&self, _system: &str, _user: &str) -> Option<String> {
        Some(self.fixed.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// OpenAI chat-completions provider. Requires an API key.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("hn-pulse/0.1 (+summary generator)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl AiClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Option<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            response_format: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        if self.api_key.is_empty() {
            return None;
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens: 220,
            response_format: serde_json::json!({ "type": "json_object" }),
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "summary completion rejected");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.choices.into_iter().next().map(|c| c.message.content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Factory: mock under `AI_TEST_MODE=mock`, disabled without a key,
/// otherwise the real provider.
pub fn build_ai_client(config: &AppConfig) -> DynAiClient {
    if std::env::var("AI_TEST_MODE").map(|v| v == "mock").unwrap_or(false) {
        return Arc::new(MockClient {
            fixed: r#"{"what":"Mock summary of the story.","whyItMatters":"Mock significance."}"#
                .to_string(),
        });
    }
    match &config.openai_api_key {
        Some(key) => Arc::new(OpenAiClient::new(key.clone(), config.openai_model.clone())),
        None => Arc::new(DisabledClient),
    }
}

/// How one summarization pass gathers context.
#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub fetch_content: bool,
    pub fetch_comments: bool,
    pub concurrency: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            fetch_content: true,
            fetch_comments: false,
            concurrency: 3,
        }
    }
}

/// A successfully generated summary plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: StructuredSummary,
    pub source: SummarySource,
}

/// Drives per-article context gathering and the completion call.
pub struct Summarizer {
    client: DynAiClient,
    page_http: reqwest::Client,
    feed: Arc<dyn StoryFeed>,
}

impl Summarizer {
    pub fn new(client: DynAiClient, feed: Arc<dyn StoryFeed>) -> Self {
        Self {
            client,
            page_http: extract::page_client(),
            feed,
        }
    }

    pub fn enabled(&self) -> bool {
        self.client.provider_name() != "disabled"
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Summarize one article. Context is built progressively: page excerpt
    /// (provenance `content`), then top discussion comments (provenance
    /// `comments`, superseding content), else title-only.
    pub async fn summarize_one(
        &self,
        article: &Article,
        opts: &SummarizeOptions,
    ) -> Option<SummaryOutcome> {
        if !self.enabled() {
            return None;
        }

        let mut provenance = SummarySource::Title;

        let mut excerpt: Option<String> = None;
        if opts.fetch_content {
            if let Some(page) = extract::fetch_page(&self.page_http, &article.url).await {
                if let Some(content) = page.content.or(page.description) {
                    excerpt = Some(truncate_chars(&content, MAX_EXCERPT_CHARS));
                    provenance = SummarySource::Content;
                }
            }
        }

        let mut comments: Vec<String> = Vec::new();
        if opts.fetch_comments && article.source == hn::SOURCE {
            if let Ok(story_id) = article.external_id.parse::<u64>() {
                comments =
                    fetch_top_comments(self.feed.as_ref(), story_id, DEFAULT_COMMENT_LIMIT).await;
                if !comments.is_empty() {
                    provenance = SummarySource::Comments;
                }
            }
        }

        let user = build_payload(article, excerpt.as_deref(), &comments);
        let raw = self.client.complete(SYSTEM_PROMPT, &user).await?;
        match parse_summary(&raw) {
            Some(summary) => {
                counter!("ai_summaries_total").increment(1);
                Some(SummaryOutcome {
                    summary,
                    source: provenance,
                })
            }
            None => {
                tracing::warn!(article = %article.id, "summary output failed validation");
                counter!("ai_summary_rejects_total").increment(1);
                None
            }
        }
    }

    /// Summarize a batch under a small concurrency cap. The output vector is
    /// aligned with the input: same length, same order, `None` where no
    /// summary was produced.
    pub async fn summarize_batch(
        &self,
        articles: &[Article],
        opts: &SummarizeOptions,
    ) -> Vec<Option<SummaryOutcome>> {
        // Equivalent to `stream::iter(..).buffered(cap)`: results are yielded
        // in input order while at most `cap` summaries run concurrently. Built
        // with an explicit loop rather than a mapped closure because a closure
        // returning a future that borrows `self` cannot be made higher-ranked
        // (rust-lang/rust#70263), which trips axum's handler bound.
        let cap = opts.concurrency.max(1);
        let mut out = Vec::with_capacity(articles.len());
        let mut in_flight = futures::stream::FuturesOrdered::new();
        let mut pending = articles.iter();
        for a in pending.by_ref().take(cap) {
            in_flight.push_back(self.summarize_one(a, opts));
        }
        while let Some(outcome) = in_flight.next().await {
            out.push(outcome);
            if let Some(a) = pending.next() {
                in_flight.push_back(self.summarize_one(a, opts));
            }
        }
        out
    }
}

/// Assemble the user payload for the completion call.
fn build_payload(article: &Article, excerpt: Option<&str>, comments: &[String]) -> String {
    let mut out = format!(
        "Title: {}\nSource: {}\nPoints: {}  Comments: {}\nTags: {}",
        article.title,
        article.source,
        article.points.unwrap_or(0),
        article.comment_count.unwrap_or(0),
        article.tags.join(", "),
    );
    if let Some(e) = excerpt {
        out.push_str("\n\nArticle excerpt:\n");
        out.push_str(e);
    }
    if !comments.is_empty() {
        out.push_str("\n\nTop discussion comments:");
        for (i, c) in comments.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, c));
        }
    }
    out
}

/// Parse and validate the model output. Anything short of a JSON object with
/// non-empty `what` and `whyItMatters` is a failure.
pub fn parse_summary(raw: &str) -> Option<StructuredSummary> {
    let cleaned = strip_fences(raw);
    let parsed: StructuredSummary = serde_json::from_str(cleaned).ok()?;
    if parsed.what.trim().is_empty() || parsed.why_it_matters.trim().is_empty() {
        return None;
    }
    Some(parsed)
}

/// Models occasionally wrap JSON in a markdown fence despite instructions.
fn strip_fences(s: &str) -> &str {
    let t = s.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
