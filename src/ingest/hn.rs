//! Hacker News source adapter: the Firebase API client and the fetcher that
//! turns raw items into ranked [`Article`]s.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use metrics::counter;
use serde::Deserialize;

use crate::hotness;
use crate::model::{article_id, Article};
use crate::tags;

/// Canonical source label for articles coming from this adapter.
pub const SOURCE: &str = "hackernews";

/// Raw item as returned by `GET /item/{id}.json`. Stories and comments share
/// this shape; fields are all optional because the API omits them freely.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HnItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub by: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub descendants: Option<i64>,
    #[serde(default)]
    pub kids: Option<Vec<u64>>,
    /// Comment body or self-post text, as HTML.
    #[serde(default)]
    pub text: Option<String>,
}

/// The upstream story feed, as a trait so tests can stand in a mock.
#[async_trait]
pub trait StoryFeed: Send + Sync {
    /// Current ranked top-story ids. The only call whose failure is fatal.
    async fn top_story_ids(&self) -> Result<Vec<u64>>;
    /// Single item (story or comment) by id.
    async fn item(&self, id: u64) -> Result<HnItem>;
}

/// Real client against the HN Firebase API.
pub struct HnClient {
    http: reqwest::Client,
    base_url: String,
}

impl HnClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("hn-pulse/0.1 (+story aggregator)")
            .connect_timeout(std::time::Duration::from_secs(4))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl StoryFeed for HnClient {
    async fn top_story_ids(&self) -> Result<Vec<u64>> {
        let url = format!("{}/topstories.json", self.base_url);
        let resp = self.http.get(&url).send().await.context("topstories get")?;
        let ids = resp
            .error_for_status()
            .context("topstories status")?
            .json::<Vec<u64>>()
            .await
            .context("topstories body")?;
        Ok(ids)
    }

    async fn item(&self, id: u64) -> Result<HnItem> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let resp = self.http.get(&url).send().await.context("item get")?;
        let item = resp
            .error_for_status()
            .context("item status")?
            .json::<HnItem>()
            .await
            .context("item body")?;
        Ok(item)
    }
}

/// Result of one fetch pass: assembled articles plus how many item fetches
/// were dropped on the floor.
#[derive(Debug, Default)]
pub struct FetchBatch {
    pub articles: Vec<Article>,
    pub errors: usize,
}

/// Pulls the top N stories and assembles them into ranked articles.
pub struct NewsFetcher {
    feed: Arc<dyn StoryFeed>,
    limit: usize,
    concurrency: usize,
}

impl NewsFetcher {
    pub fn new(feed: Arc<dyn StoryFeed>, limit: usize, concurrency: usize) -> Self {
        Self {
            feed,
            limit,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch the current top stories. Fails only if the id-list call fails;
    /// every per-item failure is tolerated by omission. Output is sorted by
    /// hotness descending (stable, so feed order breaks ties).
    pub async fn fetch_latest(&self) -> Result<FetchBatch> {
        let ids = self
            .feed
            .top_story_ids()
            .await
            .context("fetching top story ids")?;
        let ids: Vec<u64> = ids.into_iter().take(self.limit).collect();

        // Bounded fan-out: at most `concurrency` item requests in flight,
        // results in input-id order.
        let results: Vec<(u64, Result<HnItem>)> = futures::stream::iter(ids.into_iter().map(
            |id| {
                let feed = Arc::clone(&self.feed);
                async move { (id, feed.item(id).await) }
            },
        ))
        .buffered(self.concurrency)
        .collect()
        .await;

        let now = Utc::now();
        let mut batch = FetchBatch::default();
        for (id, res) in results {
            match res {
                Ok(item) => {
                    if let Some(article) = build_article(item, now) {
                        batch.articles.push(article);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = ?e, item = id, "story fetch failed, skipping");
                    counter!("hn_item_errors_total").increment(1);
                    batch.errors += 1;
                }
            }
        }
        counter!("hn_items_fetched_total").increment(batch.articles.len() as u64);

        batch
            .articles
            .sort_by(|a, b| b.hotness.partial_cmp(&a.hotness).unwrap_or(std::cmp::Ordering::Equal));
        Ok(batch)
    }
}

/// Build an [`Article`] from a raw item. Self-text-only posts (no destination
/// URL) and items without a title are dropped.
fn build_article(item: HnItem, fetched_at: DateTime<Utc>) -> Option<Article> {
    let url = item.url.filter(|u| !u.is_empty())?;
    let title = item.title.filter(|t| !t.is_empty())?;
    let published_at = DateTime::from_timestamp(item.time.unwrap_or(0), 0)?;

    let tags = tags::classify(&title, Some(&url));
    let hotness = hotness::score(published_at, item.score, item.descendants, SOURCE);

    Some(Article {
        id: article_id(SOURCE, &item.id.to_string()),
        source: SOURCE.to_string(),
        external_id: item.id.to_string(),
        url,
        title,
        author: item.by,
        published_at,
        fetched_at,
        tags,
        points: item.score,
        comment_count: item.descendants,
        comments_url: Some(format!("https://news.ycombinator.com/item?id={}", item.id)),
        summary: None,
        summary_source: None,
        hotness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(id: u64) -> HnItem {
        HnItem {
            id,
            title: Some(format!("Story {id}")),
            url: Some(format!("https://example.com/{id}")),
            time: Some(Utc::now().timestamp()),
            score: Some(10),
            descendants: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn self_posts_are_dropped() {
        let mut item = story(1);
        item.url = None;
        assert!(build_article(item, Utc::now()).is_none());
    }

    #[test]
    fn built_article_has_identity_tags_and_score() {
        let a = build_article(story(7), Utc::now()).expect("article");
        assert_eq!(a.id, "hackernews-7");
        assert_eq!(a.source, SOURCE);
        assert!(!a.tags.is_empty());
        assert!(a.hotness > 0.0);
        assert_eq!(
            a.comments_url.as_deref(),
            Some("https://news.ycombinator.com/item?id=7")
        );
    }
}
