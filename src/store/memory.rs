//! In-process store used when no database is configured, and by tests.
//! Approximates the Postgres behavior; the merge/summary-protection
//! semantics are identical.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{article_id, Article, IngestRun, Summary, StructuredSummary, SummarySource};
use crate::store::{
    ArticlePage, ArticleQuery, ArticleStore, MergeStats, SearchQuery, SortOrder,
};

#[derive(Default)]
struct Inner {
    articles: HashMap<String, Article>,
    runs: Vec<IngestRun>,
    next_run_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort_articles(sort: SortOrder, articles: &mut [Article]) {
        match sort {
            SortOrder::Hot => articles.sort_by(|a, b| {
                b.hotness
                    .partial_cmp(&a.hotness)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }),
            SortOrder::New => articles.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
            SortOrder::MostDiscussed => articles.sort_by(|a, b| {
                // Descending, rows without a count last.
                match (b.comment_count, a.comment_count) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            }),
        }
    }

    fn matches_tags(article: &Article, tags: &Option<Vec<String>>) -> bool {
        match tags {
            None => true,
            Some(wanted) => wanted.iter().any(|t| article.tags.contains(t)),
        }
    }

    fn page(mut articles: Vec<Article>, limit: u32, offset: u32) -> ArticlePage {
        let total_count = articles.len() as u64;
        let start = (offset as usize).min(articles.len());
        let end = (start + limit as usize).min(articles.len());
        articles = articles[start..end].to_vec();
        ArticlePage {
            articles,
            total_count,
        }
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, source: &str, external_id: &str) -> Result<bool> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.articles.contains_key(&article_id(source, external_id)))
    }

    async fn merge_upsert(&self, articles: &[Article]) -> Result<MergeStats> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let mut stats = MergeStats::default();
        for incoming in articles {
            match inner.articles.get_mut(&incoming.id) {
                Some(existing) => {
                    let mut merged = incoming.clone();
                    // An already-attached summary always wins over the
                    // incoming row (which never legitimately carries one).
                    if existing.summary.is_some() {
                        merged.summary = existing.summary.clone();
                        merged.summary_source = existing.summary_source;
                    }
                    *existing = merged;
                    stats.updated += 1;
                }
                None => {
                    inner.articles.insert(incoming.id.clone(), incoming.clone());
                    stats.inserted += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn query(&self, q: &ArticleQuery) -> Result<ArticlePage> {
        let inner = self.inner.read().expect("store lock poisoned");
        let cutoff = q.range.cutoff(Utc::now());
        let mut hits: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| cutoff.map(|c| a.published_at >= c).unwrap_or(true))
            .filter(|a| Self::matches_tags(a, &q.tags))
            .cloned()
            .collect();
        Self::sort_articles(q.sort, &mut hits);
        Ok(Self::page(hits, q.limit, q.offset))
    }

    async fn search(&self, q: &SearchQuery) -> Result<ArticlePage> {
        let inner = self.inner.read().expect("store lock poisoned");
        let terms: Vec<String> = q
            .text
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();

        let mut scored: Vec<(usize, Article)> = inner
            .articles
            .values()
            .filter(|a| Self::matches_tags(a, &q.tags))
            .filter(|a| q.from.map(|f| a.published_at >= f).unwrap_or(true))
            .filter(|a| q.to.map(|t| a.published_at <= t).unwrap_or(true))
            .filter_map(|a| {
                let title = a.title.to_lowercase();
                if terms.iter().all(|t| title.contains(t)) {
                    let occurrences = terms.iter().map(|t| title.matches(t).count()).sum();
                    Some((occurrences, a.clone()))
                } else {
                    None
                }
            })
            .collect();

        let hits: Vec<Article> = match q.sort {
            Some(sort) => {
                let mut hits: Vec<Article> = scored.into_iter().map(|(_, a)| a).collect();
                Self::sort_articles(sort, &mut hits);
                hits
            }
            None => {
                // Relevance: most term occurrences first, hotness as tie-break.
                scored.sort_by(|(na, a), (nb, b)| {
                    nb.cmp(na).then_with(|| {
                        b.hotness
                            .partial_cmp(&a.hotness)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                });
                scored.into_iter().map(|(_, a)| a).collect()
            }
        };

        Ok(Self::page(hits, q.limit, q.offset))
    }

    async fn find_needing_summary(&self, limit: u32) -> Result<Vec<Article>> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut hits: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| a.summary.is_none())
            .cloned()
            .collect();
        Self::sort_articles(SortOrder::Hot, &mut hits);
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn update_summary(
        &self,
        id: &str,
        summary: &StructuredSummary,
        source: SummarySource,
    ) -> Result<bool> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        match inner.articles.get_mut(id) {
            Some(article) => {
                article.summary = Some(Summary::Structured(summary.clone()));
                article.summary_source = Some(source);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_run(&self, started_at: DateTime<Utc>) -> Result<i64> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.next_run_id += 1;
        let id = inner.next_run_id;
        inner.runs.push(IngestRun::started(id, started_at));
        Ok(id)
    }

    async fn update_run(&self, run: &IngestRun) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        match inner.runs.iter_mut().find(|r| r.id == run.id) {
            Some(slot) => {
                *slot = run.clone();
                Ok(())
            }
            None => bail!("unknown run id {}", run.id),
        }
    }

    async fn recent_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .runs
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
