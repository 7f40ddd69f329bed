//! Postgres-backed store. Plain hand-written SQL over a `sqlx` pool; the
//! schema is bootstrapped on connect so a fresh database works out of the
//! box. Summary preservation is done in the upsert statement itself (the
//! summary columns are simply absent from the `DO UPDATE SET` list), so it
//! holds even under overlapping runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::model::{
    article_id, Article, IngestRun, RunStatus, StructuredSummary, Summary, SummarySource,
};
use crate::store::{
    ArticlePage, ArticleQuery, ArticleStore, MergeStats, SearchQuery, SortOrder,
};

const ARTICLE_COLS: &str = "id, source, external_id, url, title, author, published_at, \
fetched_at, tags, points, comment_count, comments_url, summary, summary_source, hotness";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .context("connecting to postgres")?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id            text PRIMARY KEY,
                source        text NOT NULL,
                external_id   text NOT NULL,
                url           text NOT NULL,
                title         text NOT NULL,
                author        text,
                published_at  timestamptz NOT NULL,
                fetched_at    timestamptz NOT NULL,
                tags          text[] NOT NULL DEFAULT '{}',
                points        bigint,
                comment_count bigint,
                comments_url  text,
                summary       jsonb,
                summary_source text,
                hotness       double precision NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS articles_hotness_idx ON articles (hotness DESC)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS articles_title_fts_idx ON articles \
             USING GIN (to_tsvector('english', title))",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_runs (
                id          BIGSERIAL PRIMARY KEY,
                started_at  timestamptz NOT NULL,
                finished_at timestamptz,
                status      text NOT NULL,
                fetched     bigint NOT NULL DEFAULT 0,
                inserted    bigint NOT NULL DEFAULT 0,
                updated     bigint NOT NULL DEFAULT 0,
                summarized  bigint NOT NULL DEFAULT 0,
                errors      bigint NOT NULL DEFAULT 0,
                error       text
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: String,
    source: String,
    external_id: String,
    url: String,
    title: String,
    author: Option<String>,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    tags: Vec<String>,
    points: Option<i64>,
    comment_count: Option<i64>,
    comments_url: Option<String>,
    summary: Option<serde_json::Value>,
    summary_source: Option<String>,
    hotness: f64,
}

impl ArticleRow {
    fn into_article(self) -> Article {
        Article {
            id: self.id,
            source: self.source,
            external_id: self.external_id,
            url: self.url,
            title: self.title,
            author: self.author,
            published_at: self.published_at,
            fetched_at: self.fetched_at,
            tags: self.tags,
            points: self.points,
            comment_count: self.comment_count,
            comments_url: self.comments_url,
            summary: self
                .summary
                .and_then(|v| serde_json::from_value::<Summary>(v).ok()),
            summary_source: self.summary_source.as_deref().and_then(SummarySource::parse),
            hotness: self.hotness,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    id: i64,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    fetched: i64,
    inserted: i64,
    updated: i64,
    summarized: i64,
    errors: i64,
    error: Option<String>,
}

impl RunRow {
    fn into_run(self) -> IngestRun {
        IngestRun {
            id: self.id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status: RunStatus::parse(&self.status).unwrap_or(RunStatus::Failed),
            fetched: self.fetched,
            inserted: self.inserted,
            updated: self.updated,
            summarized: self.summarized,
            errors: self.errors,
            error: self.error,
        }
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Hot => "hotness DESC",
        SortOrder::New => "published_at DESC",
        SortOrder::MostDiscussed => "comment_count DESC NULLS LAST",
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn exists(&self, source: &str, external_id: &str) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM articles WHERE id = $1)")
                .bind(article_id(source, external_id))
                .fetch_one(&self.pool)
                .await?;
        Ok(found)
    }

    async fn merge_upsert(&self, articles: &[Article]) -> Result<MergeStats> {
        let mut stats = MergeStats::default();
        for article in articles {
            let summary_json = article
                .summary
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .unwrap_or(None);
            // xmax = 0 only holds for freshly inserted rows, which is how we
            // tell an insert from an update in one round trip.
            let res: Result<(bool,), sqlx::Error> = sqlx::query_as(
                r#"
                INSERT INTO articles (id, source, external_id, url, title, author,
                    published_at, fetched_at, tags, points, comment_count,
                    comments_url, summary, summary_source, hotness)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                ON CONFLICT (id) DO UPDATE SET
                    url = EXCLUDED.url,
                    title = EXCLUDED.title,
                    author = EXCLUDED.author,
                    published_at = EXCLUDED.published_at,
                    fetched_at = EXCLUDED.fetched_at,
                    tags = EXCLUDED.tags,
                    points = EXCLUDED.points,
                    comment_count = EXCLUDED.comment_count,
                    comments_url = EXCLUDED.comments_url,
                    hotness = EXCLUDED.hotness
                RETURNING (xmax = 0)
                "#,
            )
            .bind(&article.id)
            .bind(&article.source)
            .bind(&article.external_id)
            .bind(&article.url)
            .bind(&article.title)
            .bind(&article.author)
            .bind(article.published_at)
            .bind(article.fetched_at)
            .bind(&article.tags)
            .bind(article.points)
            .bind(article.comment_count)
            .bind(&article.comments_url)
            .bind(summary_json)
            .bind(article.summary_source.map(|s| s.as_str()))
            .bind(article.hotness)
            .fetch_one(&self.pool)
            .await;

            match res {
                Ok((true,)) => stats.inserted += 1,
                Ok((false,)) => stats.updated += 1,
                Err(e) => {
                    tracing::warn!(error = ?e, article = %article.id, "upsert failed");
                    stats.errors += 1;
                }
            }
        }
        Ok(stats)
    }

    async fn query(&self, q: &ArticleQuery) -> Result<ArticlePage> {
        let cutoff = q.range.cutoff(Utc::now());
        let filter = "($1::timestamptz IS NULL OR published_at >= $1) \
                      AND ($2::text[] IS NULL OR tags && $2)";

        let sql = format!(
            "SELECT {ARTICLE_COLS} FROM articles WHERE {filter} \
             ORDER BY {} LIMIT $3 OFFSET $4",
            order_clause(q.sort)
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&sql)
            .bind(cutoff)
            .bind(&q.tags)
            .bind(q.limit as i64)
            .bind(q.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM articles WHERE {filter}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(cutoff)
            .bind(&q.tags)
            .fetch_one(&self.pool)
            .await?;

        Ok(ArticlePage {
            articles: rows.into_iter().map(ArticleRow::into_article).collect(),
            total_count: total.max(0) as u64,
        })
    }

    async fn search(&self, q: &SearchQuery) -> Result<ArticlePage> {
        let filter = "to_tsvector('english', title) @@ websearch_to_tsquery('english', $1) \
                      AND ($2::text[] IS NULL OR tags && $2) \
                      AND ($3::timestamptz IS NULL OR published_at >= $3) \
                      AND ($4::timestamptz IS NULL OR published_at <= $4)";
        let order = match q.sort {
            Some(sort) => order_clause(sort).to_string(),
            None => "ts_rank(to_tsvector('english', title), \
                     websearch_to_tsquery('english', $1)) DESC"
                .to_string(),
        };

        let sql = format!(
            "SELECT {ARTICLE_COLS} FROM articles WHERE {filter} \
             ORDER BY {order} LIMIT $5 OFFSET $6"
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&sql)
            .bind(&q.text)
            .bind(&q.tags)
            .bind(q.from)
            .bind(q.to)
            .bind(q.limit as i64)
            .bind(q.offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM articles WHERE {filter}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&q.text)
            .bind(&q.tags)
            .bind(q.from)
            .bind(q.to)
            .fetch_one(&self.pool)
            .await?;

        Ok(ArticlePage {
            articles: rows.into_iter().map(ArticleRow::into_article).collect(),
            total_count: total.max(0) as u64,
        })
    }

    async fn find_needing_summary(&self, limit: u32) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLS} FROM articles WHERE summary IS NULL \
             ORDER BY hotness DESC LIMIT $1"
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }

    async fn update_summary(
        &self,
        id: &str,
        summary: &StructuredSummary,
        source: SummarySource,
    ) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE articles SET summary = $2, summary_source = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(serde_json::to_value(summary)?)
        .bind(source.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_run(&self, started_at: DateTime<Utc>) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO ingest_runs (started_at, status) VALUES ($1, 'running') RETURNING id",
        )
        .bind(started_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_run(&self, run: &IngestRun) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_runs SET
                finished_at = $2, status = $3, fetched = $4, inserted = $5,
                updated = $6, summarized = $7, errors = $8, error = $9
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.finished_at)
        .bind(run.status.as_str())
        .bind(run.fetched)
        .bind(run.inserted)
        .bind(run.updated)
        .bind(run.summarized)
        .bind(run.errors)
        .bind(&run.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        let rows: Vec<RunRow> = sqlx::query_as(
            "SELECT id, started_at, finished_at, status, fetched, inserted, updated, \
             summarized, errors, error FROM ingest_runs ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RunRow::into_run).collect())
    }
}
