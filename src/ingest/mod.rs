//! # Ingestion Orchestrator
//!
//! Drives one full pipeline pass: fetch latest stories, merge them into the
//! store (summary-preserving), pick the hottest unsummarized articles,
//! enrich them, and persist each summary individually. The run is audited as
//! a single record: `running` at start, `completed` or `failed` at the end,
//! and the caller always gets a structured outcome back.

pub mod hn;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::model::{IngestRun, RunStatus};
use crate::store::DynStore;
use crate::summarize::{SummarizeOptions, Summarizer};

/// Hard ceiling on a single run.
const RUN_CEILING: Duration = Duration::from_secs(300);

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Pipeline runs started.");
        describe_counter!("ingest_runs_failed_total", "Pipeline runs that ended failed.");
        describe_counter!("ingest_fetched_total", "Articles assembled from the feed.");
        describe_counter!("ingest_inserted_total", "Articles newly inserted.");
        describe_counter!("ingest_updated_total", "Existing articles refreshed.");
        describe_counter!("ingest_summarized_total", "Summaries persisted.");
        describe_counter!("ingest_errors_total", "Per-item errors tolerated during runs.");
        describe_counter!("hn_items_fetched_total", "Raw story items fetched.");
        describe_counter!("hn_item_errors_total", "Story item fetches that failed.");
        describe_counter!("ai_summaries_total", "Valid summaries returned by the backend.");
        describe_counter!("ai_summary_rejects_total", "Backend outputs that failed validation.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when the pipeline last finished.");
    });
}

/// The assembled pipeline. Construct once at startup, trigger per request.
pub struct Pipeline {
    store: DynStore,
    fetcher: hn::NewsFetcher,
    summarizer: Arc<Summarizer>,
    summary_limit: u32,
    summary_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        store: DynStore,
        fetcher: hn::NewsFetcher,
        summarizer: Arc<Summarizer>,
        summary_limit: u32,
        summary_concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
            summary_limit,
            summary_concurrency,
        }
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Execute one run. `Err` only when the run record itself cannot be
    /// opened; every in-run failure lands in the returned record instead.
    pub async fn run(&self) -> Result<IngestRun> {
        ensure_metrics_described();
        counter!("ingest_runs_total").increment(1);

        let started_at = Utc::now();
        let run_id = self
            .store
            .record_run(started_at)
            .await
            .context("opening ingest run record")?;
        let mut run = IngestRun::started(run_id, started_at);

        let outcome = tokio::time::timeout(RUN_CEILING, self.execute(&mut run)).await;
        match outcome {
            Ok(Ok(())) => {
                run.status = RunStatus::Completed;
            }
            Ok(Err(e)) => {
                run.status = RunStatus::Failed;
                run.error = Some(format!("{e:#}"));
                counter!("ingest_runs_failed_total").increment(1);
                tracing::error!(error = %e, run = run_id, "ingest run failed");
            }
            Err(_elapsed) => {
                run.status = RunStatus::Failed;
                run.error = Some(format!("run exceeded {}s ceiling", RUN_CEILING.as_secs()));
                counter!("ingest_runs_failed_total").increment(1);
                tracing::error!(run = run_id, "ingest run timed out");
            }
        }
        run.finished_at = Some(Utc::now());

        counter!("ingest_fetched_total").increment(run.fetched.max(0) as u64);
        counter!("ingest_inserted_total").increment(run.inserted.max(0) as u64);
        counter!("ingest_updated_total").increment(run.updated.max(0) as u64);
        counter!("ingest_summarized_total").increment(run.summarized.max(0) as u64);
        counter!("ingest_errors_total").increment(run.errors.max(0) as u64);
        gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);

        // Bookkeeping failure must not mask the run outcome.
        if let Err(e) = self.store.update_run(&run).await {
            tracing::warn!(error = ?e, run = run_id, "failed to finalize run record");
        }
        Ok(run)
    }

    async fn execute(&self, run: &mut IngestRun) -> Result<()> {
        // Step 1: fetch. The only fatal network call is the id-list fetch
        // inside; per-item failures come back as a count.
        let batch = self.fetcher.fetch_latest().await?;
        run.fetched = batch.articles.len() as i64;
        run.errors += batch.errors as i64;
        tracing::info!(
            fetched = run.fetched,
            dropped = batch.errors,
            "fetched story batch"
        );

        // Step 2: merge-preserving upsert.
        let stats = self
            .store
            .merge_upsert(&batch.articles)
            .await
            .context("merging fetched articles")?;
        run.inserted = stats.inserted as i64;
        run.updated = stats.updated as i64;
        run.errors += stats.errors as i64;

        // Step 3: enrichment, only with a configured backend. Content
        // fetching on, comment fetching off: the orchestrated path favors
        // article text; comment mode stays available to operators and tests.
        if self.summarizer.enabled() {
            let targets = self
                .store
                .find_needing_summary(self.summary_limit)
                .await
                .context("selecting articles for enrichment")?;
            let opts = SummarizeOptions {
                fetch_content: true,
                fetch_comments: false,
                concurrency: self.summary_concurrency,
            };
            let outcomes = self.summarizer.summarize_batch(&targets, &opts).await;

            for (article, outcome) in targets.iter().zip(outcomes) {
                match outcome {
                    Some(o) => {
                        // Persisted one by one: a single write failure must
                        // not take the rest of the batch down with it.
                        match self
                            .store
                            .update_summary(&article.id, &o.summary, o.source)
                            .await
                        {
                            Ok(true) => run.summarized += 1,
                            Ok(false) => {
                                tracing::warn!(article = %article.id, "summary target vanished");
                                run.errors += 1;
                            }
                            Err(e) => {
                                tracing::warn!(error = ?e, article = %article.id, "summary write failed");
                                run.errors += 1;
                            }
                        }
                    }
                    None => run.errors += 1,
                }
            }
        }

        Ok(())
    }
}
