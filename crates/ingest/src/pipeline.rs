//! One ingestion run: fetch, bound the batch, analyze in parallel, store.
//!
//! [`IngestPipeline::run`] is the only entry point for both triggers. It takes
//! the [`IngestLock`] before touching anything; a second caller gets
//! [`RunOutcome::Busy`] back immediately. An acquired run executes on a task
//! of its own, so it is never cut short by its caller going away.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use intel_core::{EnrichedItem, RawItem};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::IngestError;
use crate::lock::{IngestGuard, IngestLock};
use crate::run::{RunHistory, RunOutcome, RunRecord, RunReport, RunStatus, TriggerKind};
use crate::settings::ScheduleConfig;
use crate::traits::{Analyzer, ConfigStore, FetchClient, Persistence};

/// Default size of the analysis worker pool.
pub const DEFAULT_WORKERS: usize = 5;

pub struct IngestPipeline {
    fetcher: Arc<dyn FetchClient>,
    analyzer: Arc<dyn Analyzer>,
    store: Arc<dyn Persistence>,
    config_store: Arc<dyn ConfigStore>,
    lock: IngestLock,
    workers: usize,
    history: RunHistory,
}

/// Output of the analysis stage.
struct AnalyzedBatch {
    items: Vec<EnrichedItem>,
    failed: usize,
}

impl IngestPipeline {
    pub fn new(
        fetcher: Arc<dyn FetchClient>,
        analyzer: Arc<dyn Analyzer>,
        store: Arc<dyn Persistence>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            store,
            config_store,
            lock: IngestLock::new(),
            workers: DEFAULT_WORKERS,
            history: RunHistory::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn is_running(&self) -> bool {
        self.lock.is_busy()
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    /// Run once, reading the schedule from the config store after the lock
    /// is held.
    pub async fn run(self: &Arc<Self>, trigger: TriggerKind) -> Result<RunOutcome, IngestError> {
        self.launch(trigger, None).await
    }

    /// Run once against an explicit schedule snapshot.
    pub async fn run_with_config(
        self: &Arc<Self>,
        trigger: TriggerKind,
        schedule: &ScheduleConfig,
    ) -> Result<RunOutcome, IngestError> {
        self.launch(trigger, Some(schedule.clone())).await
    }

    /// Take the lock, then drive the run on its own task. The caller only
    /// awaits the handle: dropping the caller's future leaves the run going
    /// to completion or failure.
    async fn launch(
        self: &Arc<Self>,
        trigger: TriggerKind,
        schedule: Option<ScheduleConfig>,
    ) -> Result<RunOutcome, IngestError> {
        let Some(guard) = self.lock.try_acquire() else {
            return Ok(self.skip(trigger));
        };
        let started_at = Utc::now();

        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let schedule = match schedule {
                Some(schedule) => schedule,
                None => match pipeline.config_store.load() {
                    Ok(settings) => settings.scheduling,
                    Err(e) => {
                        error!(%trigger, error = %e, "ingestion run failed: could not load settings");
                        pipeline
                            .history
                            .record(failed_record(Uuid::new_v4(), trigger, started_at, &e.to_string()));
                        return Err(IngestError::from(e));
                    }
                },
            };
            pipeline.execute(trigger, &schedule, started_at, guard).await
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(%trigger, error = %e, "ingestion run task ended abnormally");
                self.history
                    .record(failed_record(Uuid::new_v4(), trigger, started_at, &e.to_string()));
                Err(IngestError::Task(e.to_string()))
            }
        }
    }

    fn skip(&self, trigger: TriggerKind) -> RunOutcome {
        info!(%trigger, "ingestion already in progress, skipping");
        let now = Utc::now();
        self.history.record(RunRecord {
            run_id: Uuid::new_v4(),
            trigger,
            status: RunStatus::Skipped,
            started_at: now,
            finished_at: now,
            report: None,
            error: None,
        });
        RunOutcome::Busy
    }

    async fn execute(
        &self,
        trigger: TriggerKind,
        schedule: &ScheduleConfig,
        started_at: DateTime<Utc>,
        _guard: IngestGuard,
    ) -> Result<RunOutcome, IngestError> {
        let run_id = Uuid::new_v4();
        let pull_limit = schedule.pull_limit_for(trigger);
        info!(%run_id, %trigger, pull_limit, workers = self.workers, "ingestion run started");

        let start = Instant::now();
        match self.stages(run_id, trigger, pull_limit, start).await {
            Ok(report) => {
                info!(
                    %run_id,
                    %trigger,
                    fetched = report.fetched,
                    selected = report.selected,
                    failed = report.failed,
                    new_items = report.new_items,
                    duplicates = report.duplicates,
                    duration_ms = report.duration_ms,
                    "ingestion run completed"
                );
                self.history.record(RunRecord {
                    run_id,
                    trigger,
                    status: RunStatus::Completed,
                    started_at,
                    finished_at: Utc::now(),
                    report: Some(report.clone()),
                    error: None,
                });
                Ok(RunOutcome::Completed(report))
            }
            Err(e) => {
                error!(%run_id, %trigger, error = %e, "ingestion run failed");
                self.history.record(failed_record(run_id, trigger, started_at, &e.to_string()));
                Err(e)
            }
        }
    }

    async fn stages(
        &self,
        run_id: Uuid,
        trigger: TriggerKind,
        pull_limit: usize,
        start: Instant,
    ) -> Result<RunReport, IngestError> {
        let mut batch = self.fetcher.fetch_all().await?;
        let fetched = batch.len();
        batch.truncate(pull_limit);
        let selected = batch.len();

        let analyzed = self.analyze_batch(batch).await;

        let mut new_items = 0;
        let mut duplicates = 0;
        for item in &analyzed.items {
            match self.store.add_item(item).await {
                Ok(true) => new_items += 1,
                Ok(false) => duplicates += 1,
                Err(e) => {
                    error!(
                        %run_id,
                        %trigger,
                        url = %item.url(),
                        new_items,
                        error = %e,
                        "store failed mid-run, earlier items stay persisted"
                    );
                    return Err(e);
                }
            }
        }

        Ok(RunReport {
            run_id,
            trigger,
            fetched,
            selected,
            analyzed: analyzed.items.len(),
            failed: analyzed.failed,
            new_items,
            duplicates,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Analyze with at most `workers` tasks in flight. Each task reports its
    /// source index so results land in their own slot; the stage returns
    /// only once every task has finished.
    async fn analyze_batch(&self, batch: Vec<RawItem>) -> AnalyzedBatch {
        let mut slots: Vec<Option<EnrichedItem>> = (0..batch.len()).map(|_| None).collect();
        let mut failed = 0;

        let mut results = stream::iter(batch.into_iter().enumerate())
            .map(|(index, item)| {
                let analyzer = self.analyzer.clone();
                async move {
                    let url = item.url.clone();
                    let handle = tokio::spawn(async move {
                        let enrichment = analyzer.analyze(&item).await?;
                        Ok::<_, IngestError>(EnrichedItem::merge(item, enrichment))
                    });
                    (index, url, handle.await)
                }
            })
            .buffer_unordered(self.workers);

        while let Some((index, url, joined)) = results.next().await {
            match joined {
                Ok(Ok(enriched)) => slots[index] = Some(enriched),
                Ok(Err(e)) => {
                    warn!(%url, error = %e, "analysis failed, item excluded");
                    failed += 1;
                }
                Err(e) => {
                    warn!(%url, error = %e, "analysis worker panicked, item excluded");
                    failed += 1;
                }
            }
        }

        AnalyzedBatch {
            items: slots.into_iter().flatten().collect(),
            failed,
        }
    }
}

fn failed_record(
    run_id: Uuid,
    trigger: TriggerKind,
    started_at: DateTime<Utc>,
    error: &str,
) -> RunRecord {
    RunRecord {
        run_id,
        trigger,
        status: RunStatus::Failed,
        started_at,
        finished_at: Utc::now(),
        report: None,
        error: Some(error.to_string()),
    }
}
