use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::pipeline::IngestPipeline;
use crate::run::{RunOutcome, TriggerKind};

use super::JobInfo;

/// A registered recurring job. Dropping it disarms its timer.
///
/// Only the interval is fixed at registration. Each firing reads the rest
/// of the schedule from the config store like any other run.
pub(super) struct ScheduledJob {
    name: String,
    interval: Duration,
    registered_at: DateTime<Utc>,
    timer: Option<JoinHandle<()>>,
}

impl ScheduledJob {
    pub(super) fn new(name: &str, interval: Duration) -> Self {
        Self {
            name: name.to_string(),
            interval,
            registered_at: Utc::now(),
            timer: None,
        }
    }

    /// Start the timer. The first firing is one interval from now.
    pub(super) fn arm(&mut self, pipeline: Arc<IngestPipeline>, runs: RunTracker) {
        if self.timer.is_some() {
            return;
        }
        let interval = self.interval;
        let name = self.name.clone();
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                info!(job = %name, "scheduler: triggering ingestion");
                let pipeline = pipeline.clone();
                runs.spawn(async move { fire(&pipeline).await });
            }
        }));
    }

    pub(super) fn info(&self) -> JobInfo {
        JobInfo {
            name: self.name.clone(),
            interval: self.interval,
            registered_at: self.registered_at,
            active: self.timer.as_ref().is_some_and(|t| !t.is_finished()),
        }
    }
}

impl Drop for ScheduledJob {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Run one scheduled ingestion and log its outcome. Nothing here can
/// unregister the job.
async fn fire(pipeline: &Arc<IngestPipeline>) {
    match pipeline.run(TriggerKind::Scheduled).await {
        Ok(RunOutcome::Completed(report)) => info!(
            run_id = %report.run_id,
            new_items = report.new_items,
            failed = report.failed,
            "scheduled ingestion completed"
        ),
        Ok(RunOutcome::Busy) => info!("scheduled ingestion skipped, a run is already in progress"),
        Err(e) => error!(error = %e, "scheduled ingestion failed"),
    }
}

/// Handles of fired runs, kept separate from the timers so that disarming
/// a timer never cancels a run already in progress.
#[derive(Clone, Default)]
pub(super) struct RunTracker {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl RunTracker {
    pub(super) fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        if let Ok(mut handles) = self.handles.lock() {
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }
    }

    pub(super) fn take(&self) -> Vec<JoinHandle<()>> {
        match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        }
    }

    pub(super) fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .map(|h| h.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}
