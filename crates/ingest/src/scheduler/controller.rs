use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::SchedulerError;
use crate::pipeline::IngestPipeline;
use crate::settings::{AppSettings, ScheduleConfig};
use crate::traits::ConfigStore;

use super::job::{RunTracker, ScheduledJob};
use super::{JobInfo, SchedulerState, SCHEDULED_INGEST_JOB};

struct Inner {
    state: SchedulerState,
    jobs: IndexMap<String, ScheduledJob>,
}

/// Owns the recurring ingestion job and its timer.
///
/// All mutations go through one async mutex, so a settings update racing a
/// shutdown (or another update) is applied in some serial order.
pub struct SchedulerController {
    pipeline: Arc<IngestPipeline>,
    inner: Mutex<Inner>,
    runs: RunTracker,
}

impl SchedulerController {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self {
            pipeline,
            inner: Mutex::new(Inner {
                state: SchedulerState::Unstarted,
                jobs: IndexMap::new(),
            }),
            runs: RunTracker::default(),
        }
    }

    /// Rebuild the job from `config`.
    ///
    /// Validation happens before anything is removed, so an invalid enabled
    /// config leaves the current job in place. Before [`start`](Self::start)
    /// the job is recorded but not armed. After [`shutdown`](Self::shutdown)
    /// this returns [`SchedulerError::Stopped`] and changes nothing.
    pub async fn apply_config(&self, config: &ScheduleConfig) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == SchedulerState::Stopped {
            return Err(SchedulerError::Stopped);
        }
        self.register(&mut inner, config)
    }

    /// Write `raw` through `store` and apply the result, holding the job
    /// table lock from the write until the job is rebuilt. Concurrent
    /// updates therefore leave the job matching whichever write landed
    /// last. `on_saved` runs between the two steps. After shutdown nothing
    /// is written.
    pub async fn update_settings(
        &self,
        store: &dyn ConfigStore,
        raw: &str,
        on_saved: impl FnOnce(&AppSettings),
    ) -> Result<AppSettings, SchedulerError> {
        let mut inner = self.inner.lock().await;
        if inner.state == SchedulerState::Stopped {
            return Err(SchedulerError::Stopped);
        }
        let settings = store.save(raw)?;
        on_saved(&settings);
        self.register(&mut inner, &settings.scheduling)?;
        Ok(settings)
    }

    fn register(&self, inner: &mut Inner, config: &ScheduleConfig) -> Result<(), SchedulerError> {
        let interval = if config.enabled {
            Some(config.interval().inspect_err(|e| {
                warn!(error = %e, "scheduler: rejecting schedule, keeping current job");
            })?)
        } else {
            None
        };

        if inner.jobs.shift_remove(SCHEDULED_INGEST_JOB).is_some() {
            info!(job = SCHEDULED_INGEST_JOB, "scheduler: removed existing job");
        }

        let Some(interval) = interval else {
            info!("scheduler: scheduled ingestion disabled");
            return Ok(());
        };

        let mut job = ScheduledJob::new(SCHEDULED_INGEST_JOB, interval);
        if inner.state == SchedulerState::Running {
            job.arm(self.pipeline.clone(), self.runs.clone());
        }
        inner.jobs.insert(SCHEDULED_INGEST_JOB.to_string(), job);
        info!(
            job = SCHEDULED_INGEST_JOB,
            interval_hours = config.interval_hours,
            armed = inner.state == SchedulerState::Running,
            "scheduler: job registered"
        );
        Ok(())
    }

    /// Load settings from `store` and apply their `scheduling` section.
    pub async fn reload(&self, store: &dyn ConfigStore) -> Result<(), SchedulerError> {
        let settings = store.load()?;
        self.apply_config(&settings.scheduling).await
    }

    /// Arm timers for every registered job. Valid once, from `Unstarted`.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SchedulerState::Unstarted => {}
            SchedulerState::Running => return Err(SchedulerError::AlreadyStarted),
            SchedulerState::Stopped => return Err(SchedulerError::Stopped),
        }
        inner.state = SchedulerState::Running;
        for job in inner.jobs.values_mut() {
            job.arm(self.pipeline.clone(), self.runs.clone());
        }
        info!(jobs = inner.jobs.len(), "scheduler started");
        Ok(())
    }

    /// Stop all future firings. Runs already in progress are never
    /// cancelled; `wait` decides whether this call awaits them.
    pub async fn shutdown(&self, wait: bool) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = SchedulerState::Stopped;
            inner.jobs.clear();
        }

        let in_flight = self.runs.in_flight();
        info!(wait, in_flight, "scheduler stopped");

        if wait {
            for handle in self.runs.take() {
                if let Err(e) = handle.await {
                    warn!(error = %e, "scheduler: run task ended abnormally");
                }
            }
        }
    }

    pub async fn job(&self) -> Option<JobInfo> {
        let inner = self.inner.lock().await;
        inner.jobs.get(SCHEDULED_INGEST_JOB).map(ScheduledJob::info)
    }

    pub async fn job_count(&self) -> usize {
        self.inner.lock().await.jobs.len()
    }

    pub async fn state(&self) -> SchedulerState {
        self.inner.lock().await.state
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }
}
