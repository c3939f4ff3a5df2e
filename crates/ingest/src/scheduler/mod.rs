//! Recurring ingestion driven by the `scheduling` settings section.
//!
//! The controller owns a job table that holds at most one job, named
//! [`SCHEDULED_INGEST_JOB`]. Every settings change is applied by removing
//! that job and, when enabled, registering a fresh one.

mod controller;
mod job;


use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use controller::SchedulerController;

/// Identity of the one recurring ingestion job.
pub const SCHEDULED_INGEST_JOB: &str = "scheduled_ingest";

/// Controller lifecycle: `Unstarted -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Unstarted,
    Running,
    Stopped,
}

/// Read-only view of a registered job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub registered_at: DateTime<Utc>,
    /// Whether a timer is currently armed for this job.
    pub active: bool,
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
