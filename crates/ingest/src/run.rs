//! Per-run bookkeeping: what triggered a run, what it did, and a bounded
//! in-memory history of recent runs.

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What started an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// HTTP `POST /api/ingest` or the `ingest` CLI command.
    Manual,
    /// Timer tick from the scheduler.
    Scheduled,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "manual",
            TriggerKind::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trigger: TriggerKind,
    /// Items returned by the fetch client.
    pub fetched: usize,
    /// Items kept after applying the pull limit.
    pub selected: usize,
    pub analyzed: usize,
    /// Items whose analysis failed and were left out.
    pub failed: usize,
    pub new_items: usize,
    pub duplicates: usize,
    pub duration_ms: u64,
}

/// Result of asking the pipeline to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run held the lock; nothing was done.
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Skipped,
}

/// History entry for one attempted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub trigger: TriggerKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Most recent runs, oldest evicted first.
#[derive(Debug)]
pub struct RunHistory {
    records: RwLock<IndexMap<Uuid, RunRecord>>,
    capacity: usize,
}

impl RunHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, record: RunRecord) {
        let Ok(mut records) = self.records.write() else {
            return;
        };
        records.insert(record.run_id, record);
        while records.len() > self.capacity {
            records.shift_remove_index(0);
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<RunRecord> {
        match self.records.read() {
            Ok(records) => records.values().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn last(&self) -> Option<RunRecord> {
        self.recent(1).into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
