//! Ingestion core: the single-flight pipeline, its scheduler, and the
//! collaborators it drives (feed fetcher, LLM analyzer, settings store).
//!
//! Both the manual trigger and the timer go through [`IngestPipeline::run`],
//! which refuses to start while another run holds the [`IngestLock`].

pub mod analyzer;
pub mod config_store;
pub mod error;
pub mod feed;
pub mod lock;
pub mod pipeline;
pub mod run;
pub mod scheduler;
pub mod settings;
pub mod traits;

pub use analyzer::LlmAnalyzer;
pub use config_store::YamlConfigStore;
pub use error::{ConfigError, IngestError, SchedulerError};
pub use feed::RssFetcher;
pub use lock::{IngestGuard, IngestLock};
pub use pipeline::{IngestPipeline, DEFAULT_WORKERS};
pub use run::{RunHistory, RunOutcome, RunRecord, RunReport, RunStatus, TriggerKind};
pub use scheduler::{JobInfo, SchedulerController, SchedulerState, SCHEDULED_INGEST_JOB};
pub use settings::{AnalysisSettings, AppSettings, FeedSource, ScheduleConfig};
pub use traits::{Analyzer, ConfigStore, FetchClient, Persistence};
