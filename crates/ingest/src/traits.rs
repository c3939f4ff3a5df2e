//! Seams between the pipeline and its collaborators.
//!
//! The pipeline holds these as `Arc<dyn ...>` and never rebuilds them; a
//! settings change goes through `reload` instead.

use async_trait::async_trait;
use intel_core::{EnrichedItem, Enrichment, RawItem};

use crate::error::{ConfigError, IngestError};
use crate::settings::AppSettings;

/// Produces the candidate items for one run.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Fetch every configured source and return the full, materialized list.
    async fn fetch_all(&self) -> Result<Vec<RawItem>, IngestError>;

    /// Pick up a new feed list. Runs already fetching are unaffected.
    fn reload(&self, settings: &AppSettings);
}

/// Produces enrichment fields for one item. Called concurrently.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, item: &RawItem) -> Result<Enrichment, IngestError>;

    fn reload(&self, settings: &AppSettings);
}

/// Accepts analyzed items. Owns the dedup decision.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Returns `true` when the item was newly stored, `false` for a duplicate.
    async fn add_item(&self, item: &EnrichedItem) -> Result<bool, IngestError>;
}

/// Durable settings text.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<AppSettings, ConfigError>;

    fn load_raw(&self) -> Result<String, ConfigError>;

    /// Validate `raw` and replace the stored settings with it. Invalid text
    /// must leave the stored settings untouched.
    fn save(&self, raw: &str) -> Result<AppSettings, ConfigError>;
}
