use std::sync::Arc;

use intel_ingest::{Analyzer, ConfigStore, FetchClient, IngestPipeline, SchedulerController};
use intel_llm::LlmProvider;
use intel_storage::ArticleStore;

pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub scheduler: Arc<SchedulerController>,
    pub store: Arc<ArticleStore>,
    /// Same instances the pipeline drives; held here so a settings change
    /// can `reload` them in place.
    pub fetcher: Arc<dyn FetchClient>,
    pub analyzer: Arc<dyn Analyzer>,
    /// Answers chat questions. `None` falls back to a plain result listing.
    pub chat_provider: Option<Arc<dyn LlmProvider>>,
}

impl AppState {
    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        self.pipeline.config_store()
    }
}
