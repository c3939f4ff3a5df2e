//! Server startup: collaborator wiring, scheduler lifecycle, graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use intel_core::Config;
use intel_ingest::{
    ConfigStore, IngestPipeline, LlmAnalyzer, RssFetcher, RunOutcome, SchedulerController,
    TriggerKind, YamlConfigStore,
};
use intel_storage::ArticleStore;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

/// Per-request timeout for LLM completions. Analysis replies are slower
/// than feed downloads.
const LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// Build every collaborator from process config plus the settings file.
pub fn build_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let config_store = Arc::new(YamlConfigStore::new(&config.ingest.settings_path));
    let settings = config_store.load().with_context(|| {
        format!(
            "failed to load settings from {}",
            config.ingest.settings_path.display()
        )
    })?;
    info!(
        feeds = settings.feeds.len(),
        topics = settings.analysis.topics.len(),
        "settings loaded"
    );

    let provider = intel_llm::create_provider(&config.llm, &config.ollama, LLM_TIMEOUT)
        .context("an LLM provider is required for article analysis")?;
    info!(provider = provider.name(), "LLM provider ready");

    let fetch_timeout = Duration::from_secs(u64::from(config.ingest.fetch_timeout_secs));
    let fetcher = Arc::new(RssFetcher::new(&settings, fetch_timeout)?);
    let analyzer = Arc::new(
        LlmAnalyzer::new(provider.clone(), &settings)
            .with_sampling(config.llm.temperature, config.llm.max_tokens),
    );

    let store = Arc::new(ArticleStore::from_config(config)?);
    info!(
        articles = store.len(),
        path = %store.path().display(),
        "article store opened"
    );

    let pipeline = Arc::new(
        IngestPipeline::new(fetcher.clone(), analyzer.clone(), store.clone(), config_store)
            .with_workers(config.ingest.workers),
    );
    let scheduler = Arc::new(SchedulerController::new(pipeline.clone()));

    Ok(Arc::new(AppState {
        pipeline,
        scheduler,
        store,
        fetcher,
        analyzer,
        chat_provider: Some(provider),
    }))
}

/// Run the HTTP server until ctrl-c. The scheduler is configured from the
/// settings file, then started, then stopped after the server drains.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = build_app_state(config)?;

    state
        .scheduler
        .reload(state.config_store().as_ref())
        .await
        .context("failed to configure the ingestion scheduler")?;
    state.scheduler.start().await?;

    let app = build_router(state.clone(), &config.server.cors_origin);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, shutting down scheduler");
    state.scheduler.shutdown(false).await;
    Ok(())
}

/// One manual run outside the server, for the `ingest` subcommand.
/// `limit` overrides the settings file's pull limit for this run only.
pub async fn ingest_once(config: &Config, limit: Option<usize>) -> anyhow::Result<RunOutcome> {
    let state = build_app_state(config)?;
    let outcome = match limit {
        Some(limit) => {
            let schedule = state.config_store().load()?.scheduling.with_pull_limit(limit);
            state.pipeline.run_with_config(TriggerKind::Manual, &schedule).await?
        }
        None => state.pipeline.run(TriggerKind::Manual).await?,
    };
    Ok(outcome)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
