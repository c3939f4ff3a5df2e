use thiserror::Error;

/// Run-level and collaborator errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("analysis failed: {0}")]
    Analyze(String),

    #[error("store failed: {0}")]
    Store(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] intel_llm::LlmError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run task ended abnormally: {0}")]
    Task(String),
}

/// Settings file errors. Raised before anything is written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler has been shut down")]
    Stopped,

    #[error("invalid schedule: {0}")]
    InvalidConfig(#[from] ConfigError),
}
