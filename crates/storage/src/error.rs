use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("core error: {0}")]
    Core(#[from] intel_core::IntelError),

    #[error("article store lock poisoned")]
    Poisoned,
}

impl From<StorageError> for intel_ingest::IngestError {
    fn from(e: StorageError) -> Self {
        intel_ingest::IngestError::Store(e.to_string())
    }
}
