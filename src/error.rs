use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Source unavailable: {source_id}: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Corrupt stream in {source_id}: {reason}")]
    CorruptStream { source_id: String, reason: String },

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Upsert batch starting at {offset} failed: {reason}")]
    UpsertBatchFailure { offset: usize, reason: String },

    #[error("Lookup service error: {0}")]
    LookupServiceFailure(String),

    #[error("Registry store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for RegistryError {
    fn from(e: rusqlite::Error) -> Self {
        RegistryError::Store(e.to_string())
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        RegistryError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
