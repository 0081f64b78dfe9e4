use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Backend error ({status}): {message}")]
    BackendError { status: u16, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Session expired or token invalid")]
    Unauthorized,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{0}")]
    ProviderError(String),
    #[error("No pending payment attempt found")]
    MissingPendingAttempt,
    #[error("Free quiz limit reached, premium is required to take another quiz")]
    FreeQuizLimitReached,
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
