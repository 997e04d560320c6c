use thiserror::Error;

/// Errors raised by a `Page` implementation (the browser seam).
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Page is not ready")]
    NotReady,

    #[error("Operation not supported by this page driver: {0}")]
    NotSupported(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Unknown node id {0}")]
    UnknownNode(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync transport error: {0}")]
    Transport(String),

    #[error("Sync rejected with status {0}")]
    Rejected(u16),

    #[error("Sync endpoint not configured")]
    NotConfigured,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Extraction already in progress")]
    InProgress,

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}
