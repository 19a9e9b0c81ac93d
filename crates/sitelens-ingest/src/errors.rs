//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors that can occur while queueing or processing events.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Queue directory or item file I/O failed.
    #[error("queue io error: {0}")]
    Io(#[from] std::io::Error),

    /// A queue item could not be serialized.
    #[error("queue serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The authoritative store rejected a write. Fatal for the in-flight
    /// item: it stays queued and is redelivered.
    #[error(transparent)]
    Store(#[from] sitelens_store::StoreError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
