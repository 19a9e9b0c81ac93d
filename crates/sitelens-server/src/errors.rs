//! Server error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request was malformed; the message is safe to return verbatim.
    #[error("{0}")]
    BadRequest(String),

    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] sitelens_store::StoreError),

    /// The ingestion queue rejected a push.
    #[error(transparent)]
    Ingest(#[from] sitelens_ingest::IngestError),

    /// A blocking query task failed to complete.
    #[error("query task failed: {0}")]
    QueryTask(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            // An invalid period or timezone is caller error, not ours.
            Self::Store(sitelens_store::StoreError::Core(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            Self::Store(e) => {
                error!(error = %e, "store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            Self::Ingest(e) => {
                error!(error = %e, "event enqueue failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
            Self::QueryTask(e) => {
                error!(error = %e, "query task failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ServerError>;
