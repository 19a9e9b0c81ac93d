//! Error types for the storage subsystem.
//!
//! [`StoreError`] is the primary error type returned by all store
//! operations. The distinction that matters to callers: authoritative
//! (`SQLite`) failures propagate and abort the in-flight write cycle, while
//! analytical (`DuckDB`) failures are caught at the write site, logged, and
//! swallowed.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error (authoritative store).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// `DuckDB` database error (analytical store).
    #[error("duckdb error: {0}")]
    Duckdb(#[from] duckdb::Error),

    /// Filesystem error (data directory handling).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Core parsing error (period, timezone) surfaced through a query.
    #[error(transparent)]
    Core(#[from] sitelens_core::CoreError),

    /// The requested domain is not a tracked website.
    #[error("unknown domain: {0}")]
    UnknownDomain(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
