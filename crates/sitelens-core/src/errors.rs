//! Error types for `sitelens-core`.

use thiserror::Error;

/// Errors produced by core parsing and normalization.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A custom time-period string could not be parsed as `start,end`
    /// Unix timestamps.
    #[error("invalid time period '{0}': expected a named range or 'start,end' unix timestamps")]
    InvalidPeriod(String),

    /// The configured reference timezone is not a valid IANA name.
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
