//! # AppError
//!
//! Centralized error handling for the modstate workspace.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type surfaced to callers of ms-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested state is not known (e.g., no mutelinks command on record)
    #[error("{0}")]
    NotFound(String),

    /// Bad request parameter (e.g., non-numeric count, window out of range)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Infrastructure failure (e.g., Postgres down, Redis timeout)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for modstate logic.
pub type Result<T> = std::result::Result<T, AppError>;
