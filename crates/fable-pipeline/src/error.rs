//! Pipeline error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors from the batch and import pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient credits: {needed} needed, {balance} available")]
    InsufficientCredits { needed: i64, balance: i64 },

    #[error("Rate limited until {reset_time}")]
    RateLimited { reset_time: DateTime<Utc> },

    #[error("Upstream service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(#[from] fable_storage::StorageError),

    #[error("Download error: {0}")]
    Download(#[from] fable_media::DownloadError),

    #[error("Media error: {0}")]
    Media(#[from] fable_media::MediaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
