//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors from downloading an external resource.
///
/// `InvalidUrl`, `BlockedHost` and `TooLarge` are security rejections:
/// always terminal, logged with the rejected target, never silently
/// downgraded.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Blocked host: {0}")]
    BlockedHost(String),

    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("Download exceeds size limit of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Download tool failed: {0}")]
    ToolFailure(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether this is a security rejection (blocked target, bad scheme,
    /// oversized) as opposed to an upstream/transport failure.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_) | Self::BlockedHost(_) | Self::TooLarge { .. }
        )
    }
}

/// Errors from local media tooling (probing, temp scopes).
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid audio file: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
