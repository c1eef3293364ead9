//! API error types and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use fable_pipeline::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Insufficient credits: {needed} needed, {balance} available")]
    InsufficientCredits { needed: i64, balance: i64 },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: i64 },

    #[error("Upstream service failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => Self::BadRequest(msg),
            PipelineError::InsufficientCredits { needed, balance } => {
                Self::InsufficientCredits { needed, balance }
            }
            PipelineError::RateLimited { reset_time } => Self::RateLimited {
                retry_after: (reset_time - Utc::now()).num_seconds().max(0),
            },
            PipelineError::Upstream { status, message } => {
                Self::Upstream(format!("upstream returned {}: {}", status, message))
            }
            PipelineError::NotFound(msg) => Self::NotFound(msg),
            PipelineError::Forbidden(msg) => Self::Forbidden(msg),
            PipelineError::Download(e) if e.is_security_rejection() => {
                Self::BadRequest(e.to_string())
            }
            PipelineError::Download(e) => Self::Upstream(e.to_string()),
            PipelineError::Storage(e) => Self::Internal(e.to_string()),
            PipelineError::Media(e) => Self::Internal(e.to_string()),
            PipelineError::Internal(msg) => Self::Internal(msg),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    credits_needed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay out of production responses.
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let (credits_needed, current_balance) = match &self {
            ApiError::InsufficientCredits { needed, balance } => (Some(*needed), Some(*balance)),
            _ => (None, None),
        };
        let retry_after_seconds = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let body = ErrorResponse {
            detail,
            credits_needed,
            current_balance,
            retry_after_seconds,
        };

        if let ApiError::RateLimited { retry_after } = &self {
            return (
                status,
                [("Retry-After", retry_after.to_string())],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_insufficient_credits_maps_to_payment_required() {
        let err: ApiError = PipelineError::InsufficientCredits {
            needed: 5,
            balance: 2,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(matches!(
            err,
            ApiError::InsufficientCredits {
                needed: 5,
                balance: 2
            }
        ));
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err: ApiError = PipelineError::RateLimited {
            reset_time: Utc::now() + Duration::seconds(120),
        }
        .into();
        match err {
            ApiError::RateLimited { retry_after } => {
                assert!(retry_after > 100 && retry_after <= 120);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_security_rejection_is_client_error() {
        let err: ApiError = PipelineError::Download(fable_media::DownloadError::BlockedHost(
            "169.254.169.254".to_string(),
        ))
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
