use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::core::geohash::GeohashError;
use crate::core::pagination::CursorError;
use crate::models::ErrorResponse;
use crate::services::rate_limit::Bucket;
use crate::services::store::StoreError;

/// Machine-readable error kind returned alongside every error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    RateLimitExceeded,
    Unavailable,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

/// Errors surfaced by the matching engine
///
/// Duplicate interaction or match inserts never appear here; the engine
/// resolves them to success before returning.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rate limit exceeded for {bucket}; retry in {retry_after_secs}s")]
    RateLimitExceeded { bucket: Bucket, retry_after_secs: u64 },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchError::Validation(_) => ErrorKind::ValidationError,
            MatchError::NotFound(_) => ErrorKind::NotFound,
            MatchError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            MatchError::Unavailable(_) => ErrorKind::Unavailable,
            MatchError::Internal(_) => ErrorKind::InternalError,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => MatchError::Unavailable(msg),
            StoreError::Duplicate(msg) => MatchError::Internal(format!("unresolved duplicate: {}", msg)),
            StoreError::Internal(msg) => MatchError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for MatchError {
    fn from(errors: validator::ValidationErrors) -> Self {
        MatchError::Validation(errors.to_string())
    }
}

impl From<GeohashError> for MatchError {
    fn from(err: GeohashError) -> Self {
        MatchError::Validation(err.to_string())
    }
}

impl From<CursorError> for MatchError {
    fn from(err: CursorError) -> Self {
        MatchError::Validation(err.to_string())
    }
}

pub type MatchResult<T> = Result<T, MatchError>;

impl ResponseError for MatchError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.kind().as_str(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.kind().as_str().to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        };

        let mut response = HttpResponse::build(status);
        if let MatchError::RateLimitExceeded { retry_after_secs, .. } = self {
            response.insert_header(("Retry-After", retry_after_secs.to_string()));
        }
        response.json(body)
    }
}
