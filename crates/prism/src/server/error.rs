//! API errors and their HTTP representation.
//!
//! Every error leaves the server as `{error, message, code}` JSON with a
//! status derived from the underlying failure.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use prism_core::{EvaluationError, PrismError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable message
    pub message: String,
    /// Code for programmatic handling
    pub code: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body could not be read as the expected JSON
    #[error("Invalid request body: {message}")]
    InvalidBody { status: StatusCode, message: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// No judge provider is configured
    #[error("Evaluation unavailable: {0}")]
    Unavailable(String),

    /// An upstream provider call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody { status, .. } => *status,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(e) if e.is_constraint_violation() => StatusCode::CONFLICT,
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidBody { .. } => "INVALID_BODY",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Unavailable(_) => "NO_JUDGE",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Store(e) if e.is_constraint_violation() => "DB_CONSTRAINT_VIOLATION",
            ApiError::Store(StoreError::NotFound { .. }) => "DB_NOT_FOUND",
            ApiError::Store(_) => "DB_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidBody { .. } => "InvalidBody",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Unavailable(_) => "Unavailable",
            ApiError::Upstream(_) => "UpstreamError",
            ApiError::Store(_) => "StoreError",
            ApiError::Internal(_) => "InternalError",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PrismError> for ApiError {
    fn from(error: PrismError) -> Self {
        match error {
            PrismError::UnknownTask(_) | PrismError::Template(_) | PrismError::InvalidInput(_) => {
                ApiError::BadRequest(error.to_string())
            }
            PrismError::Store(e) => ApiError::Store(e),
            PrismError::Evaluation(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(error: EvaluationError) -> Self {
        match error {
            EvaluationError::NoJudge => ApiError::Unavailable(error.to_string()),
            EvaluationError::JudgeFailed { .. } => ApiError::Upstream(error.to_string()),
            EvaluationError::Template(_) => ApiError::BadRequest(error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse {
            error: self.error_type().to_string(),
            message: self.to_string(),
            code: self.code().to_string(),
        };

        if status.is_server_error() {
            tracing::error!("API error: {:?}", body);
        } else {
            tracing::debug!("API error: {:?}", body);
        }

        (status, Json(body)).into_response()
    }
}
