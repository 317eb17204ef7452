//! Retry utilities for transient provider failures.
//!
//! Provides classification of retryable errors and exponential backoff.

use crate::error::LlmError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse category of a failed provider call, reported with each failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Auth,
    Timeout,
    Network,
    Server,
    BadRequest,
    InvalidResponse,
    Config,
    /// The call's task panicked or was cancelled
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Auth => "auth",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Server => "server",
            FailureKind::BadRequest => "bad_request",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::Config => "config",
            FailureKind::Internal => "internal",
        }
    }
}

/// Classify a provider error.
pub fn classify(error: &LlmError) -> FailureKind {
    match error {
        LlmError::Timeout { .. } => FailureKind::Timeout,
        LlmError::Network { .. } => FailureKind::Network,
        LlmError::Http { status, .. } => match *status {
            429 => FailureKind::RateLimited,
            401 | 403 => FailureKind::Auth,
            408 => FailureKind::Timeout,
            500..=599 => FailureKind::Server,
            _ => FailureKind::BadRequest,
        },
        LlmError::InvalidResponse { .. } | LlmError::EmptyResponse { .. } => {
            FailureKind::InvalidResponse
        }
        LlmError::MissingApiKey { .. }
        | LlmError::UnresolvedEndpoint { .. }
        | LlmError::UnknownProvider(_) => FailureKind::Config,
    }
}

/// Determine whether a provider error is worth retrying.
///
/// Retryable: timeouts, connection failures, server errors (5xx).
/// Surfaced immediately: rate limits (429), auth failures, bad requests,
/// unusable responses and configuration problems.
pub fn is_retryable(error: &LlmError) -> bool {
    matches!(
        classify(error),
        FailureKind::Timeout | FailureKind::Network | FailureKind::Server
    )
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt` with a cap at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}
