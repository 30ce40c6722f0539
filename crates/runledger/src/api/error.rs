//! Extraction API client error types.

use reqwest::StatusCode;
use thiserror::Error;

use crate::error::ValidationError;

/// Errors returned by [`ExtractionApiClient`](super::ExtractionApiClient).
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend refused a retry.
    #[error("{message}")]
    NotRetryable { status: u16, message: String },

    /// The response body did not match the expected shape, including an
    /// unknown status value.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Rejected before dispatch.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ApiError {
    pub fn is_not_retryable(&self) -> bool {
        matches!(self, ApiError::NotRetryable { .. })
    }

    /// Transport failures are recovered by trying again on the next poll.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    /// HTTP status of the response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::NotRetryable { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Picks the human message out of an error response.
///
/// Uses the body's `detail` field when present, otherwise
/// `"HTTP {code}: {reason}"`.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());

    match detail {
        Some(serde_json::Value::String(detail)) if !detail.is_empty() => detail,
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
            fallback_message(status)
        }
        Some(other) => other.to_string(),
    }
}

fn fallback_message(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}
