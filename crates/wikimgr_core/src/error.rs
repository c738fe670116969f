use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Classified failure surface for every operation in this crate.
///
/// Single-item operations propagate the first fatal error; bulk operations
/// fold item errors into their report and only surface `BadRequest` for an
/// empty batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "code", content = "message", rename_all = "snake_case")]
pub enum WikiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    PolicyViolation { segment: String, message: String },
    /// Upstream was reachable but rejected the operation (including a
    /// well-formed GraphQL error payload on an HTTP 200 envelope).
    #[error("{0}")]
    Upstream(String),
    /// Upstream unreachable after exhausting the retry budget.
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Configuration(String),
}

impl WikiError {
    pub fn policy_violation(segment: &str, min_len: usize) -> Self {
        WikiError::PolicyViolation {
            segment: segment.to_string(),
            message: format!(
                "Path segment '{segment}' must be at least {min_len} characters. \
                 Consider renaming (e.g., 'AI' -> 'artificial-intelligence')."
            ),
        }
    }

    /// HTTP status an API surface would map this error to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WikiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WikiError::NotFound(_) => StatusCode::NOT_FOUND,
            WikiError::PolicyViolation { .. } => StatusCode::BAD_REQUEST,
            WikiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WikiError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
            WikiError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code used in serialized reports.
    pub fn code(&self) -> &'static str {
        match self {
            WikiError::BadRequest(_) => "bad_request",
            WikiError::NotFound(_) => "not_found",
            WikiError::PolicyViolation { .. } => "policy_violation",
            WikiError::Upstream(_) => "upstream_error",
            WikiError::Network(_) => "network_error",
            WikiError::Configuration(_) => "configuration_error",
        }
    }
}

pub type WikiResult<T> = Result<T, WikiError>;
