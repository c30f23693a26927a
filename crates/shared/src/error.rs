use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified outcome of a failed upstream call. Every variant resolves to
/// a flashed redirect (page routes) or a JSON error body (API routes);
/// none is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    #[error("upstream rejected the session token")]
    Unauthorized,
    #[error("upstream denied the operation")]
    Forbidden { hint: Option<String> },
    #[error("upstream resource not found")]
    NotFound,
    #[error("upstream rejected the payload: {detail}")]
    Validation { detail: String },
    #[error("upstream server error (status {status})")]
    Server { status: u16 },
    #[error("upstream service is unreachable")]
    Unreachable,
    #[error("upstream call timed out")]
    Timeout,
    #[error("upstream response was malformed: {context}")]
    Malformed { context: String },
}

impl UpstreamFailure {
    /// Status code mirrored back on API-style routes.
    pub fn status(&self) -> u16 {
        match self {
            UpstreamFailure::Unauthorized => 401,
            UpstreamFailure::Forbidden { .. } => 403,
            UpstreamFailure::NotFound => 404,
            UpstreamFailure::Validation { .. } => 400,
            UpstreamFailure::Server { status } => *status,
            UpstreamFailure::Unreachable | UpstreamFailure::Timeout => 502,
            UpstreamFailure::Malformed { .. } => 502,
        }
    }

    /// One-line message suitable for a flash on a browser-facing route.
    pub fn user_message(&self) -> String {
        match self {
            UpstreamFailure::Unauthorized => {
                "Your session has expired. Please sign in again.".to_string()
            }
            UpstreamFailure::Forbidden { hint: Some(hint) } => {
                format!("You do not have permission for this action ({hint}).")
            }
            UpstreamFailure::Forbidden { hint: None } => {
                "You do not have permission for this action.".to_string()
            }
            UpstreamFailure::NotFound => "The requested record was not found.".to_string(),
            UpstreamFailure::Validation { detail } => detail.clone(),
            UpstreamFailure::Server { .. } => {
                "The academic service reported an internal error. Try again later.".to_string()
            }
            UpstreamFailure::Unreachable | UpstreamFailure::Timeout => {
                "The academic service is offline. Try again later.".to_string()
            }
            UpstreamFailure::Malformed { .. } => {
                "The academic service returned an unexpected response.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Upstream,
    Internal,
}

/// Wire shape for JSON errors returned by this front-end's API routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub error: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }
}

impl From<&UpstreamFailure> for ApiError {
    fn from(failure: &UpstreamFailure) -> Self {
        let code = match failure {
            UpstreamFailure::Unauthorized => ErrorCode::Unauthorized,
            UpstreamFailure::Forbidden { .. } => ErrorCode::Forbidden,
            UpstreamFailure::NotFound => ErrorCode::NotFound,
            UpstreamFailure::Validation { .. } => ErrorCode::Validation,
            UpstreamFailure::Server { .. }
            | UpstreamFailure::Unreachable
            | UpstreamFailure::Timeout
            | UpstreamFailure::Malformed { .. } => ErrorCode::Upstream,
        };
        ApiError::new(code, failure.user_message())
    }
}
