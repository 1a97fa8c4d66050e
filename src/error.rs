/// Unified error types for the automation service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the automation pipeline
#[derive(Error, Debug)]
pub enum AutomationError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Account is already inside a running warmup
    #[error("Account is already warming")]
    AccountAlreadyWarming,

    /// Run lookup failed
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// Run exists but is no longer running
    #[error("Run is not running: {0}")]
    NotRunning(String),

    /// A specific content reference points at nothing
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// A random pick had an empty candidate pool
    #[error("No content available: {0}")]
    NoContentAvailable(String),

    /// Carousel must reference between 2 and 10 images
    #[error("Invalid carousel size: {0}")]
    InvalidCarouselSize(usize),

    /// Errors reported by the external publish collaborator
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic not-found (accounts, sequences, templates)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert AutomationError to an HTTP response
impl IntoResponse for AutomationError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AutomationError::AccountAlreadyWarming => {
                (StatusCode::CONFLICT, "AccountAlreadyWarming")
            }
            AutomationError::NotRunning(_) => (StatusCode::CONFLICT, "NotRunning"),
            AutomationError::RunNotFound(_) => (StatusCode::NOT_FOUND, "RunNotFound"),
            AutomationError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            AutomationError::ContentNotFound(_) => (StatusCode::NOT_FOUND, "ContentNotFound"),
            AutomationError::NoContentAvailable(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NoContentAvailable")
            }
            AutomationError::InvalidCarouselSize(_) => {
                (StatusCode::BAD_REQUEST, "InvalidCarouselSize")
            }
            AutomationError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            AutomationError::Publish(_) => (StatusCode::BAD_GATEWAY, "PublishFailed"),
            AutomationError::Database(_)
            | AutomationError::Internal(_)
            | AutomationError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"),
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Don't leak details
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for automation operations
pub type AutomationResult<T> = Result<T, AutomationError>;
