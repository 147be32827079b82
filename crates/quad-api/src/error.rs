use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Caller-visible error taxonomy. Precondition failures carry a short
/// human-readable reason; store failures are logged and surface as a
/// generic body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Event not found or not open for registration")]
    NotFoundOrClosed,

    #[error("Event is at full capacity")]
    CapacityFull,

    #[error("Already registered for this event")]
    AlreadyRegistered,

    #[error("Attendance already recorded for this event")]
    AlreadyAttended,

    #[error("Not authorized to do that")]
    Forbidden,

    #[error("Not a participant in this conversation")]
    NotAParticipant,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error")]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::AuthRequired | ApiError::InvalidToken | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) | ApiError::NotFoundOrClosed => StatusCode::NOT_FOUND,
            ApiError::CapacityFull
            | ApiError::AlreadyRegistered
            | ApiError::AlreadyAttended
            | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Forbidden | ApiError::NotAParticipant => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(e) => {
                error!("store failure: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
