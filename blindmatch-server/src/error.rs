use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blindmatch_core::CoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidPaperId(_) | CoreError::NoMatchFound(_) => {
                ServerError::NotFound(message)
            }
            CoreError::AlreadyRevealed(_)
            | CoreError::RequestInFlight(_)
            | CoreError::DuplicateRequest(_) => ServerError::Conflict(message),
            CoreError::InvalidRequest(_) | CoreError::ProofRejected { .. } => {
                ServerError::Forbidden(message)
            }
            CoreError::ConsentRequired(_) => ServerError::PreconditionFailed(message),
            CoreError::NoReviewersAvailable => ServerError::Unprocessable(message),
            CoreError::ReviewerMismatch { .. } | CoreError::MalformedCleartext(_) => {
                ServerError::BadRequest(message)
            }
            _ => ServerError::Internal(message),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ServerError::PreconditionFailed(msg) => (StatusCode::PRECONDITION_FAILED, msg.clone()),
            ServerError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
