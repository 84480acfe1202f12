// HTTP-facing error type. Every handler returns AppResult so failures render as JSON { "error": ... }.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::controller::ControllerError;
use crate::form::ValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    InternalServerError(#[from] anyhow::Error),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Busy(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

impl From<BackendError> for AppError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::NotFound => AppError::NotFound("Not found".into()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<ControllerError> for AppError {
    fn from(error: ControllerError) -> Self {
        match error {
            ControllerError::Invalid(e) => AppError::Validation(e),
            ControllerError::Upstream { message, .. } => AppError::Upstream(message),
            other @ ControllerError::NoResult => AppError::NotFound(other.to_string()),
            other @ (ControllerError::Busy | ControllerError::Superseded) => AppError::Busy(other.to_string()),
            other @ ControllerError::Task(_) => AppError::InternalServerError(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InternalServerError(e) => {
                // Log the detailed error here; don't expose internal details to the client
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized access attempt: {}", message);
                (StatusCode::UNAUTHORIZED, message)
            }
            AppError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            AppError::Busy(message) => (StatusCode::CONFLICT, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Upstream(message) => {
                tracing::warn!("Upstream failure: {}", message);
                (StatusCode::BAD_GATEWAY, message)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
