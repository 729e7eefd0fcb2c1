//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::DomainError;
use crate::infrastructure::broker::BrokerError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Handler already registered for {0}")]
    DuplicateRegistration(&'static str),

    #[error("Handler not registered for {0}")]
    HandlerNotRegistered(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::EmptyText | DomainError::TextTooLong(_) => {
                AppError::Validation(error.to_string())
            }
            DomainError::ListenerAlreadyExists(_) => AppError::Conflict(error.to_string()),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Field-level validation error
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, 10001, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, 10002, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, 10005, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, 10007, msg.clone()),
            AppError::Broker(e) => {
                tracing::error!("Broker error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    10008,
                    "Message broker unavailable".into(),
                )
            }
            AppError::DuplicateRegistration(_)
            | AppError::HandlerNotRegistered(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
        };

        let body = ErrorResponse {
            code,
            message,
            errors: None,
        };

        (status, Json(body)).into_response()
    }
}
