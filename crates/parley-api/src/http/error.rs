//! Application error type mapping to HTTP status codes and envelope format.

use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use parley_types::error::{RepositoryError, TurnError};
use parley_types::llm::LlmError;

use super::response::{ApiMeta, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Repository(RepositoryError),
    Turn(TurnError),
    /// The addressed chat does not exist.
    ChatNotFound,
    Validation(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        AppError::Turn(e)
    }
}

fn repository_parts(e: &RepositoryError) -> (StatusCode, &'static str, String) {
    match e {
        RepositoryError::NotFound => (
            StatusCode::NOT_FOUND,
            "CHAT_NOT_FOUND",
            "Chat not found".to_string(),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORAGE_ERROR",
            other.to_string(),
        ),
    }
}

impl AppError {
    /// Status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Repository(e) => repository_parts(e),
            AppError::ChatNotFound => (
                StatusCode::NOT_FOUND,
                "CHAT_NOT_FOUND",
                "Chat not found".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Turn(TurnError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Turn(TurnError::Storage(e)) => repository_parts(e),
            AppError::Turn(TurnError::ModelCall(
                e @ (LlmError::RateLimited { .. } | LlmError::Overloaded(_)),
            )) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MODEL_UNAVAILABLE",
                e.to_string(),
            ),
            AppError::Turn(TurnError::ModelCall(e)) => {
                (StatusCode::BAD_GATEWAY, "MODEL_ERROR", e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "Request failed");
        }
        ApiResponse::error(status, code, &message, ApiMeta::since(Instant::now())).into_response()
    }
}
