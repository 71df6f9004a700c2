//! Error types for the playground server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use codepad_core::{AdvisorError, EngineError};
use serde_json::json;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed body, unknown language or task, or rejected source
    #[error("{0}")]
    InvalidRequest(String),

    /// The engine could not run the submission at all
    #[error("Execution failed: {0}")]
    Execution(String),

    /// The code assistant is missing or its service failed
    #[error("AI assistant unavailable: {0}")]
    AssistantUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::AssistantUnavailable(_) => 502,
            ServerError::Execution(_)
            | ServerError::Io(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Execution(_) => "execution_error",
            ServerError::AssistantUnavailable(_) => "assistant_unavailable",
            ServerError::Io(_) => "io_error",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        if err.is_client_error() {
            ServerError::InvalidRequest(err.to_string())
        } else {
            ServerError::Execution(err.to_string())
        }
    }
}

impl From<AdvisorError> for ServerError {
    fn from(err: AdvisorError) -> Self {
        ServerError::AssistantUnavailable(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("{} ({}): {}", status, self.error_type(), self);
        } else {
            log::debug!("{} ({}): {}", status, self.error_type(), self);
        }

        let body = match &self {
            ServerError::Execution(details) => json!({
                "error": "Execution failed",
                "details": details,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
