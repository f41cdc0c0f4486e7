//! Backend Error Types
//!
//! The error taxonomy of the delivery pipeline. Each variant maps to a
//! propagation policy: `InvalidInput` and `Auth` are rejected synchronously,
//! `TransientInfra` is surfaced only after retries are exhausted, and
//! `Parse` is logged and skipped by the consumer without stalling a batch.

use axum::http::StatusCode;
use thiserror::Error;

/// All errors the backend can produce.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Rejected submission input (empty receiver, whitespace-only body).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Log or store temporarily unavailable after exhausting retries.
    #[error("Transient infrastructure error: {message}")]
    TransientInfra { message: String },

    /// Malformed queued payload or wire frame.
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Missing or invalid session.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// JSON serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    /// Create an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a transient infrastructure error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientInfra {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// The HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::TransientInfra { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Parse { .. } => StatusCode::BAD_REQUEST,
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A human-readable error message.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
