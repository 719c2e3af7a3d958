//! Application-wide error types.

use thiserror::Error;

/// Application error types.
///
/// Each variant carries the machine-readable code reported to clients next
/// to the human-readable message.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Client-facing error code.
        code: &'static str,
        /// Detail message.
        message: String,
    },

    /// Validation error.
    #[error("Validation error: {message}")]
    Validation {
        /// Client-facing error code.
        code: &'static str,
        /// Detail message.
        message: String,
    },

    /// Business rule violation.
    #[error("Business rule violation: {message}")]
    BusinessRule {
        /// Client-facing error code.
        code: &'static str,
        /// Detail message.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => 401,
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::BusinessRule { .. } => 422,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound { code, .. }
            | Self::Validation { code, .. }
            | Self::BusinessRule { code, .. } => *code,
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the message reported to clients.
    ///
    /// Server-side failures are reported generically; their detail stays in
    /// the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Unauthorized(message) => message.clone(),
            Self::NotFound { message, .. }
            | Self::Validation { message, .. }
            | Self::BusinessRule { message, .. } => message.clone(),
            Self::Database(_) | Self::Internal(_) => "internal server error".to_string(),
        }
    }
}
