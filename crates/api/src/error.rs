//! Mapping of domain errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use wallet_core::ledger::LedgerError;
use wallet_shared::AppError;

/// Error returned by handlers.
///
/// Renders as `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.error_code();
        let message = err.to_string();
        Self(match &err {
            _ if err.is_validation() => AppError::Validation { code, message },
            LedgerError::AccountNotFound(_) => AppError::NotFound { code, message },
            LedgerError::InsufficientFunds { .. } => AppError::BusinessRule { code, message },
            LedgerError::Aborted(_) => AppError::Internal(message),
            _ => AppError::Database(message),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(json!({
                "error": {
                    "code": self.0.error_code(),
                    "message": self.0.client_message(),
                }
            })),
        )
            .into_response()
    }
}
