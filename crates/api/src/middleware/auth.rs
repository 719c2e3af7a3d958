//! Account resolution middleware for wallet routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{AppState, error::ApiError};
use wallet_shared::AppError;

/// Strips an optional bearer scheme from the Authorization header value.
fn extract_token(header: &str) -> &str {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}

/// Middleware that resolves the caller's wallet account.
///
/// This middleware:
/// 1. Reads the token from the Authorization header
/// 2. Looks it up in the account directory
/// 3. Stores the account id in request extensions for handlers to access
///
/// Unknown or missing tokens are answered with 401.
pub async fn account_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(extract_token)
        .unwrap_or_default();

    let Some(account_id) = state.directory.resolve(token) else {
        warn!(token, "token not found");
        return ApiError(AppError::Unauthorized("unknown token".to_string())).into_response();
    };

    let account = AuthAccount(account_id.to_string());
    request.extensions_mut().insert(account);
    next.run(request).await
}

/// Extractor for the account resolved by [`account_middleware`].
#[derive(Debug, Clone)]
pub struct AuthAccount(pub String);

impl AuthAccount {
    /// Returns the account id.
    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError(AppError::Unauthorized("authentication required".to_string())))
    }
}
