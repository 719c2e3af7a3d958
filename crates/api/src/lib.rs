//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - Wallet routes under `/api/v1/wallet`
//! - Token to account resolution middleware
//! - Error to response mapping

pub mod directory;
pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wallet_core::WalletService;

pub use directory::AccountDirectory;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Wallet verbs over the ledger.
    pub wallet: Arc<WalletService>,
    /// Token to account id table.
    pub directory: Arc<AccountDirectory>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
