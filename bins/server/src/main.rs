//! Wallet API Server
//!
//! Main entry point for the wallet backend service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_api::{AccountDirectory, AppState, create_router};
use wallet_core::{WalletService, ledger::Ledger};
use wallet_db::{PgLedgerStore, connect_with};
use wallet_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet=debug,wallet_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Connect to database
    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    // Build the ledger and the wallet verbs on top of it
    let trade_timeout = config.ledger.trade_timeout();
    let ledger = Ledger::new(Arc::new(PgLedgerStore::new(db))).with_trade_timeout(trade_timeout);
    let wallet = WalletService::new(Arc::new(ledger));
    info!(?trade_timeout, "Ledger configured");

    let directory = AccountDirectory::new(config.directory_table());
    if directory.is_empty() {
        warn!("Account directory is empty; every wallet request will be rejected");
    }

    // Create application state
    let state = AppState {
        wallet: Arc::new(wallet),
        directory: Arc::new(directory),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
