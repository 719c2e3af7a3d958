//! Database migration runner for the wallet service.
//!
//! Usage:
//!   migrator up      - Create the wallet tables and seed the pseudo-account
//!   migrator down    - Drop the wallet tables
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! Reads `DATABASE_URL` from the environment or `.env`.

use sea_orm_migration::prelude::*;
use wallet_db::migration::Migrator;

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Run the migrator CLI (it sets up its own tracing)
    cli::run_cli(Migrator).await;
}
