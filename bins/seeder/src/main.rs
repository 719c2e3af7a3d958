//! Database seeder for wallet development and testing.
//!
//! Creates an account with a zero balance for every `[[directory]]` entry of
//! the loaded configuration. Existing accounts are left untouched.
//!
//! Usage: cargo run --bin seeder

use wallet_core::ledger::{LedgerStore, PSEUDO_ACCOUNT};
use wallet_db::PgLedgerStore;
use wallet_shared::AppConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().expect("Failed to load configuration");
    if config.directory.is_empty() {
        eprintln!("No [[directory]] entries configured, nothing to seed");
        return;
    }

    println!("Connecting to database...");
    let db = wallet_db::connect_with(&config.database)
        .await
        .expect("Failed to connect to database");
    let store = PgLedgerStore::new(db);

    match store.find_account(PSEUDO_ACCOUNT).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            eprintln!("Pseudo-account missing, run the migrator first");
            return;
        }
        Err(e) => {
            eprintln!("Failed to read pseudo-account: {e}");
            return;
        }
    }

    println!("Seeding demo accounts...");
    let mut inserted = 0;
    for entry in &config.directory {
        let (name, account_id) = (entry.token.as_str(), entry.account_id.as_str());
        match store.find_account(account_id).await {
            Ok(Some(_)) => println!("  {name} already exists, skipping..."),
            Ok(None) => match store.upsert_account(account_id, 0).await {
                Ok(()) => {
                    println!("  Created account for {name}: {account_id}");
                    inserted += 1;
                }
                Err(e) => eprintln!("Failed to insert account for {name}: {e}"),
            },
            Err(e) => eprintln!("Failed to look up account for {name}: {e}"),
        }
    }

    println!("  Inserted {inserted} accounts");
    println!("Seeding complete!");
}
