//! Wallet schema: accounts, the journal and idempotency keys.
//!
//! Also seeds the pseudo-account that deposits draw from and withdrawals
//! pay into.

use sea_orm_migration::prelude::*;
use wallet_core::ledger::{PSEUDO_ACCOUNT, PSEUDO_ACCOUNT_FLOAT};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SCHEMA_SQL).await?;
        db.execute_unprepared(&seed_pseudo_account_sql()).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS trade_key, ledger_entry, account CASCADE;",
        )
        .await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r"
-- Current balance per account, in minor units
CREATE TABLE account (
    id BIGSERIAL PRIMARY KEY,
    account_id VARCHAR(64) NOT NULL UNIQUE,
    balance BIGINT NOT NULL DEFAULT 0,
    CONSTRAINT chk_account_balance_non_negative CHECK (balance >= 0)
);

-- Append-only journal; every trade writes one decrease and one increase
CREATE TABLE ledger_entry (
    id BIGSERIAL PRIMARY KEY,
    account_id VARCHAR(64) NOT NULL,
    direction SMALLINT NOT NULL,
    amount BIGINT NOT NULL,
    timestamp_ms BIGINT NOT NULL,
    trade_id VARCHAR(64) NOT NULL,
    CONSTRAINT chk_ledger_entry_direction CHECK (direction IN (1, 2)),
    CONSTRAINT chk_ledger_entry_amount CHECK (amount >= 0)
);

CREATE INDEX idx_ledger_entry_trade ON ledger_entry(trade_id);
CREATE INDEX idx_ledger_entry_account ON ledger_entry(account_id, timestamp_ms);

-- Caller-supplied keys of committed trades and the dealing each one carried out
CREATE TABLE trade_key (
    idempotency_key VARCHAR(256) PRIMARY KEY,
    trade_id VARCHAR(64) NOT NULL,
    from_account_id VARCHAR(64) NOT NULL,
    to_account_id VARCHAR(64) NOT NULL,
    amount BIGINT NOT NULL,
    timestamp_ms BIGINT NOT NULL
);
";

fn seed_pseudo_account_sql() -> String {
    format!(
        "INSERT INTO account (account_id, balance) VALUES ('{PSEUDO_ACCOUNT}', {PSEUDO_ACCOUNT_FLOAT}) \
         ON CONFLICT (account_id) DO NOTHING;"
    )
}
