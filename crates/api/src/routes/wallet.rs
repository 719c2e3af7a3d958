//! Wallet routes: deposit, withdraw, transfer and balance.
//!
//! Idempotency keys are scoped to the authenticated account before they reach
//! the ledger, so two accounts can never collide on the same key.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError, middleware::AuthAccount};

/// Creates the wallet routes (requires the account middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallet/deposit", post(deposit))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/transfer", post(transfer))
        .route("/wallet/account", get(get_account))
}

/// Request body for deposits and withdrawals.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// Optional key making retries of the same request safe.
    pub idempotency_key: Option<String>,
}

/// Request body for transfers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Amount in minor units.
    pub amount: i64,
    /// Destination account id.
    pub to_account: String,
    /// Optional key making retries of the same request safe.
    pub idempotency_key: Option<String>,
}

/// Response for any committed trade.
#[derive(Debug, Serialize, Deserialize)]
pub struct TradeResponse {
    /// Identifier shared by both journal entries of the trade.
    #[serde(rename = "tradeID")]
    pub trade_id: String,
}

/// Response for balance lookups.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    /// Account id.
    #[serde(rename = "accountID")]
    pub account_id: String,
    /// Balance in minor units.
    pub balance: i64,
}

/// Prefixes a client key with the account that sent it.
fn scoped_key(account: &AuthAccount, key: Option<&str>) -> Option<String> {
    key.map(|key| format!("{}/{key}", account.account_id()))
}

async fn deposit(
    State(state): State<AppState>,
    account: AuthAccount,
    Json(body): Json<AmountRequest>,
) -> Result<Json<TradeResponse>, ApiError> {
    let key = scoped_key(&account, body.idempotency_key.as_deref());
    let trade_id = state
        .wallet
        .deposit_with_key(account.account_id(), body.amount, key.as_deref())
        .await?;
    info!(account_id = account.account_id(), amount = body.amount, %trade_id, "deposit");
    Ok(Json(TradeResponse { trade_id }))
}

async fn withdraw(
    State(state): State<AppState>,
    account: AuthAccount,
    Json(body): Json<AmountRequest>,
) -> Result<Json<TradeResponse>, ApiError> {
    let key = scoped_key(&account, body.idempotency_key.as_deref());
    let trade_id = state
        .wallet
        .withdraw_with_key(account.account_id(), body.amount, key.as_deref())
        .await?;
    info!(account_id = account.account_id(), amount = body.amount, %trade_id, "withdraw");
    Ok(Json(TradeResponse { trade_id }))
}

async fn transfer(
    State(state): State<AppState>,
    account: AuthAccount,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TradeResponse>, ApiError> {
    let key = scoped_key(&account, body.idempotency_key.as_deref());
    let trade_id = state
        .wallet
        .transfer_with_key(
            account.account_id(),
            &body.to_account,
            body.amount,
            key.as_deref(),
        )
        .await?;
    info!(
        from = account.account_id(),
        to = %body.to_account,
        amount = body.amount,
        %trade_id,
        "transfer"
    );
    Ok(Json(TradeResponse { trade_id }))
}

async fn get_account(
    State(state): State<AppState>,
    account: AuthAccount,
) -> Result<Json<AccountResponse>, ApiError> {
    let found = state.wallet.get_account(account.account_id()).await?;
    Ok(Json(AccountResponse {
        account_id: found.account_id,
        balance: found.balance,
    }))
}
