//! Wallet API endpoints.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    ServerError,
    server::{Actor, ServerState},
    types::wallet::{TopUp, WalletBalance, WalletTransactionList, WalletTransactionView},
};
use engine::WalletTransaction;

fn transaction_view(tx: WalletTransaction) -> WalletTransactionView {
    WalletTransactionView {
        id: tx.id,
        amount: tx.amount,
        kind: tx.kind.as_str().to_string(),
        source: tx.source.as_str().to_string(),
        booking_id: tx.booking_id,
        created_at: tx.created_at,
    }
}

/// Balance of the caller's wallet, created on first access.
pub async fn balance(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<WalletBalance>, ServerError> {
    let wallet = state.engine.wallet(&user_id).await?;
    Ok(Json(WalletBalance {
        user_id: wallet.user_id,
        balance: wallet.balance,
    }))
}

pub async fn transactions(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
) -> Result<Json<WalletTransactionList>, ServerError> {
    let transactions = state.engine.wallet_transactions(&user_id).await?;
    Ok(Json(WalletTransactionList {
        transactions: transactions.into_iter().map(transaction_view).collect(),
    }))
}

pub async fn top_up(
    Extension(Actor(user_id)): Extension<Actor>,
    State(state): State<ServerState>,
    Json(payload): Json<TopUp>,
) -> Result<(StatusCode, Json<WalletBalance>), ServerError> {
    state.engine.top_up(&user_id, payload.amount).await?;
    let wallet = state.engine.wallet(&user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(WalletBalance {
            user_id: wallet.user_id,
            balance: wallet.balance,
        }),
    ))
}
