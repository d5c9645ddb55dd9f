use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::errors::EngineError;
use crate::models::Entry;
use crate::wallet::{Wallet, WalletError};
use crate::AppState;

#[derive(Deserialize)]
pub struct PlaceEntryRequest {
    pub option_id: Uuid,
    pub user_id: Uuid,
    /// Stake in minor currency units.
    pub amount: i64,
}

/// POST /api/predictions/:id/entries
///
/// The escrow choreography lives here, not in the ledger: reserve the
/// stake with the wallet first, place the entry, and release the
/// reservation if the ledger rejects it.
pub async fn place(
    State(state): State<AppState>,
    Path(prediction_id): Path<Uuid>,
    Json(req): Json<PlaceEntryRequest>,
) -> Result<Json<ApiResponse<Entry>>, EngineError> {
    // Demo mode: seed unseen accounts so the client can play immediately.
    if state.config.demo_wallet_seed > 0 && state.wallet.balance(req.user_id).await == 0 {
        state.wallet.deposit(req.user_id, state.config.demo_wallet_seed).await;
    }

    let reservation = state
        .wallet
        .reserve(req.user_id, req.amount)
        .await
        .map_err(|e| match e {
            WalletError::InsufficientFunds { .. } => EngineError::OutOfRange(e.to_string()),
            other => EngineError::WalletFailure(other.to_string()),
        })?;

    match state
        .ledger
        .place_entry(prediction_id, req.option_id, req.user_id, req.amount, Utc::now())
        .await
    {
        Ok(entry) => Ok(Json(ApiResponse::ok(entry))),
        Err(err) => {
            metrics::counter!("entries_rejected_total").increment(1);
            if let Err(release_err) = state.wallet.release(reservation).await {
                tracing::error!(
                    reservation_id = %reservation,
                    error = %release_err,
                    "Failed to release reservation after rejected entry"
                );
            }
            Err(err)
        }
    }
}

/// POST /api/entries/:id/refund
///
/// Entry-level refund for cancelled/refunded predictions; credits the
/// wallet for the full stake.
pub async fn refund(
    State(state): State<AppState>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Entry>>, EngineError> {
    let entry = state.ledger.refund_entry(entry_id).await?;

    state
        .wallet
        .credit(
            entry.user_id,
            entry.amount,
            "refund",
            &format!("{}:refund:{}", entry.prediction_id, entry.id),
        )
        .await
        .map_err(|e| EngineError::WalletFailure(e.to_string()))?;

    Ok(Json(ApiResponse::ok(entry)))
}
