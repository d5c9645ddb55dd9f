use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::errors::EngineError;
use crate::odds::{self, StakeQuote};
use crate::AppState;

#[derive(Deserialize)]
pub struct QuoteParams {
    pub option_id: Uuid,
    /// Proposed stake in minor currency units.
    pub amount: i64,
    /// Caller identity, for the `current` side of the quote.
    pub user_id: Uuid,
}

/// GET /api/predictions/:id/quote?option_id=&amount=&user_id=
///
/// Read-only: prices the proposed stake against a point-in-time snapshot,
/// mutating nothing.
pub async fn quote(
    State(state): State<AppState>,
    Path(prediction_id): Path<Uuid>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<ApiResponse<StakeQuote>>, EngineError> {
    let snapshot = state.ledger.get_snapshot(prediction_id).await?;
    let user_stake: i64 = state
        .ledger
        .user_entries(prediction_id, params.user_id)
        .await?
        .iter()
        .filter(|e| e.option_id == params.option_id)
        .map(|e| e.amount)
        .sum();

    let quote = odds::quote(&snapshot, params.option_id, user_stake, params.amount)?;
    Ok(Json(ApiResponse::ok(quote)))
}
