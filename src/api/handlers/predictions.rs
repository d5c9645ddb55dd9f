use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::errors::EngineError;
use crate::lifecycle::{LifecycleAction, TransitionRecord};
use crate::models::{DisputeResolution, NewPrediction, PoolSnapshot, Prediction, PredictionOption};
use crate::odds;
use crate::settlement::SettlementResult;
use crate::AppState;

/// Option view with the derived pricing the client renders.
#[derive(Serialize)]
pub struct OptionView {
    #[serde(flatten)]
    pub option: PredictionOption,
    pub current_odds: Option<Decimal>,
    pub pool_share: Decimal,
}

#[derive(Serialize)]
pub struct PredictionDetail {
    pub prediction: Prediction,
    /// Derived display value only, never persisted as a status.
    pub ended: bool,
    pub options: Vec<OptionView>,
    pub transitions: Vec<TransitionRecord>,
}

fn detail_from(snapshot: PoolSnapshot) -> Result<PredictionDetail, EngineError> {
    let now = Utc::now();
    let options = snapshot
        .options
        .iter()
        .map(|o| {
            Ok(OptionView {
                current_odds: odds::compute_odds(&snapshot, o.id)?,
                pool_share: odds::pool_share(&snapshot, o.id)?,
                option: o.clone(),
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    Ok(PredictionDetail {
        ended: snapshot.prediction.is_ended(now),
        prediction: snapshot.prediction,
        options,
        transitions: snapshot.transitions,
    })
}

/// POST /api/predictions
pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewPrediction>,
) -> Result<Json<ApiResponse<PredictionDetail>>, EngineError> {
    let snapshot = state.ledger.create_prediction(new, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(detail_from(snapshot)?)))
}

/// GET /api/predictions/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PredictionDetail>>, EngineError> {
    let snapshot = state.ledger.get_snapshot(id).await?;
    Ok(Json(ApiResponse::ok(detail_from(snapshot)?)))
}

/// DELETE /api/predictions/:id — only for predictions with zero entries.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Uuid>>, EngineError> {
    state.ledger.delete_prediction(id).await?;
    Ok(Json(ApiResponse::ok(id)))
}

/// POST /api/predictions/:id/close — explicit early close by the creator.
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PredictionDetail>>, EngineError> {
    let now = Utc::now();
    let book = state.ledger.book(id).await?;
    let snapshot = {
        let mut book = book.lock().await;
        book.apply_transition(LifecycleAction::Close, now)?;
        book.snapshot(now)
    };
    Ok(Json(ApiResponse::ok(detail_from(snapshot)?)))
}

#[derive(Deserialize)]
pub struct SettleRequest {
    pub winning_option_id: Uuid,
    /// Retries reuse the same attempt id so credits dedupe in the wallet.
    pub attempt_id: Option<Uuid>,
}

/// POST /api/predictions/:id/settle
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<ApiResponse<SettlementResult>>, EngineError> {
    let result = state
        .settlement
        .settle(id, req.winning_option_id, req.attempt_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/predictions/:id/cancel — full refund sweep, no fees.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SettlementResult>>, EngineError> {
    let result = state.settlement.cancel_and_refund(id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/predictions/:id/dispute
pub async fn dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Uuid>>, EngineError> {
    state.settlement.dispute(id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(id)))
}

#[derive(Deserialize)]
pub struct ResolveRequest {
    pub resolution: DisputeResolution,
    pub corrected_winning_option_id: Option<Uuid>,
}

/// POST /api/predictions/:id/resolve
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<Option<SettlementResult>>>, EngineError> {
    let result = state
        .settlement
        .resolve_dispute(id, req.resolution, req.corrected_winning_option_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}
