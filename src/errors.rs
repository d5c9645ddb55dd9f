use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::models::PredictionStatus;

/// Typed failures for every ledger / lifecycle / settlement operation.
///
/// The engine never coerces an invalid request into a no-op: each rejected
/// call surfaces one of these to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("invalid transition: prediction is {current}, cannot {requested}")]
    InvalidTransition {
        current: PredictionStatus,
        requested: &'static str,
    },

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("prediction {0} is already settled")]
    AlreadySettled(uuid::Uuid),

    #[error("option {option_id} does not belong to prediction {prediction_id}")]
    ReferentialMismatch {
        prediction_id: uuid::Uuid,
        option_id: uuid::Uuid,
    },

    #[error("wallet operation failed: {0}")]
    WalletFailure(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            EngineError::InvalidState(_)
            | EngineError::OutOfRange(_)
            | EngineError::ReferentialMismatch { .. } => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            EngineError::InvalidTransition { .. } | EngineError::AlreadySettled(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            EngineError::WalletFailure(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            EngineError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}
