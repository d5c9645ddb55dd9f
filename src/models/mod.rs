pub mod entry;
pub mod prediction;
pub mod snapshot;

pub use entry::{Entry, EntryStatus};
pub use prediction::{NewPrediction, Prediction, PredictionOption};
pub use snapshot::PoolSnapshot;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// PredictionStatus
// ---------------------------------------------------------------------------

/// Persisted lifecycle status of a prediction.
///
/// "ended" (open but past the entry deadline) is deliberately not a variant:
/// it is a display-only derivation, see [`Prediction::is_ended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Open,
    Closed,
    AwaitingSettlement,
    Settled,
    Disputed,
    Cancelled,
    Refunded,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PredictionStatus::Pending => "pending",
            PredictionStatus::Open => "open",
            PredictionStatus::Closed => "closed",
            PredictionStatus::AwaitingSettlement => "awaiting_settlement",
            PredictionStatus::Settled => "settled",
            PredictionStatus::Disputed => "disputed",
            PredictionStatus::Cancelled => "cancelled",
            PredictionStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// PredictionType / SettlementMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    Binary,
    MultiOutcome,
    Pool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMethod {
    Auto,
    Manual,
}

// ---------------------------------------------------------------------------
// DisputeResolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolution {
    /// Prior settlement stands; prediction returns to `settled`.
    Uphold,
    /// Prior settlement is invalidated; re-settle with a corrected winner.
    Reverse,
}

impl fmt::Display for DisputeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisputeResolution::Uphold => write!(f, "uphold"),
            DisputeResolution::Reverse => write!(f, "reverse"),
        }
    }
}
