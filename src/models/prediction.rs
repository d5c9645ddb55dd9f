use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::{PredictionStatus, PredictionType, SettlementMethod};

/// Canonical prediction aggregate.
///
/// `pool_total` is owned by the Pool Ledger and always equals the sum of
/// `total_staked` across this prediction's options, which equals the sum of
/// `amount` over all non-refunded entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PredictionType,
    /// Minimum stake per entry, in minor currency units.
    pub stake_min: i64,
    /// Optional maximum stake per entry, in minor currency units.
    pub stake_max: Option<i64>,
    /// Percentage of the gross pool paid to the creator, in `[0, 100)`.
    pub creator_fee_percentage: Decimal,
    /// Percentage of the gross pool paid to the platform, in `[0, 100)`.
    pub platform_fee_percentage: Decimal,
    pub entry_deadline: DateTime<Utc>,
    pub settlement_method: SettlementMethod,
    pub status: PredictionStatus,
    /// Sum of all stakes ever placed, in minor units. Not reduced by
    /// refunds; current liability is read from entry statuses.
    pub pool_total: i64,
    pub winning_option_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Prediction {
    /// Display-only "ended" derivation: open but past the entry deadline.
    /// Never persisted as a status.
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.status == PredictionStatus::Open && now >= self.entry_deadline
    }
}

/// One selectable outcome of a prediction. Owned exclusively by its
/// prediction; the option set is immutable once the prediction leaves
/// `pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOption {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub label: String,
    /// Total staked on this option, in minor units. Monotonically
    /// non-decreasing while the prediction is open.
    pub total_staked: i64,
}

/// Creation payload for a prediction. Validated before the ledger opens
/// the book; opens directly as `open` (no draft workflow).
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrediction {
    pub creator_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PredictionType,
    pub options: Vec<String>,
    pub stake_min: i64,
    pub stake_max: Option<i64>,
    pub creator_fee_percentage: Decimal,
    pub platform_fee_percentage: Decimal,
    pub entry_deadline: DateTime<Utc>,
    pub settlement_method: SettlementMethod,
}

impl NewPrediction {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        if self.options.len() < 2 {
            return Err(EngineError::OutOfRange(format!(
                "a prediction needs at least 2 options, got {}",
                self.options.len()
            )));
        }
        if self.kind == PredictionType::Binary && self.options.len() != 2 {
            return Err(EngineError::OutOfRange(format!(
                "binary prediction needs exactly 2 options, got {}",
                self.options.len()
            )));
        }
        if self.stake_min < 1 {
            return Err(EngineError::OutOfRange(format!(
                "stake_min must be at least 1 minor unit, got {}",
                self.stake_min
            )));
        }
        if let Some(max) = self.stake_max {
            if max < self.stake_min {
                return Err(EngineError::OutOfRange(format!(
                    "stake_max {} is below stake_min {}",
                    max, self.stake_min
                )));
            }
        }
        for (name, pct) in [
            ("creator_fee_percentage", self.creator_fee_percentage),
            ("platform_fee_percentage", self.platform_fee_percentage),
        ] {
            if pct < Decimal::ZERO || pct >= Decimal::from(100) {
                return Err(EngineError::OutOfRange(format!(
                    "{name} must be in [0, 100), got {pct}"
                )));
            }
        }
        if self.creator_fee_percentage + self.platform_fee_percentage >= Decimal::from(100) {
            return Err(EngineError::OutOfRange(format!(
                "combined fees must stay below 100%, got {}",
                self.creator_fee_percentage + self.platform_fee_percentage
            )));
        }
        if self.entry_deadline <= now {
            return Err(EngineError::OutOfRange(format!(
                "entry_deadline {} is not in the future",
                self.entry_deadline
            )));
        }
        Ok(())
    }
}
