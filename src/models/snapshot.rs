use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::TransitionRecord;
use crate::models::{Prediction, PredictionOption};

/// Point-in-time view of a prediction's pool, cloned out under the book
/// lock so it is never torn: `prediction.pool_total` and the option totals
/// always belong to the same write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub prediction: Prediction,
    pub options: Vec<PredictionOption>,
    pub transitions: Vec<TransitionRecord>,
    pub taken_at: DateTime<Utc>,
}

impl PoolSnapshot {
    pub fn option(&self, option_id: Uuid) -> Option<&PredictionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}
