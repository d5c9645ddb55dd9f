use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Won,
    Lost,
    Refunded,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Active => "active",
            EntryStatus::Won => "won",
            EntryStatus::Lost => "lost",
            EntryStatus::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// One user's stake on one option.
///
/// Created only while the owning prediction is open; moves to `won`/`lost`
/// exactly once at settlement, or to `refunded` via the cancellation path.
/// Funds custody lives with the wallet collaborator, which references
/// entries but does not own them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub prediction_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    /// Stake in integer minor currency units.
    pub amount: i64,
    pub status: EntryStatus,
    /// Final payout in minor units. `None` until the entry reaches a
    /// terminal status.
    pub actual_payout: Option<i64>,
    pub created_at: DateTime<Utc>,
}
