use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EngineError;
use crate::models::PredictionStatus;

// ---------------------------------------------------------------------------
// LifecycleAction
// ---------------------------------------------------------------------------

/// Every way a prediction's status can be asked to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// `pending` → `open`. Runs at creation; there is no draft workflow.
    Activate,
    /// `open` → `closed`. Early close by the creator is supported; the
    /// deadline does not have to have passed.
    Close,
    /// `open`/`closed` → `cancelled`. Illegal once settled — history is
    /// corrected through `dispute`, never cancelled.
    Cancel,
    /// `closed` (or `open` past the deadline, see [`can_settle`]) →
    /// `awaiting_settlement`.
    RequestSettlement,
    /// `awaiting_settlement` → `settled`.
    CompleteSettlement,
    /// `settled` → `disputed`, within the dispute window.
    Dispute,
    /// `disputed` → `settled`: prior settlement stands.
    ResolveUphold,
    /// `disputed` → `awaiting_settlement`: re-settle with corrected winner.
    ResolveReverse,
    /// `cancelled` → `refunded` once the refund sweep completes; also
    /// `awaiting_settlement` → `refunded` for the zero-winner push case.
    CompleteRefund,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LifecycleAction {
    fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Activate => "activate",
            LifecycleAction::Close => "close",
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::RequestSettlement => "request_settlement",
            LifecycleAction::CompleteSettlement => "complete_settlement",
            LifecycleAction::Dispute => "dispute",
            LifecycleAction::ResolveUphold => "resolve_uphold",
            LifecycleAction::ResolveReverse => "resolve_reverse",
            LifecycleAction::CompleteRefund => "complete_refund",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Pure transition table. Rejects (never silently ignores) an action
/// attempted from an incompatible state, naming current and requested.
pub fn transition(
    current: PredictionStatus,
    action: LifecycleAction,
) -> Result<PredictionStatus, EngineError> {
    use LifecycleAction as A;
    use PredictionStatus as S;

    let next = match (current, action) {
        (S::Pending, A::Activate) => S::Open,
        (S::Open, A::Close) => S::Closed,
        (S::Open, A::Cancel) | (S::Closed, A::Cancel) => S::Cancelled,
        // Settlement from `open` is additionally time-guarded in
        // `can_settle`; the table itself only knows statuses.
        (S::Open, A::RequestSettlement) | (S::Closed, A::RequestSettlement) => {
            S::AwaitingSettlement
        }
        (S::AwaitingSettlement, A::CompleteSettlement) => S::Settled,
        (S::Settled, A::Dispute) => S::Disputed,
        (S::Disputed, A::ResolveUphold) => S::Settled,
        (S::Disputed, A::ResolveReverse) => S::AwaitingSettlement,
        (S::Cancelled, A::CompleteRefund) | (S::AwaitingSettlement, A::CompleteRefund) => {
            S::Refunded
        }
        _ => {
            return Err(EngineError::InvalidTransition {
                current,
                requested: action.as_str(),
            })
        }
    };
    Ok(next)
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Entries are legal only while open and before the deadline.
pub fn can_place_entry(
    status: PredictionStatus,
    now: DateTime<Utc>,
    entry_deadline: DateTime<Utc>,
) -> bool {
    status == PredictionStatus::Open && now < entry_deadline
}

/// Settlement is legal from `closed`, from `awaiting_settlement` (a retry
/// of an interrupted attempt), or from `open` once the entry deadline has
/// passed — a scheduler need not close first.
pub fn can_settle(
    status: PredictionStatus,
    now: DateTime<Utc>,
    entry_deadline: DateTime<Utc>,
) -> bool {
    match status {
        PredictionStatus::Closed | PredictionStatus::AwaitingSettlement => true,
        PredictionStatus::Open => now >= entry_deadline,
        _ => false,
    }
}

/// Cancellation is legal pre-settlement only.
pub fn can_cancel(status: PredictionStatus) -> bool {
    matches!(status, PredictionStatus::Open | PredictionStatus::Closed)
}

// ---------------------------------------------------------------------------
// TransitionRecord
// ---------------------------------------------------------------------------

/// Audit record of one applied transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PredictionStatus,
    pub to: PredictionStatus,
    pub action: LifecycleAction,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_happy_path_to_settled() {
        let mut status = PredictionStatus::Pending;
        for action in [
            LifecycleAction::Activate,
            LifecycleAction::Close,
            LifecycleAction::RequestSettlement,
            LifecycleAction::CompleteSettlement,
        ] {
            status = transition(status, action).unwrap();
        }
        assert_eq!(status, PredictionStatus::Settled);
    }

    #[test]
    fn test_dispute_reverse_reaches_awaiting_settlement() {
        let status = transition(PredictionStatus::Settled, LifecycleAction::Dispute).unwrap();
        assert_eq!(status, PredictionStatus::Disputed);

        let upheld = transition(status, LifecycleAction::ResolveUphold).unwrap();
        assert_eq!(upheld, PredictionStatus::Settled);

        let reversed = transition(status, LifecycleAction::ResolveReverse).unwrap();
        assert_eq!(reversed, PredictionStatus::AwaitingSettlement);
    }

    #[test]
    fn test_cancel_after_settlement_rejected() {
        let err = transition(PredictionStatus::Settled, LifecycleAction::Cancel).unwrap_err();
        match err {
            EngineError::InvalidTransition { current, requested } => {
                assert_eq!(current, PredictionStatus::Settled);
                assert_eq!(requested, "cancel");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_push_case_refund_from_awaiting_settlement() {
        let status = transition(
            PredictionStatus::AwaitingSettlement,
            LifecycleAction::CompleteRefund,
        )
        .unwrap();
        assert_eq!(status, PredictionStatus::Refunded);
    }

    #[test]
    fn test_place_entry_guard_respects_deadline() {
        let deadline = Utc::now();
        let before = deadline - Duration::minutes(1);
        let after = deadline + Duration::minutes(1);

        assert!(can_place_entry(PredictionStatus::Open, before, deadline));
        assert!(!can_place_entry(PredictionStatus::Open, after, deadline));
        assert!(!can_place_entry(PredictionStatus::Closed, before, deadline));
    }

    #[test]
    fn test_settle_guard_allows_open_past_deadline() {
        let deadline = Utc::now();
        let before = deadline - Duration::minutes(1);
        let after = deadline + Duration::minutes(1);

        assert!(!can_settle(PredictionStatus::Open, before, deadline));
        assert!(can_settle(PredictionStatus::Open, after, deadline));
        assert!(can_settle(PredictionStatus::Closed, before, deadline));
        assert!(!can_settle(PredictionStatus::Settled, after, deadline));
    }
}
