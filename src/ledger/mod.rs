use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::lifecycle::{self, LifecycleAction, TransitionRecord};
use crate::models::{
    Entry, EntryStatus, NewPrediction, PoolSnapshot, Prediction, PredictionOption,
    PredictionStatus,
};
use crate::settlement::SettlementResult;

/// Everything the ledger tracks for one prediction, guarded by a single
/// per-prediction mutex. Holding the mutex across the aggregate-pair
/// update (`pool_total` + `option.total_staked`) plus the entry insert is
/// what rules out the lost-update race: two concurrent placements each see
/// the other's increment.
#[derive(Debug)]
pub struct PredictionBook {
    pub prediction: Prediction,
    pub options: Vec<PredictionOption>,
    pub entries: Vec<Entry>,
    pub transitions: Vec<TransitionRecord>,
    /// Settlement attempts already applied, keyed by attempt id. A replayed
    /// attempt answers with its recorded result instead of re-running.
    pub settlement_attempts: HashMap<Uuid, SettlementResult>,
}

impl PredictionBook {
    /// Apply a lifecycle action, recording the audit trail entry.
    /// Rejection comes straight from the transition table.
    pub fn apply_transition(
        &mut self,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let from = self.prediction.status;
        let to = lifecycle::transition(from, action)?;
        self.prediction.status = to;
        self.transitions.push(TransitionRecord {
            from,
            to,
            action,
            at: now,
        });
        tracing::info!(
            prediction_id = %self.prediction.id,
            from = %from,
            to = %to,
            action = %action,
            "Lifecycle transition"
        );
        Ok(())
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> PoolSnapshot {
        PoolSnapshot {
            prediction: self.prediction.clone(),
            options: self.options.clone(),
            transitions: self.transitions.clone(),
            taken_at: now,
        }
    }

    pub fn option_mut(&mut self, option_id: Uuid) -> Option<&mut PredictionOption> {
        self.options.iter_mut().find(|o| o.id == option_id)
    }
}

/// Canonical owner of predictions, options and entries.
///
/// Books are located through the outer map; all aggregate reads and writes
/// for one prediction go through that book's mutex, so contention is scoped
/// to a single prediction and different predictions never block each other.
pub struct PoolLedger {
    books: RwLock<HashMap<Uuid, Arc<Mutex<PredictionBook>>>>,
    /// entry id → owning prediction id, so `refund_entry` can find its book.
    entry_owner: RwLock<HashMap<Uuid, Uuid>>,
}

impl PoolLedger {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            entry_owner: RwLock::new(HashMap::new()),
        }
    }

    /// Validate and open a new prediction. Goes `pending` → `open`
    /// immediately; there is no draft workflow.
    pub async fn create_prediction(
        &self,
        new: NewPrediction,
        now: DateTime<Utc>,
    ) -> Result<PoolSnapshot, EngineError> {
        new.validate(now)?;

        let prediction_id = Uuid::new_v4();
        let options: Vec<PredictionOption> = new
            .options
            .iter()
            .map(|label| PredictionOption {
                id: Uuid::new_v4(),
                prediction_id,
                label: label.clone(),
                total_staked: 0,
            })
            .collect();

        let prediction = Prediction {
            id: prediction_id,
            creator_id: new.creator_id,
            title: new.title,
            kind: new.kind,
            stake_min: new.stake_min,
            stake_max: new.stake_max,
            creator_fee_percentage: new.creator_fee_percentage,
            platform_fee_percentage: new.platform_fee_percentage,
            entry_deadline: new.entry_deadline,
            settlement_method: new.settlement_method,
            status: PredictionStatus::Pending,
            pool_total: 0,
            winning_option_id: None,
            created_at: now,
            settled_at: None,
        };

        let mut book = PredictionBook {
            prediction,
            options,
            entries: Vec::new(),
            transitions: Vec::new(),
            settlement_attempts: HashMap::new(),
        };
        book.apply_transition(LifecycleAction::Activate, now)?;
        let snapshot = book.snapshot(now);

        self.books
            .write()
            .await
            .insert(prediction_id, Arc::new(Mutex::new(book)));

        metrics::gauge!("open_predictions").increment(1.0);
        tracing::info!(
            prediction_id = %prediction_id,
            options = snapshot.options.len(),
            stake_min = snapshot.prediction.stake_min,
            "Prediction opened"
        );
        Ok(snapshot)
    }

    /// Locate a prediction's book. Settlement takes this to hold the same
    /// exclusion as `place_entry` for its whole attempt.
    pub async fn book(&self, prediction_id: Uuid) -> Result<Arc<Mutex<PredictionBook>>, EngineError> {
        self.books
            .read()
            .await
            .get(&prediction_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("prediction {prediction_id}")))
    }

    /// Place a stake. Caller is responsible for having reserved the amount
    /// with the wallet collaborator first; on failure here the caller
    /// releases the reservation.
    pub async fn place_entry(
        &self,
        prediction_id: Uuid,
        option_id: Uuid,
        user_id: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Entry, EngineError> {
        let book = self.book(prediction_id).await?;
        let mut book = book.lock().await;

        // Guard re-checked under the lock: a concurrent close/settle that
        // won the lock first is visible here.
        let p = &book.prediction;
        if !lifecycle::can_place_entry(p.status, now, p.entry_deadline) {
            let reason = if p.status == PredictionStatus::Open {
                format!("entry deadline {} has passed", p.entry_deadline)
            } else {
                format!("prediction is {}", p.status)
            };
            return Err(EngineError::InvalidState(reason));
        }
        if amount < p.stake_min {
            return Err(EngineError::OutOfRange(format!(
                "amount {} is below stake_min {}",
                amount, p.stake_min
            )));
        }
        if let Some(max) = p.stake_max {
            if amount > max {
                return Err(EngineError::OutOfRange(format!(
                    "amount {amount} is above stake_max {max}"
                )));
            }
        }

        let Some(option) = book.option_mut(option_id) else {
            return Err(EngineError::ReferentialMismatch {
                prediction_id,
                option_id,
            });
        };

        // Aggregate pair + entry insert, one atomic unit under the lock.
        option.total_staked += amount;
        book.prediction.pool_total += amount;

        let entry = Entry {
            id: Uuid::new_v4(),
            prediction_id,
            option_id,
            user_id,
            amount,
            status: EntryStatus::Active,
            actual_payout: None,
            created_at: now,
        };
        book.entries.push(entry.clone());
        drop(book);

        self.entry_owner.write().await.insert(entry.id, prediction_id);

        metrics::counter!("entries_placed_total").increment(1);
        tracing::debug!(
            prediction_id = %prediction_id,
            option_id = %option_id,
            user_id = %user_id,
            amount,
            "Entry placed"
        );
        Ok(entry)
    }

    /// Refund one entry in full. Legal only once the owning prediction is
    /// `cancelled` or `refunded`; idempotent for already-refunded entries.
    ///
    /// Pool totals are deliberately left untouched: they remain a record of
    /// what was staked. Current liability is read from entry statuses.
    pub async fn refund_entry(&self, entry_id: Uuid) -> Result<Entry, EngineError> {
        let prediction_id = self
            .entry_owner
            .read()
            .await
            .get(&entry_id)
            .copied()
            .ok_or_else(|| EngineError::NotFound(format!("entry {entry_id}")))?;

        let book = self.book(prediction_id).await?;
        let mut book = book.lock().await;

        let status = book.prediction.status;
        if !matches!(
            status,
            PredictionStatus::Cancelled | PredictionStatus::Refunded
        ) {
            return Err(EngineError::InvalidState(format!(
                "prediction is {status}, refunds require cancelled or refunded"
            )));
        }

        let entry = book
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id)
            .ok_or_else(|| EngineError::NotFound(format!("entry {entry_id}")))?;

        match entry.status {
            EntryStatus::Refunded => Ok(entry.clone()),
            EntryStatus::Active => {
                entry.status = EntryStatus::Refunded;
                entry.actual_payout = Some(entry.amount);
                metrics::counter!("refunds_total").increment(1);
                tracing::debug!(entry_id = %entry_id, amount = entry.amount, "Entry refunded");
                Ok(entry.clone())
            }
            other => Err(EngineError::InvalidState(format!(
                "entry is {other}, only active entries can be refunded"
            ))),
        }
    }

    /// Consistent point-in-time view; takes the book lock briefly so the
    /// clone is never torn, but holds no lock across the return.
    pub async fn get_snapshot(&self, prediction_id: Uuid) -> Result<PoolSnapshot, EngineError> {
        let book = self.book(prediction_id).await?;
        let book = book.lock().await;
        Ok(book.snapshot(Utc::now()))
    }

    /// A user's active entries on one prediction (quote support).
    pub async fn user_entries(
        &self,
        prediction_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Entry>, EngineError> {
        let book = self.book(prediction_id).await?;
        let book = book.lock().await;
        Ok(book
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && e.status == EntryStatus::Active)
            .cloned()
            .collect())
    }

    /// Remove a prediction with no entries. A prediction that ever owned
    /// stake is history and cannot be deleted.
    pub async fn delete_prediction(&self, prediction_id: Uuid) -> Result<(), EngineError> {
        let mut books = self.books.write().await;
        let Some(book) = books.get(&prediction_id) else {
            return Err(EngineError::NotFound(format!("prediction {prediction_id}")));
        };
        {
            let book = book.lock().await;
            if !book.entries.is_empty() {
                return Err(EngineError::InvalidState(format!(
                    "prediction has {} entries, deletion requires zero",
                    book.entries.len()
                )));
            }
        }
        books.remove(&prediction_id);
        metrics::gauge!("open_predictions").decrement(1.0);
        tracing::info!(prediction_id = %prediction_id, "Prediction deleted");
        Ok(())
    }
}

impl Default for PoolLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    use crate::models::{PredictionType, SettlementMethod};

    fn new_prediction(stake_min: i64, stake_max: Option<i64>) -> NewPrediction {
        NewPrediction {
            creator_id: Uuid::new_v4(),
            title: "Will it rain tomorrow?".into(),
            kind: PredictionType::Binary,
            options: vec!["Yes".into(), "No".into()],
            stake_min,
            stake_max,
            creator_fee_percentage: Decimal::ZERO,
            platform_fee_percentage: Decimal::ZERO,
            entry_deadline: Utc::now() + Duration::hours(1),
            settlement_method: SettlementMethod::Manual,
        }
    }

    #[tokio::test]
    async fn test_place_entry_updates_both_aggregates() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let snap = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();
        let option_a = snap.options[0].id;
        let option_b = snap.options[1].id;

        ledger
            .place_entry(snap.prediction.id, option_a, Uuid::new_v4(), 100, now)
            .await
            .unwrap();
        ledger
            .place_entry(snap.prediction.id, option_b, Uuid::new_v4(), 300, now)
            .await
            .unwrap();

        let snap = ledger.get_snapshot(snap.prediction.id).await.unwrap();
        assert_eq!(snap.prediction.pool_total, 400);
        assert_eq!(snap.option(option_a).unwrap().total_staked, 100);
        assert_eq!(snap.option(option_b).unwrap().total_staked, 300);

        // Conservation: pool == Σ option totals
        let sum: i64 = snap.options.iter().map(|o| o.total_staked).sum();
        assert_eq!(snap.prediction.pool_total, sum);
    }

    #[tokio::test]
    async fn test_stake_bounds_are_inclusive() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let snap = ledger
            .create_prediction(new_prediction(10, Some(500)), now)
            .await
            .unwrap();
        let pid = snap.prediction.id;
        let option = snap.options[0].id;
        let user = Uuid::new_v4();

        // min boundary
        assert!(ledger.place_entry(pid, option, user, 10, now).await.is_ok());
        let err = ledger.place_entry(pid, option, user, 9, now).await.unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange(_)));

        // max boundary
        assert!(ledger.place_entry(pid, option, user, 500, now).await.is_ok());
        let err = ledger.place_entry(pid, option, user, 501, now).await.unwrap_err();
        assert!(matches!(err, EngineError::OutOfRange(_)));
    }

    #[tokio::test]
    async fn test_place_entry_rejected_after_deadline() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let snap = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();

        let late = snap.prediction.entry_deadline + Duration::seconds(1);
        let err = ledger
            .place_entry(snap.prediction.id, snap.options[0].id, Uuid::new_v4(), 50, late)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        // No partial effect
        let snap = ledger.get_snapshot(snap.prediction.id).await.unwrap();
        assert_eq!(snap.prediction.pool_total, 0);
    }

    #[tokio::test]
    async fn test_foreign_option_is_referential_mismatch() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let a = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();
        let b = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();

        let err = ledger
            .place_entry(a.prediction.id, b.options[0].id, Uuid::new_v4(), 50, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReferentialMismatch { .. }));
    }

    #[tokio::test]
    async fn test_refund_requires_cancelled_prediction() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let snap = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();
        let entry = ledger
            .place_entry(snap.prediction.id, snap.options[0].id, Uuid::new_v4(), 100, now)
            .await
            .unwrap();

        // Still open — refusal
        let err = ledger.refund_entry(entry.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        // Cancel, then refund succeeds and is idempotent
        {
            let book = ledger.book(snap.prediction.id).await.unwrap();
            let mut book = book.lock().await;
            book.apply_transition(LifecycleAction::Cancel, now).unwrap();
        }
        let refunded = ledger.refund_entry(entry.id).await.unwrap();
        assert_eq!(refunded.status, EntryStatus::Refunded);
        assert_eq!(refunded.actual_payout, Some(100));

        let again = ledger.refund_entry(entry.id).await.unwrap();
        assert_eq!(again.actual_payout, Some(100));

        // Pool totals are a historical record, untouched by the refund
        let snap = ledger.get_snapshot(snap.prediction.id).await.unwrap();
        assert_eq!(snap.prediction.pool_total, 100);
    }

    #[tokio::test]
    async fn test_delete_requires_zero_entries() {
        let ledger = PoolLedger::new();
        let now = Utc::now();
        let snap = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();
        ledger
            .place_entry(snap.prediction.id, snap.options[0].id, Uuid::new_v4(), 5, now)
            .await
            .unwrap();

        let err = ledger.delete_prediction(snap.prediction.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));

        let empty = ledger
            .create_prediction(new_prediction(1, None), now)
            .await
            .unwrap();
        ledger.delete_prediction(empty.prediction.id).await.unwrap();
        assert!(matches!(
            ledger.get_snapshot(empty.prediction.id).await,
            Err(EngineError::NotFound(_))
        ));
    }
}
