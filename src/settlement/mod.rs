use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::ledger::{PoolLedger, PredictionBook};
use crate::lifecycle::{self, LifecycleAction};
use crate::models::{DisputeResolution, EntryStatus, PredictionStatus};
use crate::wallet::Wallet;

/// Outcome of one settlement attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementResult {
    pub prediction_id: Uuid,
    pub attempt_id: Uuid,
    pub winning_option_id: Uuid,
    pub status: PredictionStatus,
    /// Everything ever staked, minor units.
    pub gross_pool: i64,
    pub platform_fee: i64,
    pub creator_fee: i64,
    pub net_pool: i64,
    /// Sum of winner payouts; `gross_pool` on a push.
    pub total_paid_out: i64,
    pub winners: usize,
    pub losers: usize,
    /// True when nobody backed the winner and every entry was refunded.
    pub pushed: bool,
    pub settled_at: DateTime<Utc>,
}

/// Distributes the pool at settlement, handles cancellation refunds and
/// dispute re-settlement. Holds the same per-prediction lock as
/// `place_entry` for the whole attempt: once an attempt starts committing,
/// no placement can slip in.
pub struct SettlementEngine<W: Wallet> {
    ledger: Arc<PoolLedger>,
    wallet: Arc<W>,
    platform_account: Uuid,
    dispute_window: Duration,
}

impl<W: Wallet> SettlementEngine<W> {
    pub fn new(
        ledger: Arc<PoolLedger>,
        wallet: Arc<W>,
        platform_account: Uuid,
        dispute_window: Duration,
    ) -> Self {
        Self {
            ledger,
            wallet,
            platform_account,
            dispute_window,
        }
    }

    /// Settle a prediction on `winning_option_id`.
    ///
    /// Safe to retry with the same `attempt_id`: credits dedupe in the
    /// wallet, an attempt already applied replays its recorded result, and
    /// a fresh attempt against settled history answers `AlreadySettled`.
    pub async fn settle(
        &self,
        prediction_id: Uuid,
        winning_option_id: Uuid,
        attempt_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, EngineError> {
        let attempt_id = attempt_id.unwrap_or_else(Uuid::new_v4);
        let book = self.ledger.book(prediction_id).await?;
        let mut book = book.lock().await;

        // Replayed attempt (caller retrying a request whose response was
        // lost): answer with what that attempt already did.
        if let Some(prior) = book.settlement_attempts.get(&attempt_id) {
            return Ok(prior.clone());
        }

        // Guard re-checked under the lock (TOCTOU window against a
        // concurrent close/cancel/second settle).
        let status = book.prediction.status;
        if status == PredictionStatus::Settled {
            return Err(EngineError::AlreadySettled(prediction_id));
        }
        if !lifecycle::can_settle(status, now, book.prediction.entry_deadline) {
            return Err(EngineError::InvalidTransition {
                current: status,
                requested: "settle",
            });
        }
        if status == PredictionStatus::Open {
            // Auto-close-on-settle: a scheduler need not close first.
            book.apply_transition(LifecycleAction::Close, now)?;
        }

        self.settle_locked(&mut book, winning_option_id, attempt_id, now)
            .await
    }

    /// Steps 2–6 of settlement, with the book lock already held.
    /// Entry/prediction mutations happen only after every wallet credit
    /// has succeeded, so a failed attempt leaves the book retryable.
    async fn settle_locked(
        &self,
        book: &mut PredictionBook,
        winning_option_id: Uuid,
        attempt_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, EngineError> {
        let prediction_id = book.prediction.id;

        let Some(winning_option) = book.options.iter().find(|o| o.id == winning_option_id) else {
            return Err(EngineError::ReferentialMismatch {
                prediction_id,
                option_id: winning_option_id,
            });
        };
        let winning_total = winning_option.total_staked;

        if book.prediction.status == PredictionStatus::Closed {
            book.apply_transition(LifecycleAction::RequestSettlement, now)?;
        }

        let gross_pool = book.prediction.pool_total;

        // Nobody backed the winner: push. Full refunds, no fees.
        if winning_total == 0 {
            return self.push_refund(book, winning_option_id, attempt_id, now).await;
        }

        let mut platform_fee = fee_amount(gross_pool, book.prediction.platform_fee_percentage);
        let creator_fee = fee_amount(gross_pool, book.prediction.creator_fee_percentage);
        let net_pool = gross_pool - platform_fee - creator_fee;

        // Per-entry payout: floor(amount * net_pool / winning_total).
        // i128 so the product cannot overflow for any i64 inputs.
        let mut payouts: Vec<(Uuid, Uuid, i64)> = Vec::new(); // (entry, user, payout)
        let mut losers = 0usize;
        let mut total_paid_out = 0i64;
        for entry in book.entries.iter().filter(|e| e.status == EntryStatus::Active) {
            if entry.option_id == winning_option_id {
                let payout = (entry.amount as i128 * net_pool as i128 / winning_total as i128) as i64;
                total_paid_out += payout;
                payouts.push((entry.id, entry.user_id, payout));
            } else {
                losers += 1;
            }
        }

        // Floor-rounding residual goes to the platform bucket, never
        // dropped, never paid twice.
        platform_fee += net_pool - total_paid_out;

        // Wallet credits before any ledger mutation. A failure here leaves
        // the book in `awaiting_settlement` with every entry still active;
        // the whole attempt is retried and the wallet dedupes by key.
        for (entry_id, user_id, payout) in &payouts {
            if *payout > 0 {
                self.wallet
                    .credit(
                        *user_id,
                        *payout,
                        "payout",
                        &format!("{prediction_id}:{attempt_id}:payout:{entry_id}"),
                    )
                    .await
                    .map_err(|e| EngineError::WalletFailure(e.to_string()))?;
            }
        }
        if creator_fee > 0 {
            self.wallet
                .credit(
                    book.prediction.creator_id,
                    creator_fee,
                    "creator_fee",
                    &format!("{prediction_id}:{attempt_id}:creator_fee"),
                )
                .await
                .map_err(|e| EngineError::WalletFailure(e.to_string()))?;
        }
        if platform_fee > 0 {
            self.wallet
                .credit(
                    self.platform_account,
                    platform_fee,
                    "platform_fee",
                    &format!("{prediction_id}:{attempt_id}:platform_fee"),
                )
                .await
                .map_err(|e| EngineError::WalletFailure(e.to_string()))?;
        }

        // Commit: entries move to won/lost exactly once, then the status.
        let mut winners = 0usize;
        for entry in book.entries.iter_mut().filter(|e| e.status == EntryStatus::Active) {
            if entry.option_id == winning_option_id {
                let payout = payouts
                    .iter()
                    .find(|(id, _, _)| *id == entry.id)
                    .map(|(_, _, p)| *p)
                    .unwrap_or(0);
                entry.status = EntryStatus::Won;
                entry.actual_payout = Some(payout);
                winners += 1;
            } else {
                entry.status = EntryStatus::Lost;
                entry.actual_payout = Some(0);
            }
        }
        book.prediction.winning_option_id = Some(winning_option_id);
        book.prediction.settled_at = Some(now);
        book.apply_transition(LifecycleAction::CompleteSettlement, now)?;

        metrics::counter!("settlements_total").increment(1);
        metrics::gauge!("open_predictions").decrement(1.0);
        tracing::info!(
            prediction_id = %prediction_id,
            attempt_id = %attempt_id,
            winning_option_id = %winning_option_id,
            gross_pool,
            net_pool,
            platform_fee,
            creator_fee,
            winners,
            losers,
            "Prediction settled"
        );

        let result = SettlementResult {
            prediction_id,
            attempt_id,
            winning_option_id,
            status: book.prediction.status,
            gross_pool,
            platform_fee,
            creator_fee,
            net_pool,
            total_paid_out,
            winners,
            losers,
            pushed: false,
            settled_at: now,
        };
        book.settlement_attempts.insert(attempt_id, result.clone());
        Ok(result)
    }

    /// Zero-winner push: refund every active entry in full, charge no fees,
    /// finish in `refunded` instead of `settled`.
    async fn push_refund(
        &self,
        book: &mut PredictionBook,
        winning_option_id: Uuid,
        attempt_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, EngineError> {
        let prediction_id = book.prediction.id;
        let gross_pool = book.prediction.pool_total;

        let refunds: Vec<(Uuid, Uuid, i64)> = book
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Active)
            .map(|e| (e.id, e.user_id, e.amount))
            .collect();

        // Refund amounts are deterministic (the stake itself), so the
        // idempotency key can omit the attempt id.
        for (entry_id, user_id, amount) in &refunds {
            self.wallet
                .credit(
                    *user_id,
                    *amount,
                    "refund",
                    &format!("{prediction_id}:refund:{entry_id}"),
                )
                .await
                .map_err(|e| EngineError::WalletFailure(e.to_string()))?;
        }

        for entry in book.entries.iter_mut().filter(|e| e.status == EntryStatus::Active) {
            entry.status = EntryStatus::Refunded;
            entry.actual_payout = Some(entry.amount);
        }
        book.apply_transition(LifecycleAction::CompleteRefund, now)?;

        metrics::counter!("refunds_total").increment(refunds.len() as u64);
        metrics::gauge!("open_predictions").decrement(1.0);
        tracing::info!(
            prediction_id = %prediction_id,
            winning_option_id = %winning_option_id,
            refunded_entries = refunds.len(),
            gross_pool,
            "Zero-winner push: pool refunded"
        );

        let result = SettlementResult {
            prediction_id,
            attempt_id,
            winning_option_id,
            status: book.prediction.status,
            gross_pool,
            platform_fee: 0,
            creator_fee: 0,
            net_pool: gross_pool,
            total_paid_out: gross_pool,
            winners: 0,
            losers: 0,
            pushed: true,
            settled_at: now,
        };
        book.settlement_attempts.insert(attempt_id, result.clone());
        Ok(result)
    }

    /// Cancel a prediction pre-settlement and refund every active entry in
    /// full, no fees. Retryable: a crash mid-sweep resumes from `cancelled`.
    pub async fn cancel_and_refund(
        &self,
        prediction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SettlementResult, EngineError> {
        let book = self.ledger.book(prediction_id).await?;
        let mut book = book.lock().await;

        let status = book.prediction.status;
        if lifecycle::can_cancel(status) {
            book.apply_transition(LifecycleAction::Cancel, now)?;
        } else if status != PredictionStatus::Cancelled {
            // Settled history in particular cannot be cancelled;
            // corrections go through dispute.
            return Err(EngineError::InvalidTransition {
                current: status,
                requested: "cancel",
            });
        }
        // status == Cancelled resumes an interrupted sweep.

        let gross_pool = book.prediction.pool_total;
        let refunds: Vec<(Uuid, Uuid, i64)> = book
            .entries
            .iter()
            .filter(|e| e.status == EntryStatus::Active)
            .map(|e| (e.id, e.user_id, e.amount))
            .collect();

        // Credit then mark, one entry at a time: a failure part-way leaves
        // the remaining entries active for the retry.
        for (entry_id, user_id, amount) in &refunds {
            self.wallet
                .credit(
                    *user_id,
                    *amount,
                    "refund",
                    &format!("{prediction_id}:refund:{entry_id}"),
                )
                .await
                .map_err(|e| EngineError::WalletFailure(e.to_string()))?;
            if let Some(entry) = book.entries.iter_mut().find(|e| e.id == *entry_id) {
                entry.status = EntryStatus::Refunded;
                entry.actual_payout = Some(entry.amount);
            }
        }

        book.apply_transition(LifecycleAction::CompleteRefund, now)?;

        metrics::counter!("refunds_total").increment(refunds.len() as u64);
        metrics::gauge!("open_predictions").decrement(1.0);
        tracing::info!(
            prediction_id = %prediction_id,
            refunded_entries = refunds.len(),
            gross_pool,
            "Prediction cancelled and refunded"
        );

        Ok(SettlementResult {
            prediction_id,
            attempt_id: Uuid::nil(),
            winning_option_id: Uuid::nil(),
            status: book.prediction.status,
            gross_pool,
            platform_fee: 0,
            creator_fee: 0,
            net_pool: gross_pool,
            total_paid_out: gross_pool,
            winners: 0,
            losers: 0,
            pushed: false,
            settled_at: now,
        })
    }

    /// Open a dispute on a settled prediction. Accepted only within the
    /// dispute window of `settled_at`.
    pub async fn dispute(&self, prediction_id: Uuid, now: DateTime<Utc>) -> Result<(), EngineError> {
        let book = self.ledger.book(prediction_id).await?;
        let mut book = book.lock().await;

        if book.prediction.status == PredictionStatus::Settled {
            if let Some(settled_at) = book.prediction.settled_at {
                if now > settled_at + self.dispute_window {
                    return Err(EngineError::InvalidState(format!(
                        "dispute window closed at {}",
                        settled_at + self.dispute_window
                    )));
                }
            }
        }
        book.apply_transition(LifecycleAction::Dispute, now)?;
        metrics::counter!("disputes_total").increment(1);
        Ok(())
    }

    /// Resolve a dispute. `uphold` leaves the settlement as-is; `reverse`
    /// invalidates the prior payouts on the ledger and re-settles with the
    /// corrected winner under a fresh attempt id. Compensating the wallet
    /// for the prior attempt's credits is the wallet collaborator's
    /// concern, not the ledger's.
    pub async fn resolve_dispute(
        &self,
        prediction_id: Uuid,
        resolution: DisputeResolution,
        corrected_winning_option_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Option<SettlementResult>, EngineError> {
        let book = self.ledger.book(prediction_id).await?;
        let mut book = book.lock().await;

        match resolution {
            DisputeResolution::Uphold => {
                book.apply_transition(LifecycleAction::ResolveUphold, now)?;
                tracing::info!(prediction_id = %prediction_id, "Dispute resolved: upheld");
                Ok(None)
            }
            DisputeResolution::Reverse => {
                let corrected = corrected_winning_option_id.ok_or_else(|| {
                    EngineError::InvalidState(
                        "reverse resolution requires a corrected winning option".into(),
                    )
                })?;
                book.apply_transition(LifecycleAction::ResolveReverse, now)?;

                // Invalidate the prior settlement on the ledger: terminal
                // entries return to active so the re-run re-partitions them.
                for entry in book.entries.iter_mut() {
                    if matches!(entry.status, EntryStatus::Won | EntryStatus::Lost) {
                        entry.status = EntryStatus::Active;
                        entry.actual_payout = None;
                    }
                }
                book.prediction.winning_option_id = None;
                book.prediction.settled_at = None;

                let attempt_id = Uuid::new_v4();
                tracing::info!(
                    prediction_id = %prediction_id,
                    corrected_winning_option_id = %corrected,
                    attempt_id = %attempt_id,
                    "Dispute resolved: reversed, re-settling"
                );
                let result = self
                    .settle_locked(&mut book, corrected, attempt_id, now)
                    .await?;
                Ok(Some(result))
            }
        }
    }
}

/// `floor(gross * pct / 100)` in minor units.
fn fee_amount(gross_pool: i64, percentage: Decimal) -> i64 {
    (Decimal::from(gross_pool) * percentage / Decimal::from(100))
        .floor()
        .to_i64()
        .unwrap_or(0)
}
