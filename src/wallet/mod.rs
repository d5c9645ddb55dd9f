use std::collections::{HashMap, HashSet};
use std::future::Future;

use tokio::sync::Mutex;
use uuid::Uuid;

pub type ReservationId = Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),

    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// External fund-custody collaborator.
///
/// Callers of `place_entry` reserve/release around the ledger call; the
/// settlement engine calls `credit` for payouts and fees. Credits carry an
/// idempotency key so a retried settlement attempt never double-pays.
pub trait Wallet: Send + Sync + 'static {
    fn reserve(
        &self,
        user_id: Uuid,
        amount: i64,
    ) -> impl Future<Output = Result<ReservationId, WalletError>> + Send;

    fn release(
        &self,
        reservation_id: ReservationId,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;

    fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<(), WalletError>> + Send;
}

struct WalletInner {
    /// Spendable balance per account, minor units.
    balances: HashMap<Uuid, i64>,
    /// Reservation id → (account, amount) held in escrow.
    reservations: HashMap<ReservationId, (Uuid, i64)>,
    /// Idempotency keys of credits already applied.
    applied_credits: HashSet<String>,
}

/// In-process wallet with reservation semantics. Stands in for the real
/// balance service in the binary and the tests.
pub struct InMemoryWallet {
    inner: Mutex<WalletInner>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WalletInner {
                balances: HashMap::new(),
                reservations: HashMap::new(),
                applied_credits: HashSet::new(),
            }),
        }
    }

    /// Seed an account (tests, demo runs).
    pub async fn deposit(&self, user_id: Uuid, amount: i64) {
        let mut inner = self.inner.lock().await;
        *inner.balances.entry(user_id).or_insert(0) += amount;
    }

    pub async fn balance(&self, user_id: Uuid) -> i64 {
        self.inner.lock().await.balances.get(&user_id).copied().unwrap_or(0)
    }
}

impl Default for InMemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet for InMemoryWallet {
    async fn reserve(&self, user_id: Uuid, amount: i64) -> Result<ReservationId, WalletError> {
        let mut inner = self.inner.lock().await;
        let available = inner.balances.get(&user_id).copied().unwrap_or(0);
        if amount > available {
            tracing::warn!(
                user_id = %user_id,
                required = amount,
                available,
                "Wallet: insufficient funds to reserve"
            );
            return Err(WalletError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let reservation_id = Uuid::new_v4();
        *inner.balances.entry(user_id).or_insert(0) -= amount;
        inner.reservations.insert(reservation_id, (user_id, amount));
        tracing::debug!(
            user_id = %user_id,
            reservation_id = %reservation_id,
            amount,
            "Wallet: reserved"
        );
        Ok(reservation_id)
    }

    async fn release(&self, reservation_id: ReservationId) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().await;
        let (user_id, amount) = inner
            .reservations
            .remove(&reservation_id)
            .ok_or(WalletError::UnknownReservation(reservation_id))?;
        *inner.balances.entry(user_id).or_insert(0) += amount;
        tracing::debug!(
            user_id = %user_id,
            reservation_id = %reservation_id,
            amount,
            "Wallet: released reservation"
        );
        Ok(())
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i64,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<(), WalletError> {
        let mut inner = self.inner.lock().await;
        if !inner.applied_credits.insert(idempotency_key.to_string()) {
            tracing::debug!(
                user_id = %user_id,
                idempotency_key,
                "Wallet: credit already applied, skipping"
            );
            return Ok(());
        }
        *inner.balances.entry(user_id).or_insert(0) += amount;
        tracing::debug!(user_id = %user_id, amount, reason, "Wallet: credited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_and_release() {
        let wallet = InMemoryWallet::new();
        let user = Uuid::new_v4();
        wallet.deposit(user, 1000).await;

        let r1 = wallet.reserve(user, 600).await.unwrap();
        assert_eq!(wallet.balance(user).await, 400);

        // Cannot reserve more than available
        assert!(matches!(
            wallet.reserve(user, 500).await,
            Err(WalletError::InsufficientFunds { .. })
        ));

        wallet.release(r1).await.unwrap();
        assert_eq!(wallet.balance(user).await, 1000);
    }

    #[tokio::test]
    async fn test_credit_dedupes_by_idempotency_key() {
        let wallet = InMemoryWallet::new();
        let user = Uuid::new_v4();

        wallet.credit(user, 250, "payout", "attempt-1:payout:x").await.unwrap();
        wallet.credit(user, 250, "payout", "attempt-1:payout:x").await.unwrap();
        assert_eq!(wallet.balance(user).await, 250);

        wallet.credit(user, 250, "payout", "attempt-2:payout:x").await.unwrap();
        assert_eq!(wallet.balance(user).await, 500);
    }

    #[tokio::test]
    async fn test_release_unknown_reservation() {
        let wallet = InMemoryWallet::new();
        assert!(matches!(
            wallet.release(Uuid::new_v4()).await,
            Err(WalletError::UnknownReservation(_))
        ));
    }
}
