//! Pure odds and quote math over a [`PoolSnapshot`]. No ledger access, no
//! side effects; callers hand in whatever snapshot they hold.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::PoolSnapshot;

/// Quotes are estimates: pari-mutuel payouts come from the final pool
/// composition at settlement, not from the odds at stake time.
pub const QUOTE_DISCLAIMER: &str =
    "Estimated; final payout depends on final pools at settlement.";

pub const PRICING_MODEL: &str = "pool_parimutuel";

/// Pari-mutuel odds multiple for an option: `pool_total / total_staked`.
/// `None` while nothing is staked on the option — callers fall back to the
/// even-split probability from [`implied_probability`].
pub fn compute_odds(snapshot: &PoolSnapshot, option_id: Uuid) -> Result<Option<Decimal>, EngineError> {
    let option = snapshot.option(option_id).ok_or(EngineError::ReferentialMismatch {
        prediction_id: snapshot.prediction.id,
        option_id,
    })?;
    if option.total_staked == 0 {
        return Ok(None);
    }
    Ok(Some(
        Decimal::from(snapshot.prediction.pool_total) / Decimal::from(option.total_staked),
    ))
}

/// Implied probability of an option. With stake on the board this is the
/// option's share of the pool; with an empty board it is the even split
/// `1 / option_count`.
pub fn implied_probability(snapshot: &PoolSnapshot, option_id: Uuid) -> Result<Decimal, EngineError> {
    let option = snapshot.option(option_id).ok_or(EngineError::ReferentialMismatch {
        prediction_id: snapshot.prediction.id,
        option_id,
    })?;
    if snapshot.prediction.pool_total == 0 {
        return Ok(Decimal::ONE / Decimal::from(snapshot.option_count() as i64));
    }
    Ok(Decimal::from(option.total_staked) / Decimal::from(snapshot.prediction.pool_total))
}

/// Percentage share of the pool staked on an option, `[0, 100]`.
pub fn pool_share(snapshot: &PoolSnapshot, option_id: Uuid) -> Result<Decimal, EngineError> {
    Ok(implied_probability(snapshot, option_id)? * Decimal::from(100))
}

/// One side of a quote (current position or hypothetical-after).
#[derive(Debug, Clone, Serialize)]
pub struct QuoteSide {
    /// Caller's active stake on this option, minor units.
    pub user_stake: i64,
    /// Pari-mutuel multiple; `None` when the option has no stake yet.
    pub odds: Option<Decimal>,
    /// `user_stake * odds`. An estimate, never a promise.
    pub est_payout: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StakeQuote {
    pub prediction_id: Uuid,
    pub option_id: Uuid,
    pub amount: i64,
    pub pricing_model: &'static str,
    pub current: QuoteSide,
    pub after: QuoteSide,
    pub disclaimer: &'static str,
}

/// Before/after quote for staking `amount` on `option_id`.
///
/// The `after` side prices against a hypothetical snapshot with `amount`
/// added to both the option total and the pool total; the real ledger is
/// untouched.
pub fn quote(
    snapshot: &PoolSnapshot,
    option_id: Uuid,
    user_stake_in_option: i64,
    amount: i64,
) -> Result<StakeQuote, EngineError> {
    if amount <= 0 {
        return Err(EngineError::OutOfRange(format!(
            "quote amount must be positive, got {amount}"
        )));
    }
    let option = snapshot.option(option_id).ok_or(EngineError::ReferentialMismatch {
        prediction_id: snapshot.prediction.id,
        option_id,
    })?;

    let current_odds = compute_odds(snapshot, option_id)?;
    let current = QuoteSide {
        user_stake: user_stake_in_option,
        odds: current_odds,
        est_payout: current_odds
            .map(|o| Decimal::from(user_stake_in_option) * o)
            .unwrap_or(Decimal::ZERO),
    };

    // amount > 0, so the hypothetical denominator is never zero.
    let after_odds = Decimal::from(snapshot.prediction.pool_total + amount)
        / Decimal::from(option.total_staked + amount);
    let after_stake = user_stake_in_option + amount;
    let after = QuoteSide {
        user_stake: after_stake,
        odds: Some(after_odds),
        est_payout: Decimal::from(after_stake) * after_odds,
    };

    Ok(StakeQuote {
        prediction_id: snapshot.prediction.id,
        option_id,
        amount,
        pricing_model: PRICING_MODEL,
        current,
        after,
        disclaimer: QUOTE_DISCLAIMER,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use crate::models::{
        PoolSnapshot, Prediction, PredictionOption, PredictionStatus, PredictionType,
        SettlementMethod,
    };

    /// Snapshot with options staked at the given amounts, pool = their sum.
    fn snapshot_with(staked: &[i64]) -> PoolSnapshot {
        let prediction_id = Uuid::new_v4();
        let options: Vec<PredictionOption> = staked
            .iter()
            .enumerate()
            .map(|(i, &total_staked)| PredictionOption {
                id: Uuid::new_v4(),
                prediction_id,
                label: format!("Option {i}"),
                total_staked,
            })
            .collect();

        PoolSnapshot {
            prediction: Prediction {
                id: prediction_id,
                creator_id: Uuid::new_v4(),
                title: "test".into(),
                kind: PredictionType::MultiOutcome,
                stake_min: 1,
                stake_max: None,
                creator_fee_percentage: rust_decimal::Decimal::ZERO,
                platform_fee_percentage: rust_decimal::Decimal::ZERO,
                entry_deadline: Utc::now() + Duration::hours(1),
                settlement_method: SettlementMethod::Manual,
                status: PredictionStatus::Open,
                pool_total: staked.iter().sum(),
                winning_option_id: None,
                created_at: Utc::now(),
                settled_at: None,
            },
            options,
            transitions: vec![],
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_odds_are_pool_over_option() {
        // 100 on A, 300 on B: odds(A) = 400/100 = 4
        let snap = snapshot_with(&[100, 300]);
        let odds = compute_odds(&snap, snap.options[0].id).unwrap().unwrap();
        assert_eq!(odds, Decimal::from(4));
    }

    #[test]
    fn test_zero_staked_option_has_no_odds() {
        let snap = snapshot_with(&[0, 300]);
        assert!(compute_odds(&snap, snap.options[0].id).unwrap().is_none());
    }

    #[test]
    fn test_empty_pool_falls_back_to_even_split() {
        let snap = snapshot_with(&[0, 0, 0, 0]);
        let p = implied_probability(&snap, snap.options[0].id).unwrap();
        assert_eq!(p, Decimal::ONE / Decimal::from(4));
    }

    #[test]
    fn test_pool_share_percentage() {
        let snap = snapshot_with(&[100, 300]);
        assert_eq!(pool_share(&snap, snap.options[1].id).unwrap(), Decimal::from(75));
    }

    #[test]
    fn test_quote_before_and_after() {
        // The worked example: 100 on A, 300 on B, quote 50 more on A.
        let snap = snapshot_with(&[100, 300]);
        let option_a = snap.options[0].id;

        let q = quote(&snap, option_a, 100, 50).unwrap();
        assert_eq!(q.current.user_stake, 100);
        assert_eq!(q.current.odds, Some(Decimal::from(4)));
        assert_eq!(q.current.est_payout, Decimal::from(400));

        // after: 450 / 150 = 3
        assert_eq!(q.after.user_stake, 150);
        assert_eq!(q.after.odds, Some(Decimal::from(3)));
        assert_eq!(q.after.est_payout, Decimal::from(450));

        assert_eq!(q.pricing_model, "pool_parimutuel");
        assert!(!q.disclaimer.is_empty());
    }

    #[test]
    fn test_quote_with_no_prior_stake() {
        let snap = snapshot_with(&[0, 300]);
        let q = quote(&snap, snap.options[0].id, 0, 100).unwrap();
        assert_eq!(q.current.odds, None);
        assert_eq!(q.current.est_payout, Decimal::ZERO);
        // after: 400 / 100 = 4
        assert_eq!(q.after.odds, Some(Decimal::from(4)));
    }

    #[test]
    fn test_quote_rejects_non_positive_amount() {
        let snap = snapshot_with(&[100, 300]);
        assert!(matches!(
            quote(&snap, snap.options[0].id, 0, 0),
            Err(EngineError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_unknown_option_is_mismatch() {
        let snap = snapshot_with(&[100, 300]);
        assert!(matches!(
            compute_odds(&snap, Uuid::new_v4()),
            Err(EngineError::ReferentialMismatch { .. })
        ));
    }
}
