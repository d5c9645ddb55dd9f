use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use wagerpool::config::AppConfig;
use wagerpool::ledger::PoolLedger;
use wagerpool::lifecycle::LifecycleAction;
use wagerpool::models::{NewPrediction, PoolSnapshot, PredictionType, SettlementMethod};
use wagerpool::settlement::SettlementEngine;
use wagerpool::wallet::InMemoryWallet;
use wagerpool::AppState;

/// Engine wiring shared by the tests: ledger + wallet + settlement engine
/// with a known platform account.
#[allow(dead_code)]
pub struct TestEngine {
    pub ledger: Arc<PoolLedger>,
    pub wallet: Arc<InMemoryWallet>,
    pub settlement: Arc<SettlementEngine<InMemoryWallet>>,
    pub platform_account: Uuid,
}

#[allow(dead_code)]
pub fn build_engine() -> TestEngine {
    build_engine_with_window(Duration::hours(48))
}

#[allow(dead_code)]
pub fn build_engine_with_window(dispute_window: Duration) -> TestEngine {
    let ledger = Arc::new(PoolLedger::new());
    let wallet = Arc::new(InMemoryWallet::new());
    let platform_account = Uuid::new_v4();
    let settlement = Arc::new(SettlementEngine::new(
        ledger.clone(),
        wallet.clone(),
        platform_account,
        dispute_window,
    ));
    TestEngine {
        ledger,
        wallet,
        settlement,
        platform_account,
    }
}

/// Two-option prediction open for another hour.
#[allow(dead_code)]
pub fn binary_prediction(
    creator_id: Uuid,
    stake_min: i64,
    stake_max: Option<i64>,
    platform_fee_pct: Decimal,
    creator_fee_pct: Decimal,
) -> NewPrediction {
    NewPrediction {
        creator_id,
        title: "Will the home team win?".into(),
        kind: PredictionType::Binary,
        options: vec!["Yes".into(), "No".into()],
        stake_min,
        stake_max,
        creator_fee_percentage: creator_fee_pct,
        platform_fee_percentage: platform_fee_pct,
        entry_deadline: Utc::now() + Duration::hours(1),
        settlement_method: SettlementMethod::Manual,
    }
}

/// Open a fee-free binary prediction, returning its snapshot.
#[allow(dead_code)]
pub async fn seed_prediction(engine: &TestEngine) -> PoolSnapshot {
    engine
        .ledger
        .create_prediction(
            binary_prediction(Uuid::new_v4(), 1, None, Decimal::ZERO, Decimal::ZERO),
            Utc::now(),
        )
        .await
        .expect("Failed to seed prediction")
}

/// Close entries the way the close endpoint would, making settlement
/// legal before the entry deadline passes.
#[allow(dead_code)]
pub async fn close_entries(ledger: &PoolLedger, prediction_id: Uuid) {
    let book = ledger.book(prediction_id).await.expect("prediction book");
    let mut book = book.lock().await;
    book.apply_transition(LifecycleAction::Close, Utc::now())
        .expect("close transition");
}

/// The Prometheus recorder is process-global; install it once for the
/// whole test binary.
#[allow(dead_code)]
fn metrics_handle() -> metrics_exporter_prometheus::PrometheusHandle {
    use std::sync::OnceLock;
    static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(wagerpool::metrics::init_metrics).clone()
}

/// Full AppState for router-level tests. Demo wallet seeding is enabled so
/// entry placement works without an explicit deposit step.
#[allow(dead_code)]
pub fn build_test_state() -> AppState {
    build_test_state_with_token(None)
}

#[allow(dead_code)]
pub fn build_test_state_with_token(api_token: Option<String>) -> AppState {
    let engine = build_engine();
    let metrics_handle = metrics_handle();

    AppState {
        config: AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            api_token,
            platform_account_id: engine.platform_account,
            dispute_window_hours: 48,
            demo_wallet_seed: 1_000_000,
        },
        ledger: engine.ledger,
        wallet: engine.wallet,
        settlement: engine.settlement,
        metrics_handle,
    }
}
