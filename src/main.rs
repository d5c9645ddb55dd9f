use std::sync::Arc;

use chrono::Duration;

use wagerpool::api::router::create_router;
use wagerpool::config::AppConfig;
use wagerpool::ledger::PoolLedger;
use wagerpool::settlement::SettlementEngine;
use wagerpool::wallet::InMemoryWallet;
use wagerpool::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let metrics_handle = wagerpool::metrics::init_metrics();

    let ledger = Arc::new(PoolLedger::new());
    let wallet = Arc::new(InMemoryWallet::new());
    let settlement = Arc::new(SettlementEngine::new(
        ledger.clone(),
        wallet.clone(),
        config.platform_account_id,
        Duration::hours(config.dispute_window_hours),
    ));

    tracing::info!(
        platform_account_id = %config.platform_account_id,
        dispute_window_hours = config.dispute_window_hours,
        "Pool engine initialized"
    );

    let state = AppState {
        config,
        ledger,
        wallet,
        settlement,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
