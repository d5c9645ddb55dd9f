pub mod api;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod odds;
pub mod settlement;
pub mod wallet;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ledger::PoolLedger;
use crate::settlement::SettlementEngine;
use crate::wallet::InMemoryWallet;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ledger: Arc<PoolLedger>,
    pub wallet: Arc<InMemoryWallet>,
    pub settlement: Arc<SettlementEngine<InMemoryWallet>>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
