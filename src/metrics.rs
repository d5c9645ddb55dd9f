use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all engine metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pre-register counters so they appear even before the first increment.
    counter!("entries_placed_total").absolute(0);
    counter!("entries_rejected_total").absolute(0);
    counter!("settlements_total").absolute(0);
    counter!("refunds_total").absolute(0);
    counter!("disputes_total").absolute(0);

    gauge!("open_predictions").set(0.0);

    handle
}
