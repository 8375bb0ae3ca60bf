// Prometheus exporter setup
// Metric names and recording helpers live in pantry_core::metrics

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

/// Install the Prometheus recorder and describe all metrics.
/// Should be called once at application startup.
///
/// Returns `None` when a recorder is already installed; metrics are then not
/// exposed but the server keeps running.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, /metrics disabled");
            None
        }
    };

    pantry_core::metrics::init_metrics();
    handle
}
