use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use pantry_core::{CacheStore, MembershipRegistry, ReplicationDispatcher};

pub use super::config::{Configuration, HttpServerConfig, NodeSettings};

/// Shared state injected into every handler through `web::Data`
pub struct AppState {
    pub cache: Arc<CacheStore>,
    pub registry: Arc<MembershipRegistry>,
    pub dispatcher: Arc<ReplicationDispatcher>,
    pub metrics: Option<PrometheusHandle>,
}
