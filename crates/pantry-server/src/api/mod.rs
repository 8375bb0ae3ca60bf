//! HTTP API
//!
//! | Listener | Path             | Methods             |
//! |----------|------------------|---------------------|
//! | main     | `/cache`         | GET, POST, DELETE   |
//! | main     | `/cluster/self`  | GET                 |
//! | main     | `/cluster/peers` | GET                 |
//! | main     | `/metrics`       | GET                 |
//! | sync     | `/cache/sync`    | POST, DELETE        |

use actix_web::web;

pub mod cache;
pub mod cluster;
pub mod metrics;

/// Routes served on the client-facing port
pub fn main_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(cache::query_config())
        .service(cache::routes())
        .service(cluster::routes())
        .service(metrics::prometheus_metrics);
}

/// Routes served on the peer-facing sync port
pub fn sync_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(cache::query_config())
        .service(cache::sync_routes());
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use pantry_core::{
        CacheStore, MembershipRegistry, MembershipRegistryConfig, ReplicationClient,
        ReplicationClientConfig, ReplicationDispatcher, ReplicationDispatcherConfig, Worker,
    };
    use pantry_persistence::{
        MembershipPersistence, SqlMembershipStore,
        sea_orm::{ConnectOptions, Database},
    };

    use crate::model::common::AppState;

    pub async fn test_app_state() -> Arc<AppState> {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        let store = Arc::new(SqlMembershipStore::new(db));
        store.ensure_schema().await.unwrap();

        let transport =
            Arc::new(ReplicationClient::new(ReplicationClientConfig::default()).unwrap());
        let registry = Arc::new(MembershipRegistry::new(
            Worker::new("host-a", 8080, 9001),
            store,
            transport,
            MembershipRegistryConfig::default(),
        ));
        registry.register().await.unwrap();

        let dispatcher = Arc::new(ReplicationDispatcher::start(
            registry.clone(),
            ReplicationDispatcherConfig::default(),
        ));

        Arc::new(AppState {
            cache: Arc::new(CacheStore::new()),
            registry,
            dispatcher,
            metrics: None,
        })
    }
}
