//! Main entry point for the Pantry cache node.
//!
//! Registers this node in the membership table, then serves the client API
//! and the peer sync API on separate ports until a shutdown signal arrives.

use std::sync::Arc;

use pantry_core::{
    CacheStore, MembershipRegistry, MembershipRegistryConfig, ReplicationClient,
    ReplicationClientConfig, ReplicationDispatcher, ReplicationDispatcherConfig, Worker,
};
use pantry_persistence::{MembershipPersistence, SqlMembershipStore};
use pantry_server::{
    model::common::{AppState, Configuration},
    startup::{self, LoggingConfig},
};
use tracing::{error, info};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = Configuration::new()?;
    let _logging_guard = startup::init_logging(&LoggingConfig::from_env())?;

    let settings = match configuration.validate() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(?settings, "Configuration loaded");

    let metrics = pantry_server::metrics::init_metrics();

    let db = configuration.database_connection(&settings).await?;
    let store = Arc::new(SqlMembershipStore::new(db));
    store.health_check().await?;
    if configuration.ensure_schema() {
        store.ensure_schema().await?;
    }

    let core_config = configuration.to_core_config();
    let transport = Arc::new(ReplicationClient::new(
        ReplicationClientConfig::from_configuration(&core_config),
    )?);

    let registry = MembershipRegistry::setup(
        Worker::new(&settings.hostname, settings.server_port, settings.sync_port),
        store,
        transport,
        MembershipRegistryConfig::from_configuration(&core_config),
    )
    .await?;

    let dispatcher = Arc::new(ReplicationDispatcher::start(
        registry.clone(),
        ReplicationDispatcherConfig::from_configuration(&core_config),
    ));

    let app_state = Arc::new(AppState {
        cache: Arc::new(CacheStore::new()),
        registry: registry.clone(),
        dispatcher: dispatcher.clone(),
        metrics,
    });

    let http_config = configuration.http_server_config();
    let main_server =
        startup::main_server(app_state.clone(), &http_config, settings.server_port)?;
    let sync_server = startup::sync_server(app_state, &http_config, settings.sync_port)?;
    let main_handle = main_server.handle();
    let sync_handle = sync_server.handle();

    info!(
        identity = registry.identity(),
        server_port = settings.server_port,
        sync_port = settings.sync_port,
        "Pantry node started"
    );

    let shutdown = startup::wait_for_shutdown_signal().await;
    let mut shutdown_rx = shutdown.subscribe();

    let served = tokio::select! {
        result = futures::future::try_join(main_server, sync_server) => {
            result.map(|_| ())
        }
        _ = shutdown_rx.recv() => Ok(()),
    };

    if let Err(e) = &served {
        error!(error = %e, "HTTP server stopped unexpectedly");
    }

    info!("Stopping HTTP servers...");
    tokio::join!(main_handle.stop(true), sync_handle.stop(true));

    info!("Draining replication queue...");
    dispatcher.shutdown().await;
    registry.stop().await;

    info!("Pantry node stopped");
    served.map_err(Into::into)
}
