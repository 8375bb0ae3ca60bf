// Cluster membership through a shared database table
// Registers this worker, keeps its row fresh, rebuilds the peer pool, sweeps
// stale rows, and fans mutations out to every known peer

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use pantry_common::{CacheValue, OPERATION_DELETE, OPERATION_WRITE, PantryError, Result};
use pantry_persistence::{MembershipPersistence, Worker};

use super::replication_client::PeerTransport;
use crate::metrics;

/// Membership registry configuration
#[derive(Clone, Debug)]
pub struct MembershipRegistryConfig {
    /// How often this worker's `updated_at` is refreshed
    pub heartbeat_interval: Duration,
    /// How often the pool is rebuilt from the table
    pub refresh_interval: Duration,
    /// How often stale rows are deleted
    pub cleanup_interval: Duration,
    /// Rows not updated for this long are stale
    pub stale_threshold: Duration,
}

impl Default for MembershipRegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            refresh_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(1800),
            stale_threshold: Duration::from_secs(60),
        }
    }
}

impl MembershipRegistryConfig {
    /// Create a MembershipRegistryConfig from application Configuration
    pub fn from_configuration(config: &crate::model::Configuration) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.registry_heartbeat_interval_secs()),
            refresh_interval: Duration::from_secs(config.registry_refresh_interval_secs()),
            cleanup_interval: Duration::from_secs(config.registry_cleanup_interval_secs()),
            stale_threshold: Duration::from_secs(config.registry_stale_threshold_secs()),
        }
    }
}

/// Outcome of one fan-out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Copy, Debug)]
enum MembershipLoop {
    Heartbeat,
    Refresh,
    Cleanup,
}

impl MembershipLoop {
    fn name(self) -> &'static str {
        match self {
            MembershipLoop::Heartbeat => "heartbeat",
            MembershipLoop::Refresh => "refresh",
            MembershipLoop::Cleanup => "cleanup",
        }
    }
}

/// Membership registry
///
/// Owns the local worker and the pool of peers. The pool never contains the
/// local identity and is replaced wholesale on every refresh.
pub struct MembershipRegistry {
    config: MembershipRegistryConfig,
    identity: String,
    self_worker: RwLock<Worker>,
    pool: RwLock<HashMap<String, Worker>>,
    store: Arc<dyn MembershipPersistence>,
    transport: Arc<dyn PeerTransport>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for MembershipRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipRegistry")
            .field("identity", &self.identity)
            .field("pool_size", &self.pool.read().len())
            .field("config", &self.config)
            .finish()
    }
}

impl MembershipRegistry {
    /// Create a registry for `local`. Nothing is persisted until `register`.
    pub fn new(
        local: Worker,
        store: Arc<dyn MembershipPersistence>,
        transport: Arc<dyn PeerTransport>,
        config: MembershipRegistryConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            identity: local.identity(),
            self_worker: RwLock::new(local),
            pool: RwLock::new(HashMap::new()),
            store,
            transport,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register `local` and start the background loops.
    ///
    /// Registration failure is returned to the caller and is fatal at startup.
    pub async fn setup(
        local: Worker,
        store: Arc<dyn MembershipPersistence>,
        transport: Arc<dyn PeerTransport>,
        config: MembershipRegistryConfig,
    ) -> Result<Arc<Self>> {
        let registry = Arc::new(Self::new(local, store, transport, config));
        registry.register().await?;
        registry.start();
        Ok(registry)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn get_self_worker(&self) -> Worker {
        self.self_worker.read().clone()
    }

    /// Current peers, ordered by identity
    pub fn pool_snapshot(&self) -> Vec<Worker> {
        let mut peers: Vec<Worker> = self.pool.read().values().cloned().collect();
        peers.sort_by_key(|peer| peer.identity());
        peers
    }

    pub fn pool_size(&self) -> usize {
        self.pool.read().len()
    }

    /// Insert the local worker, or refresh its existing row on restart
    pub async fn register(&self) -> Result<Worker> {
        let existing = self
            .store
            .worker_find_by_identity(&self.identity)
            .await
            .map_err(PantryError::persistence)?;

        let registered = match existing {
            Some(row) => {
                let worker = Worker {
                    id: row.id,
                    created_at: row.created_at,
                    updated_at: Utc::now(),
                    ..self.get_self_worker()
                };
                self.store
                    .worker_update(&worker)
                    .await
                    .map_err(PantryError::persistence)?;
                info!(worker = %self.identity, id = worker.id, "Worker already registered, row refreshed");
                worker
            }
            None => {
                let worker = self
                    .store
                    .worker_insert(&self.get_self_worker())
                    .await
                    .map_err(PantryError::persistence)?;
                info!(worker = %self.identity, id = worker.id, "Worker registered");
                worker
            }
        };

        *self.self_worker.write() = registered.clone();
        Ok(registered)
    }

    /// Refresh the local worker's `updated_at`.
    ///
    /// If the row has been swept by another worker it is registered again.
    pub async fn heartbeat(&self) -> Result<()> {
        let now = Utc::now();
        let updated = self
            .store
            .worker_heartbeat(&self.identity, now)
            .await
            .map_err(PantryError::persistence)?;

        if updated {
            self.self_worker.write().updated_at = now;
            debug!(worker = %self.identity, "Heartbeat sent");
        } else {
            warn!(worker = %self.identity, "Worker row missing, registering again");
            self.register().await?;
        }
        Ok(())
    }

    /// Replace the pool with every other row in the table
    pub async fn refresh_pool(&self) -> Result<usize> {
        let peers = self
            .store
            .worker_list_others(&self.identity)
            .await
            .map_err(PantryError::persistence)?;

        let pool: HashMap<String, Worker> = peers
            .into_iter()
            .map(|peer| (peer.identity(), peer))
            .filter(|(identity, _)| *identity != self.identity)
            .collect();

        let size = pool.len();
        *self.pool.write() = pool;

        metrics::set_pool_size(size);
        debug!(peers = size, "Worker pool refreshed");
        Ok(size)
    }

    /// Delete rows older than the stale threshold
    pub async fn cleanup_stale(&self) -> Result<u64> {
        let threshold =
            Utc::now() - TimeDelta::milliseconds(self.config.stale_threshold.as_millis() as i64);
        let removed = self
            .store
            .worker_delete_stale(threshold)
            .await
            .map_err(PantryError::persistence)?;

        if removed > 0 {
            info!(removed, %threshold, "Removed stale workers");
        } else {
            debug!(%threshold, "No stale workers");
        }
        Ok(removed)
    }

    /// Push a write to every peer. Fails only when `value` cannot be encoded.
    pub async fn write_to_pool(&self, key: &str, value: &CacheValue) -> Result<FanOutReport> {
        let body = Bytes::from(serde_json::to_vec(value)?);
        let peers = self.pool_snapshot();
        if peers.is_empty() {
            debug!(key, "No workers in the pool, write not replicated");
            return Ok(FanOutReport::default());
        }

        let results = join_all(
            peers
                .iter()
                .map(|peer| self.transport.push_write(peer, key, body.clone())),
        )
        .await;

        Ok(Self::collect_report(OPERATION_WRITE, key, &peers, results))
    }

    /// Push a delete to every peer
    pub async fn delete_from_pool(&self, key: &str) -> Result<FanOutReport> {
        let peers = self.pool_snapshot();
        if peers.is_empty() {
            debug!(key, "No workers in the pool, delete not replicated");
            return Ok(FanOutReport::default());
        }

        let results = join_all(
            peers
                .iter()
                .map(|peer| self.transport.push_delete(peer, key)),
        )
        .await;

        Ok(Self::collect_report(OPERATION_DELETE, key, &peers, results))
    }

    fn collect_report(
        operation: &'static str,
        key: &str,
        peers: &[Worker],
        results: Vec<Result<()>>,
    ) -> FanOutReport {
        let mut report = FanOutReport {
            attempted: peers.len(),
            ..Default::default()
        };

        for (peer, result) in peers.iter().zip(results) {
            match result {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::record_replication(operation, true);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_replication(operation, false);
                    warn!(peer = %peer.identity(), key, operation, error = %e, "Failed to replicate to peer");
                }
            }
        }
        report
    }

    /// Spawn the heartbeat, refresh, and cleanup loops. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }

        tasks.push(self.spawn_loop(MembershipLoop::Heartbeat, self.config.heartbeat_interval));
        tasks.push(self.spawn_loop(MembershipLoop::Refresh, self.config.refresh_interval));
        tasks.push(self.spawn_loop(MembershipLoop::Cleanup, self.config.cleanup_interval));

        info!(
            worker = %self.identity,
            heartbeat_secs = self.config.heartbeat_interval.as_secs(),
            refresh_secs = self.config.refresh_interval.as_secs(),
            cleanup_secs = self.config.cleanup_interval.as_secs(),
            "Membership loops started"
        );
    }

    /// Signal the loops to exit and wait for them
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Membership loop ended abnormally");
            }
        }
        info!(worker = %self.identity, "Membership registry stopped");
    }

    fn spawn_loop(self: &Arc<Self>, kind: MembershipLoop, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
                    _ = ticker.tick() => {
                        if let Err(e) = registry.run_once(kind).await {
                            metrics::record_loop_error(kind.name());
                            warn!(loop_name = kind.name(), error = %e, "Membership loop iteration failed");
                        }
                    }
                }
            }
            debug!(loop_name = kind.name(), "Membership loop exited");
        })
    }

    async fn run_once(&self, kind: MembershipLoop) -> Result<()> {
        match kind {
            MembershipLoop::Heartbeat => self.heartbeat().await,
            MembershipLoop::Refresh => self.refresh_pool().await.map(|_| ()),
            MembershipLoop::Cleanup => self.cleanup_stale().await.map(|_| ()),
        }
    }
}
