// Bounded queue between request handlers and peer fan-out
// Handlers never wait on replication; mutations that do not fit are dropped

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, warn};

use pantry_common::{CacheValue, OPERATION_DELETE, OPERATION_WRITE};

use super::registry::MembershipRegistry;

/// A local mutation to replicate
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Write { key: String, value: CacheValue },
    Delete { key: String },
}

impl Mutation {
    pub fn key(&self) -> &str {
        match self {
            Mutation::Write { key, .. } | Mutation::Delete { key } => key,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Mutation::Write { .. } => OPERATION_WRITE,
            Mutation::Delete { .. } => OPERATION_DELETE,
        }
    }
}

/// Replication dispatcher configuration
#[derive(Clone, Debug)]
pub struct ReplicationDispatcherConfig {
    /// Pending mutations held before new ones are dropped
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight fan-out before aborting it
    pub drain_timeout: Duration,
}

impl Default for ReplicationDispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

impl ReplicationDispatcherConfig {
    /// Create a ReplicationDispatcherConfig from application Configuration
    pub fn from_configuration(config: &crate::model::Configuration) -> Self {
        Self {
            queue_capacity: config.replication_queue_capacity(),
            drain_timeout: Duration::from_secs(config.replication_drain_timeout_secs()),
        }
    }
}

/// Replication dispatcher
///
/// A single worker task receives mutations and spawns one fan-out task per
/// mutation. Delivery is at most once.
pub struct ReplicationDispatcher {
    sender: Mutex<Option<mpsc::Sender<Mutation>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl ReplicationDispatcher {
    /// Start the worker task
    pub fn start(registry: Arc<MembershipRegistry>, config: ReplicationDispatcherConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(Self::run(registry, receiver, config.drain_timeout));

        info!(
            queue_capacity = config.queue_capacity,
            drain_timeout_secs = config.drain_timeout.as_secs(),
            "Replication dispatcher started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a mutation without waiting. Returns false when it was dropped.
    pub fn dispatch(&self, mutation: Mutation) -> bool {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            warn!(key = mutation.key(), operation = mutation.operation(), "Dispatcher stopped, mutation not replicated");
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match sender.try_send(mutation) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(mutation)) => {
                warn!(key = mutation.key(), operation = mutation.operation(), "Replication queue full, mutation dropped");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(mutation)) => {
                warn!(key = mutation.key(), operation = mutation.operation(), "Replication queue closed, mutation dropped");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Mutations accepted onto the queue
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Mutations rejected because the queue was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue, deliver what is queued, and wait for in-flight
    /// fan-out up to the drain timeout
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Replication dispatcher worker failed");
            }
        }
    }

    async fn run(
        registry: Arc<MembershipRegistry>,
        mut receiver: mpsc::Receiver<Mutation>,
        drain_timeout: Duration,
    ) {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                mutation = receiver.recv() => match mutation {
                    Some(mutation) => {
                        in_flight.spawn(Self::replicate(registry.clone(), mutation));
                    }
                    None => break,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Fan-out task failed");
                    }
                }
            }
        }

        let pending = in_flight.len();
        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Fan-out task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = in_flight.len(), "Drain timeout reached, aborting fan-out");
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }
        info!(pending, "Replication dispatcher stopped");
    }

    async fn replicate(registry: Arc<MembershipRegistry>, mutation: Mutation) {
        let result = match &mutation {
            Mutation::Write { key, value } => registry.write_to_pool(key, value).await,
            Mutation::Delete { key } => registry.delete_from_pool(key).await,
        };

        match result {
            Ok(report) => debug!(
                key = mutation.key(),
                operation = mutation.operation(),
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                "Fan-out finished"
            ),
            Err(e) => error!(
                key = mutation.key(),
                operation = mutation.operation(),
                error = %e,
                "Fan-out failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pantry_persistence::{MembershipPersistence, Worker};
    use serde_json::json;

    use super::*;
    use crate::service::{
        registry::{MembershipRegistryConfig, tests::RecordingTransport},
        test_support::setup_store,
    };

    async fn registry_with_peer(transport: Arc<RecordingTransport>) -> Arc<MembershipRegistry> {
        let store = setup_store().await;
        store
            .worker_insert(&Worker::new("host-b", 0, 9001))
            .await
            .unwrap();

        let registry = Arc::new(MembershipRegistry::new(
            Worker::new("host-a", 8080, 9001),
            store,
            transport,
            MembershipRegistryConfig::default(),
        ));
        registry.register().await.unwrap();
        registry.refresh_pool().await.unwrap();
        registry
    }

    #[test]
    fn test_mutation_accessors() {
        let write = Mutation::Write {
            key: "k".to_string(),
            value: CacheValue::new(),
        };
        assert_eq!(write.key(), "k");
        assert_eq!(write.operation(), "write");

        let delete = Mutation::Delete {
            key: "d".to_string(),
        };
        assert_eq!(delete.key(), "d");
        assert_eq!(delete.operation(), "delete");
    }

    #[tokio::test]
    async fn test_queued_mutations_are_delivered_on_shutdown() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = registry_with_peer(transport.clone()).await;
        let dispatcher =
            ReplicationDispatcher::start(registry, ReplicationDispatcherConfig::default());

        let value = json!({"x": 1}).as_object().cloned().unwrap();
        assert!(dispatcher.dispatch(Mutation::Write {
            key: "k".to_string(),
            value,
        }));
        assert!(dispatcher.dispatch(Mutation::Delete {
            key: "k".to_string(),
        }));

        dispatcher.shutdown().await;

        assert_eq!(dispatcher.accepted(), 2);
        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, peer, key)| peer == "host-b:9001" && key == "k"));
    }

    #[tokio::test]
    async fn test_dispatch_after_shutdown_is_dropped() {
        let transport = Arc::new(RecordingTransport::default());
        let registry = registry_with_peer(transport.clone()).await;
        let dispatcher =
            ReplicationDispatcher::start(registry, ReplicationDispatcherConfig::default());

        dispatcher.shutdown().await;

        assert!(!dispatcher.dispatch(Mutation::Delete {
            key: "late".to_string(),
        }));
        assert_eq!(dispatcher.dropped(), 1);
        assert!(transport.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_slow_fan_out() {
        let transport = Arc::new(RecordingTransport {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let registry = registry_with_peer(transport.clone()).await;
        let dispatcher = ReplicationDispatcher::start(
            registry,
            ReplicationDispatcherConfig {
                queue_capacity: 8,
                drain_timeout: Duration::from_millis(100),
            },
        );

        assert!(dispatcher.dispatch(Mutation::Delete {
            key: "k".to_string(),
        }));

        let started = Instant::now();
        dispatcher.shutdown().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(transport.calls.lock().is_empty());
    }
}
