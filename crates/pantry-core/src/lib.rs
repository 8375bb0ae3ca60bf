//! Pantry Core - Cache store, cluster membership, and replication
//!
//! This crate provides:
//! - The local concurrent `CacheStore`
//! - `MembershipRegistry` with its heartbeat, refresh, and cleanup loops
//! - Best-effort fan-out to peers over HTTP
//! - The bounded `ReplicationDispatcher`

pub mod metrics;
pub mod model;
pub mod service;

// Re-export commonly used types
pub use model::Configuration;
pub use service::{
    cache::CacheStore,
    dispatcher::{Mutation, ReplicationDispatcher, ReplicationDispatcherConfig},
    registry::{FanOutReport, MembershipRegistry, MembershipRegistryConfig},
    replication_client::{PeerTransport, ReplicationClient, ReplicationClientConfig},
};

pub use pantry_persistence::Worker;
