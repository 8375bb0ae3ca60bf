//! Membership persistence trait
//!
//! Defines the interface for the shared `workers` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::Worker;

/// Membership persistence operations
#[async_trait]
pub trait MembershipPersistence: Send + Sync {
    /// Check whether a row with this identity exists
    async fn worker_exists(&self, identity: &str) -> anyhow::Result<bool>;

    /// Find the row for an identity
    async fn worker_find_by_identity(&self, identity: &str) -> anyhow::Result<Option<Worker>>;

    /// Insert a worker; returns it with the assigned id and timestamps
    async fn worker_insert(&self, worker: &Worker) -> anyhow::Result<Worker>;

    /// Set `updated_at` on the row keyed by the worker's id.
    /// Returns false when no row matched.
    async fn worker_update(&self, worker: &Worker) -> anyhow::Result<bool>;

    /// Set `updated_at` on the row keyed by identity.
    /// Returns false when no row matched.
    async fn worker_heartbeat(&self, identity: &str, at: DateTime<Utc>) -> anyhow::Result<bool>;

    /// All workers except the one with `exclude_identity`
    async fn worker_list_others(&self, exclude_identity: &str) -> anyhow::Result<Vec<Worker>>;

    /// Delete rows last updated before `threshold`; returns the number removed
    async fn worker_delete_stale(&self, threshold: DateTime<Utc>) -> anyhow::Result<u64>;

    /// Create the `workers` table if it does not exist
    async fn ensure_schema(&self) -> anyhow::Result<()>;

    /// Verify connectivity
    async fn health_check(&self) -> anyhow::Result<()>;
}
