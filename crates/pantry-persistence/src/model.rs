//! Domain model types for the persistence abstraction layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pantry_common::{parse_identity, worker_identity};

use crate::entity::workers;

/// One cluster member as known to the membership table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: i64,
    pub hostname: String,
    /// Client-facing port. Only known for the local worker; peers read back
    /// from the table carry `0`.
    pub port: u16,
    pub sync_port: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worker {
    /// A worker that has not been persisted yet
    pub fn new(hostname: impl Into<String>, port: u16, sync_port: u16) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            hostname: hostname.into(),
            port,
            sync_port,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `hostname:sync_port` identity used for discovery and fan-out
    pub fn identity(&self) -> String {
        worker_identity(&self.hostname, self.sync_port)
    }

    /// Rebuild a worker from a table row, parsing the sync port back out of
    /// the identity. Returns `None` for rows whose identity is malformed.
    pub fn from_row(row: workers::Model) -> Option<Self> {
        let (hostname, sync_port) = parse_identity(&row.worker)?;
        Some(Self {
            id: row.id,
            hostname: hostname.to_string(),
            port: 0,
            sync_port,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
