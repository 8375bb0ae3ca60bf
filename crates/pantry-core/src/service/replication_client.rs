// HTTP client for pushing mutations to peers' sync endpoints
// One request per peer, bounded by a fixed timeout, never retried

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use pantry_common::{KEY_PARAM, PantryError, Result, SYNC_PATH};
use pantry_persistence::Worker;

/// Configuration for the replication client
#[derive(Clone, Debug)]
pub struct ReplicationClientConfig {
    /// Per-peer request timeout, connect included
    pub request_timeout: Duration,
}

impl Default for ReplicationClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(1),
        }
    }
}

impl ReplicationClientConfig {
    /// Create a ReplicationClientConfig from application Configuration
    pub fn from_configuration(config: &crate::model::Configuration) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.replication_timeout_ms()),
        }
    }
}

/// Delivery of a single mutation to a single peer
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Apply a write on the peer. `body` is the JSON-encoded value.
    async fn push_write(&self, peer: &Worker, key: &str, body: Bytes) -> Result<()>;

    /// Apply a delete on the peer
    async fn push_delete(&self, peer: &Worker, key: &str) -> Result<()>;
}

/// reqwest-backed transport talking to `http://{identity}/cache/sync`
#[derive(Clone, Debug)]
pub struct ReplicationClient {
    client: reqwest::Client,
    config: ReplicationClientConfig,
}

impl ReplicationClient {
    pub fn new(config: ReplicationClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PantryError::Configuration(format!("failed to build replication client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    fn sync_url(peer: &Worker) -> String {
        format!("http://{}{}", peer.identity(), SYNC_PATH)
    }

    async fn send(&self, peer: &Worker, request: reqwest::RequestBuilder) -> Result<()> {
        let identity = peer.identity();
        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!(
                        peer = %identity,
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "Peer did not answer in time"
                    );
                }
                PantryError::peer(&identity, e)
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(PantryError::peer(
                identity,
                format!("unexpected status {status}"),
            ));
        }

        debug!(peer = %identity, status = status.as_u16(), "Peer accepted mutation");
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for ReplicationClient {
    async fn push_write(&self, peer: &Worker, key: &str, body: Bytes) -> Result<()> {
        let request = self
            .client
            .post(Self::sync_url(peer))
            .query(&[(KEY_PARAM, key)])
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        self.send(peer, request).await
    }

    async fn push_delete(&self, peer: &Worker, key: &str) -> Result<()> {
        let request = self
            .client
            .delete(Self::sync_url(peer))
            .query(&[(KEY_PARAM, key)]);

        self.send(peer, request).await
    }
}
