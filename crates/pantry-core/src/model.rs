//! Application configuration wrapper
//!
//! Provides typed access to the tunables consumed by the registry and the
//! replication path. Missing or unparsable values fall back to defaults.

/// Application configuration wrapper
#[derive(Clone, Debug)]
pub struct Configuration {
    pub config: config::Config,
}

impl Configuration {
    /// Create a new configuration from a Config instance
    pub fn from_config(config: config::Config) -> Self {
        Self { config }
    }

    fn positive_int(&self, key: &str, default: i64) -> u64 {
        let value = self.config.get_int(key).unwrap_or(default);
        if value > 0 { value as u64 } else { default as u64 }
    }

    /// Interval between heartbeats of the local worker row
    pub fn registry_heartbeat_interval_secs(&self) -> u64 {
        self.positive_int("registry.heartbeat_interval_secs", 15)
    }

    /// Interval between pool rebuilds
    pub fn registry_refresh_interval_secs(&self) -> u64 {
        self.positive_int("registry.refresh_interval_secs", 60)
    }

    /// Interval between stale row sweeps
    pub fn registry_cleanup_interval_secs(&self) -> u64 {
        self.positive_int("registry.cleanup_interval_secs", 1800)
    }

    /// Age after which a worker row counts as stale
    pub fn registry_stale_threshold_secs(&self) -> u64 {
        self.positive_int("registry.stale_threshold_secs", 60)
    }

    /// Per-peer request timeout
    pub fn replication_timeout_ms(&self) -> u64 {
        self.positive_int("replication.timeout_ms", 1000)
    }

    /// Capacity of the pending mutation queue
    pub fn replication_queue_capacity(&self) -> usize {
        self.positive_int("replication.queue_capacity", 1024) as usize
    }

    /// How long shutdown waits for in-flight fan-out
    pub fn replication_drain_timeout_secs(&self) -> u64 {
        self.positive_int("replication.drain_timeout_secs", 10)
    }
}
