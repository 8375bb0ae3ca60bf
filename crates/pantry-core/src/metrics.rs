// Metrics for the cache and the cluster
// Recorded through the `metrics` facade; the server installs the exporter

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const CACHE_OPERATIONS_TOTAL: &str = "cache_operations_total";
pub const CACHE_SIZE: &str = "cache_size";
pub const REPLICATION_REQUESTS_TOTAL: &str = "replication_requests_total";
pub const CLUSTER_POOL_SIZE: &str = "cluster_pool_size";
pub const MEMBERSHIP_LOOP_ERRORS_TOTAL: &str = "membership_loop_errors_total";

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        CACHE_OPERATIONS_TOTAL,
        "Total number of cache operations by kind"
    );
    describe_gauge!(CACHE_SIZE, "Current number of keys in the local cache");
    describe_counter!(
        REPLICATION_REQUESTS_TOTAL,
        "Total number of peer replication requests by operation and outcome"
    );
    describe_gauge!(CLUSTER_POOL_SIZE, "Number of peers in the replication pool");
    describe_counter!(
        MEMBERSHIP_LOOP_ERRORS_TOTAL,
        "Total number of failed membership loop iterations"
    );

    tracing::info!("Metrics initialized");
}

/// Record a cache operation (`get`, `set`, `delete`, `miss`)
pub fn record_cache_operation(operation: &'static str) {
    counter!(CACHE_OPERATIONS_TOTAL, "operation" => operation).increment(1);
}

/// Update cache size
pub fn set_cache_size(size: usize) {
    gauge!(CACHE_SIZE).set(size as f64);
}

/// Record one per-peer replication request
pub fn record_replication(operation: &'static str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    counter!(REPLICATION_REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// Update pool size
pub fn set_pool_size(size: usize) {
    gauge!(CLUSTER_POOL_SIZE).set(size as f64);
}

/// Record a failed loop iteration (`heartbeat`, `refresh`, `cleanup`)
pub fn record_loop_error(loop_name: &'static str) {
    counter!(MEMBERSHIP_LOOP_ERRORS_TOTAL, "loop" => loop_name).increment(1);
}
