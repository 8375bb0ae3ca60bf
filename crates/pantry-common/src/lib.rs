//! Pantry Common - Shared types, errors, and utilities
//!
//! This crate provides the foundational types used across all Pantry components:
//! - The `PantryError` taxonomy
//! - The cached value type
//! - Worker identity helpers
//! - Query parameter and path constants

pub mod error;
pub mod utils;

pub use error::{PantryError, Result};
pub use utils::{parse_identity, worker_identity};

/// Value held under a cache key: a JSON object with arbitrary nested values.
pub type CacheValue = serde_json::Map<String, serde_json::Value>;

/// Query parameter carrying the cache key
pub const KEY_PARAM: &str = "key";

/// Path of the client-facing cache resource
pub const CACHE_PATH: &str = "/cache";

/// Path of the peer-facing sync resource
pub const SYNC_PATH: &str = "/cache/sync";

/// Replication operation labels
pub const OPERATION_WRITE: &str = "write";
pub const OPERATION_DELETE: &str = "delete";
