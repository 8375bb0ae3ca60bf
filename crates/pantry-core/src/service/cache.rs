// Local key/value store
// Values are kept as serialized JSON so callers never share state with the store

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

use pantry_common::{CacheValue, PantryError, Result};

use crate::metrics;

/// A stored value in serialized form
#[derive(Clone, Debug)]
struct CacheEntry {
    payload: Bytes,
}

impl CacheEntry {
    fn encode(value: &CacheValue) -> Result<Self> {
        Ok(Self {
            payload: Bytes::from(serde_json::to_vec(value)?),
        })
    }

    fn decode(&self) -> Result<CacheValue> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Thread-safe in-memory cache
///
/// Writers exclude readers and each other; reads run in parallel. The lock
/// is never held while encoding or decoding.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: &CacheValue) -> Result<()> {
        let entry = CacheEntry::encode(value)?;
        let size = {
            let mut entries = self.entries.write();
            entries.insert(key.into(), entry);
            entries.len()
        };

        metrics::record_cache_operation("set");
        metrics::set_cache_size(size);
        Ok(())
    }

    /// Return a fresh copy of the value under `key`
    pub fn get(&self, key: &str) -> Result<CacheValue> {
        let entry = self.entries.read().get(key).cloned();

        match entry {
            Some(entry) => {
                metrics::record_cache_operation("get");
                entry.decode()
            }
            None => {
                metrics::record_cache_operation("miss");
                Err(PantryError::NotFound(key.to_string()))
            }
        }
    }

    /// Remove `key`. Deleting a missing key is not an error.
    pub fn delete(&self, key: &str) {
        let size = {
            let mut entries = self.entries.write();
            entries.remove(key);
            entries.len()
        };

        metrics::record_cache_operation("delete");
        metrics::set_cache_size(size);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn value(json: serde_json::Value) -> CacheValue {
        json.as_object().cloned().unwrap()
    }

    #[test]
    fn test_set_get_delete() {
        let store = CacheStore::new();
        let user = value(json!({"name": "Ann", "age": 30}));

        store.set("user:1", &user).unwrap();
        assert_eq!(store.get("user:1").unwrap(), user);

        store.delete("user:1");
        assert!(store.get("user:1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_missing_key() {
        let store = CacheStore::new();
        let err = store.get("never-set").unwrap_err();
        assert!(matches!(err, PantryError::NotFound(ref key) if key == "never-set"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = CacheStore::new();
        store.delete("missing");
        store.set("k", &value(json!({"x": 1}))).unwrap();
        store.delete("k");
        store.delete("k");
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let store = CacheStore::new();
        store.set("k", &value(json!({"x": 1}))).unwrap();
        store.set("k", &value(json!({"x": 2, "y": [1, 2]}))).unwrap();

        assert_eq!(store.get("k").unwrap(), value(json!({"x": 2, "y": [1, 2]})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_caller_mutation_does_not_leak_into_store() {
        let store = CacheStore::new();
        let mut original = value(json!({"name": "Ann"}));
        store.set("user:1", &original).unwrap();

        original.insert("name".to_string(), json!("Bob"));
        let mut fetched = store.get("user:1").unwrap();
        fetched.insert("extra".to_string(), json!(true));

        assert_eq!(store.get("user:1").unwrap(), value(json!({"name": "Ann"})));
    }

    #[test]
    fn test_nested_values_round_trip() {
        let store = CacheStore::new();
        let nested = value(json!({
            "int": 1,
            "float": 1.5,
            "null": null,
            "list": ["a", {"b": false}],
            "map": {"inner": {"deep": "yes"}}
        }));

        store.set("nested", &nested).unwrap();
        let fetched = store.get("nested").unwrap();
        assert_eq!(fetched, nested);
        assert!(fetched["int"].is_i64());
        assert!(fetched["float"].is_f64());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = Arc::new(CacheStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("k{}", j % 10);
                        store.set(key.clone(), &value(json!({"writer": i, "n": j}))).unwrap();
                        let _ = store.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }
}
