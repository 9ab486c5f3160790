use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::counter::CounterStore;
use crate::error::KVError;
use crate::traits::KVStore;

/// In-memory implementation of [`KVStore`] and [`CounterStore`].
///
/// A single mutex guards each map, so increments are atomic within the
/// process. Intended for tests and single-process tooling; production
/// deployments use [`RedbStore`](crate::RedbStore).
#[derive(Default)]
pub struct MemoryStore {
    kv: Mutex<BTreeMap<String, Vec<u8>>>,
    counters: Mutex<BTreeMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KVStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let kv = self
            .kv
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(kv.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let mut kv = self
            .kv
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        kv.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let mut kv = self
            .kv
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        kv.remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let kv = self
            .kv
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(kv
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

impl CounterStore for MemoryStore {
    fn increment_by(&self, key: &str, delta: u64) -> Result<u64, KVError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let slot = counters.entry(key.to_string()).or_insert(0);
        *slot = slot
            .checked_add(delta)
            .ok_or_else(|| KVError::Storage(format!("counter {key} overflow")))?;
        Ok(*slot)
    }

    fn peek(&self, key: &str) -> Result<u64, KVError> {
        let counters = self
            .counters
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(counters.get(key).copied().unwrap_or(0))
    }

    fn set(&self, key: &str, value: u64) -> Result<(), KVError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        counters.insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), KVError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        counters.remove(key);
        Ok(())
    }
}
