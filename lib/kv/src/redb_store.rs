use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::counter::CounterStore;
use crate::error::KVError;
use crate::traits::KVStore;

const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");
const COUNTER_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// RedbStore backs both [`KVStore`] and [`CounterStore`] with redb,
/// a pure-Rust embedded key-value database.
///
/// redb serializes write transactions, so the read-modify-write inside
/// [`CounterStore::increment_by`] is atomic: no two committed
/// transactions can observe the same prior counter value.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Storage(e.to_string()))?;

        // Ensure both tables exist by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let _kv = write_txn
                .open_table(KV_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            let _counters = write_txn
                .open_table(COUNTER_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(KV_TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(KV_TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        let iter = table
            .range(prefix..)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| KVError::Storage(e.to_string()))?;
            let key_str = key.value().to_string();
            if !key_str.starts_with(prefix) {
                break;
            }
            results.push((key_str, value.value().to_vec()));
        }
        Ok(results)
    }
}

impl CounterStore for RedbStore {
    fn increment_by(&self, key: &str, delta: u64) -> Result<u64, KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let new_value;
        {
            let mut table = write_txn
                .open_table(COUNTER_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            let current = match table.get(key) {
                Ok(Some(v)) => v.value(),
                Ok(None) => 0,
                Err(e) => return Err(KVError::Storage(e.to_string())),
            };
            new_value = current
                .checked_add(delta)
                .ok_or_else(|| KVError::Storage(format!("counter {key} overflow")))?;
            table
                .insert(key, new_value)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(new_value)
    }

    fn peek(&self, key: &str) -> Result<u64, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(COUNTER_TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        match table.get(key) {
            Ok(Some(v)) => Ok(v.value()),
            Ok(None) => Ok(0),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: u64) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(COUNTER_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .insert(key, value)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(COUNTER_TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(())
    }
}
