//! In-memory persistent state

use super::{ForEachFn, PersistentState};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Inner map: key/value pairs within a bucket
type BucketData = BTreeMap<Vec<u8>, Vec<u8>>;
/// Outer map: bucket name to bucket data
type StateData = BTreeMap<String, BucketData>;

/// Persistent state held in memory, for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MockPersistentState {
    data: RwLock<StateData>,
}

impl MockPersistentState {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StateData>> {
        self.data
            .read()
            .map_err(|_| Error::State("state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StateData>> {
        self.data
            .write()
            .map_err(|_| Error::State("state lock poisoned".to_string()))
    }
}

impl PersistentState for MockPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(bucket).and_then(|b| b.get(key).cloned()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        if let Some(bucket_data) = self.write()?.get_mut(bucket) {
            bucket_data.remove(key);
        }
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.write()?.remove(bucket);
        Ok(())
    }

    fn for_each(&self, bucket: &str, f: &mut ForEachFn<'_>) -> Result<()> {
        // Snapshot so the callback may write back into this store
        let entries = self.read()?.get(bucket).cloned().unwrap_or_default();
        for (k, v) in &entries {
            f(k, v)?;
        }
        Ok(())
    }

    fn buckets(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }
}
