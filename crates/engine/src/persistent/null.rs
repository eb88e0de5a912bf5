//! Persistent state that remembers nothing

use super::{ForEachFn, PersistentState};
use crate::error::Result;

/// Reads find nothing and writes are discarded
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPersistentState;

impl PersistentState for NullPersistentState {
    fn get(&self, _bucket: &str, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&self, _bucket: &str, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _bucket: &str, _key: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete_bucket(&self, _bucket: &str) -> Result<()> {
        Ok(())
    }

    fn for_each(&self, _bucket: &str, _f: &mut ForEachFn<'_>) -> Result<()> {
        Ok(())
    }

    fn buckets(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
