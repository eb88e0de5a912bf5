//! Persistent state that logs every access

use super::{ForEachFn, PersistentState};
use crate::error::Result;

/// Wraps a store and emits a `tracing` debug event for each call
#[derive(Debug)]
pub struct DebugPersistentState<P> {
    state: P,
}

impl<P: PersistentState> DebugPersistentState<P> {
    /// Wrap `state`
    pub fn new(state: P) -> Self {
        Self { state }
    }

    /// Unwrap the store
    pub fn into_inner(self) -> P {
        self.state
    }
}

impl<P: PersistentState> PersistentState for DebugPersistentState<P> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let result = self.state.get(bucket, key);
        tracing::debug!(
            bucket,
            key = %String::from_utf8_lossy(key),
            found = matches!(result, Ok(Some(_))),
            "state get"
        );
        result
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        tracing::debug!(
            bucket,
            key = %String::from_utf8_lossy(key),
            value = %String::from_utf8_lossy(value),
            "state set"
        );
        self.state.set(bucket, key, value)
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        tracing::debug!(bucket, key = %String::from_utf8_lossy(key), "state delete");
        self.state.delete(bucket, key)
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        tracing::debug!(bucket, "state delete bucket");
        self.state.delete_bucket(bucket)
    }

    fn for_each(&self, bucket: &str, f: &mut ForEachFn<'_>) -> Result<()> {
        tracing::debug!(bucket, "state for each");
        self.state.for_each(bucket, f)
    }

    fn buckets(&self) -> Result<Vec<String>> {
        self.state.buckets()
    }

    fn close(self) -> Result<()> {
        tracing::debug!("state close");
        self.state.close()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::persistent::{MockPersistentState, NullPersistentState};

    #[test]
    fn test_delegates() {
        let state = DebugPersistentState::new(MockPersistentState::new());
        state.set("b", b"k", b"v").unwrap();
        assert_eq!(state.get("b", b"k").unwrap(), Some(b"v".to_vec()));
        let inner = state.into_inner();
        assert_eq!(inner.buckets().unwrap(), ["b"]);
    }

    #[test]
    fn test_null_discards() {
        let state = DebugPersistentState::new(NullPersistentState);
        state.set("b", b"k", b"v").unwrap();
        assert_eq!(state.get("b", b"k").unwrap(), None);
        state.close().unwrap();
    }
}
