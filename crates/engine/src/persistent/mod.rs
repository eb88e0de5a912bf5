//! Persistent state between runs
//!
//! State is stored as key/value pairs grouped into buckets. Values are JSON.
//!
//! - [`ENTRY_STATE_BUCKET`]: last-written [`EntryState`] per target path
//! - [`SCRIPT_STATE_BUCKET`]: [`ScriptState`] per hash of a run-once script
//! - [`CONFIG_STATE_BUCKET`]: hash of the config file the state belongs to
//!
//! [`EntryState`]: crate::entry_state::EntryState

mod database;
mod debug;
mod mock;
mod null;

pub use database::RedbPersistentState;
pub use debug::DebugPersistentState;
pub use mock::MockPersistentState;
pub use null::NullPersistentState;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bucket of last-written entry states, keyed by absolute target path
pub const ENTRY_STATE_BUCKET: &str = "entryState";
/// Bucket of run-once script records, keyed by hex contents hash
pub const SCRIPT_STATE_BUCKET: &str = "scriptState";
/// Bucket of configuration state
pub const CONFIG_STATE_BUCKET: &str = "configState";

/// Callback invoked for every key/value pair in a bucket
pub type ForEachFn<'a> = dyn FnMut(&[u8], &[u8]) -> Result<()> + 'a;

/// Trait for persistent state storage
pub trait PersistentState {
    /// Get a value from a bucket
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set a value in a bucket
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key from a bucket
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;

    /// Delete an entire bucket
    fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Iterate over all key/value pairs in a bucket, in key order
    fn for_each(&self, bucket: &str, f: &mut ForEachFn<'_>) -> Result<()>;

    /// Names of all buckets
    fn buckets(&self) -> Result<Vec<String>>;

    /// Copy every bucket into `other`
    fn copy_to(&self, other: &dyn PersistentState) -> Result<()> {
        for bucket in self.buckets()? {
            self.for_each(&bucket, &mut |key, value| other.set(&bucket, key, value))?;
        }
        Ok(())
    }

    /// Close the store
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Record of a run-once script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptState {
    /// Target name of the script when it ran
    pub name: String,
    /// When it ran
    pub run_at: DateTime<Utc>,
}

/// Read and decode a JSON value
pub fn get_json<T: DeserializeOwned>(
    state: &dyn PersistentState,
    bucket: &str,
    key: &[u8],
) -> Result<Option<T>> {
    let Some(bytes) = state.get(bucket, key)? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| Error::Format {
        format: "json",
        message: format!("{bucket}/{}: {e}", String::from_utf8_lossy(key)),
    })
}

/// Encode and store a JSON value
pub fn set_json<T: Serialize>(state: &dyn PersistentState, bucket: &str, key: &[u8], value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| Error::Format {
        format: "json",
        message: e.to_string(),
    })?;
    state.set(bucket, key, &bytes)
}

/// Every bucket and its entries as JSON
///
/// Values that are not valid JSON are included as strings.
pub fn dump(state: &dyn PersistentState) -> Result<serde_json::Value> {
    let mut buckets = serde_json::Map::new();
    for bucket in state.buckets()? {
        let mut entries = serde_json::Map::new();
        state.for_each(&bucket, &mut |key, value| {
            let value = serde_json::from_slice(value)
                .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(value).into_owned()));
            entries.insert(String::from_utf8_lossy(key).into_owned(), value);
            Ok(())
        })?;
        buckets.insert(bucket, serde_json::Value::Object(entries));
    }
    Ok(serde_json::Value::Object(buckets))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::entry_state::{EntryState, EntryStateType};

    #[test]
    fn test_json_helpers() {
        let state = MockPersistentState::new();
        let entry = EntryState::new(EntryStateType::Dir, 0o755);
        set_json(&state, ENTRY_STATE_BUCKET, b"/home/user/.config", &entry).unwrap();
        let back: EntryState = get_json(&state, ENTRY_STATE_BUCKET, b"/home/user/.config")
            .unwrap()
            .unwrap();
        assert_eq!(back, entry);
        assert!(get_json::<EntryState>(&state, ENTRY_STATE_BUCKET, b"missing").unwrap().is_none());
    }

    #[test]
    fn test_invalid_json() {
        let state = MockPersistentState::new();
        state.set(SCRIPT_STATE_BUCKET, b"k", b"not json").unwrap();
        assert!(matches!(
            get_json::<ScriptState>(&state, SCRIPT_STATE_BUCKET, b"k"),
            Err(Error::Format { format: "json", .. })
        ));
    }

    #[test]
    fn test_copy_to_and_dump() {
        let from = MockPersistentState::new();
        let script = ScriptState {
            name: "run_once_setup.sh".to_string(),
            run_at: DateTime::from_timestamp(0, 0).unwrap(),
        };
        set_json(&from, SCRIPT_STATE_BUCKET, b"abc", &script).unwrap();
        from.set(CONFIG_STATE_BUCKET, b"configHash", b"\"x\"").unwrap();

        let to = MockPersistentState::new();
        from.copy_to(&to).unwrap();
        let dumped = dump(&to).unwrap();
        assert_eq!(dumped["scriptState"]["abc"]["name"], "run_once_setup.sh");
        assert_eq!(dumped["scriptState"]["abc"]["runAt"], "1970-01-01T00:00:00Z");
        assert_eq!(dumped["configState"]["configHash"], "x");
    }
}
