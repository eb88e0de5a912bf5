//! redb-backed persistent state

use super::{ForEachFn, PersistentState};
use crate::error::{Error, Result};
use redb::{Database, ReadOnlyDatabase, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use std::path::Path;

type Table<'a> = TableDefinition<'a, &'static [u8], &'static [u8]>;

enum Handle {
    ReadWrite(Database),
    ReadOnly(ReadOnlyDatabase),
}

/// Persistent state stored in a redb database file
///
/// Every mutation runs in its own write transaction. A store opened with
/// [`RedbPersistentState::read_only`] fails every mutation.
pub struct RedbPersistentState {
    db: Handle,
}

impl std::fmt::Debug for RedbPersistentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.db {
            Handle::ReadWrite(_) => "read-write",
            Handle::ReadOnly(_) => "read-only",
        };
        f.debug_struct("RedbPersistentState").field("mode", &mode).finish()
    }
}

fn state_err(what: &str, e: impl std::fmt::Display) -> Error {
    Error::State(format!("{what}: {e}"))
}

impl RedbPersistentState {
    /// Create or open a database for reading and writing
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| state_err("Failed to create database", e))?;
        Ok(Self {
            db: Handle::ReadWrite(db),
        })
    }

    /// Open an existing database without taking a write lock
    pub fn read_only(path: impl AsRef<Path>) -> Result<Self> {
        let db = ReadOnlyDatabase::open(path).map_err(|e| state_err("Failed to open database", e))?;
        Ok(Self {
            db: Handle::ReadOnly(db),
        })
    }

    fn begin_read(&self) -> Result<ReadTransaction> {
        match &self.db {
            Handle::ReadWrite(db) => db.begin_read(),
            Handle::ReadOnly(db) => db.begin_read(),
        }
        .map_err(|e| state_err("Failed to begin read transaction", e))
    }

    fn writable(&self, bucket: &str) -> Result<&Database> {
        match &self.db {
            Handle::ReadWrite(db) => Ok(db),
            Handle::ReadOnly(_) => Err(Error::State(format!("{bucket}: database is read-only"))),
        }
    }

    fn write(&self, bucket: &str, f: impl FnOnce(&mut redb::Table<'_, &'static [u8], &'static [u8]>) -> Result<()>) -> Result<()> {
        let db = self.writable(bucket)?;
        let write_txn = db
            .begin_write()
            .map_err(|e| state_err("Failed to begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(Table::new(bucket))
                .map_err(|e| state_err("Failed to open table", e))?;
            f(&mut table)?;
        }
        write_txn
            .commit()
            .map_err(|e| state_err("Failed to commit transaction", e))
    }
}

impl PersistentState for RedbPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self.begin_read()?;
        // A missing table is an empty bucket
        let Ok(table) = read_txn.open_table(Table::new(bucket)) else {
            return Ok(None);
        };
        match table.get(key) {
            Ok(value) => Ok(value.map(|v| v.value().to_vec())),
            Err(e) => Err(state_err("Failed to get value", e)),
        }
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(bucket, |table| {
            table
                .insert(key, value)
                .map(|_| ())
                .map_err(|e| state_err("Failed to insert value", e))
        })
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        self.write(bucket, |table| {
            table
                .remove(key)
                .map(|_| ())
                .map_err(|e| state_err("Failed to remove value", e))
        })
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let db = self.writable(bucket)?;
        let write_txn = db
            .begin_write()
            .map_err(|e| state_err("Failed to begin write transaction", e))?;
        write_txn
            .delete_table(Table::new(bucket))
            .map_err(|e| state_err("Failed to delete table", e))?;
        write_txn
            .commit()
            .map_err(|e| state_err("Failed to commit transaction", e))
    }

    fn for_each(&self, bucket: &str, f: &mut ForEachFn<'_>) -> Result<()> {
        let read_txn = self.begin_read()?;
        let Ok(table) = read_txn.open_table(Table::new(bucket)) else {
            return Ok(());
        };
        let iter = table.iter().map_err(|e| state_err("Failed to iterate table", e))?;
        for item in iter {
            let (key, value) = item.map_err(|e| state_err("Failed to read item", e))?;
            f(key.value(), value.value())?;
        }
        Ok(())
    }

    fn buckets(&self) -> Result<Vec<String>> {
        let read_txn = self.begin_read()?;
        let tables = read_txn
            .list_tables()
            .map_err(|e| state_err("Failed to list tables", e))?;
        let mut names: Vec<String> = tables.map(|t| t.name().to_string()).collect();
        names.sort();
        Ok(names)
    }

    fn close(self) -> Result<()> {
        // redb closes automatically when dropped
        drop(self.db);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::persistent::{ENTRY_STATE_BUCKET, SCRIPT_STATE_BUCKET};
    use tempfile::TempDir;

    #[test]
    fn test_set_get_delete() {
        let temp = TempDir::new().unwrap();
        let state = RedbPersistentState::new(temp.path().join("state.redb")).unwrap();

        assert_eq!(state.get(ENTRY_STATE_BUCKET, b"k").unwrap(), None);
        state.set(ENTRY_STATE_BUCKET, b"k", b"v").unwrap();
        assert_eq!(state.get(ENTRY_STATE_BUCKET, b"k").unwrap(), Some(b"v".to_vec()));
        state.delete(ENTRY_STATE_BUCKET, b"k").unwrap();
        assert_eq!(state.get(ENTRY_STATE_BUCKET, b"k").unwrap(), None);
    }

    #[test]
    fn test_for_each_in_key_order() {
        let temp = TempDir::new().unwrap();
        let state = RedbPersistentState::new(temp.path().join("state.redb")).unwrap();
        state.set(SCRIPT_STATE_BUCKET, b"b", b"2").unwrap();
        state.set(SCRIPT_STATE_BUCKET, b"a", b"1").unwrap();

        let mut keys = Vec::new();
        state
            .for_each(SCRIPT_STATE_BUCKET, &mut |k, _| {
                keys.push(k.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(keys, [b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(state.buckets().unwrap(), [SCRIPT_STATE_BUCKET]);

        state.delete_bucket(SCRIPT_STATE_BUCKET).unwrap();
        assert!(state.buckets().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_read_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.redb");
        let state = RedbPersistentState::new(&path).unwrap();
        state.set(ENTRY_STATE_BUCKET, b"k", b"v").unwrap();
        state.close().unwrap();

        let state = RedbPersistentState::read_only(&path).unwrap();
        assert_eq!(state.get(ENTRY_STATE_BUCKET, b"k").unwrap(), Some(b"v".to_vec()));
        assert!(matches!(state.set(ENTRY_STATE_BUCKET, b"k", b"w"), Err(Error::State(_))));
    }
}
