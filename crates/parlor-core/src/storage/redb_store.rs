//! # redb-backed Record Store
//!
//! A disk-backed record store using the redb embedded database.
//!
//! Each collection is one row of the `collections` table, so loading or
//! saving a collection is a single read or write transaction:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! A monotonically increasing revision counter is bumped in the same
//! transaction as every write, so pollers can tell cheaply whether anything
//! changed since their last look.

use crate::ParlorError;
use crate::store::RecordStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for collections: collection key -> encoded records
const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Metadata key of the write revision counter.
const REVISION: &str = "revision";

fn io_err(e: impl std::fmt::Display) -> ParlorError {
    ParlorError::IoError(e.to_string())
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ParlorError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Number of committed writes since the store was created.
    pub fn revision(&self) -> Result<u64, ParlorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(METADATA).map_err(io_err)?;
        Ok(table
            .get(REVISION)
            .map_err(io_err)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), ParlorError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    /// Apply `entries` (None = delete) and bump the revision, in one transaction.
    fn commit(&mut self, entries: &[(&str, Option<&[u8]>)]) -> Result<(), ParlorError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut collections = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
            for (key, bytes) in entries {
                match bytes {
                    Some(bytes) => {
                        collections.insert(*key, *bytes).map_err(io_err)?;
                    }
                    None => {
                        collections.remove(*key).map_err(io_err)?;
                    }
                }
            }

            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            let current = meta
                .get(REVISION)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta.insert(REVISION, current.saturating_add(1))
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

// =============================================================================
// RECORDSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl RecordStore for RedbStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ParlorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(COLLECTIONS).map_err(io_err)?;
        Ok(table
            .get(key)
            .map_err(io_err)?
            .map(|data| data.value().to_vec()))
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), ParlorError> {
        self.commit(&[(key, Some(bytes))])
    }

    fn write_batch(&mut self, entries: &[(&str, Vec<u8>)]) -> Result<(), ParlorError> {
        let entries: Vec<(&str, Option<&[u8]>)> = entries
            .iter()
            .map(|(key, bytes)| (*key, Some(bytes.as_slice())))
            .collect();
        self.commit(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<(), ParlorError> {
        self.commit(&[(key, None)])
    }

    fn keys(&self) -> Result<Vec<String>, ParlorError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(COLLECTIONS).map_err(io_err)?;

        let mut keys = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

// =============================================================================
// TESTS
// =============================================================================
