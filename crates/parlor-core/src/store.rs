//! # Record Store
//!
//! The keyed-collection persistence boundary every engine depends on.
//!
//! A store maps a collection key (see `primitives`) to the encoded bytes of
//! the whole collection. Engines load a collection, compute the new value and
//! save it back as one unit. The typed helpers below add the decode policy:
//! bytes that cannot be decoded are treated as an empty collection, so a
//! corrupt collection heals on the next write at the cost of its contents.

use crate::ParlorError;
use crate::formats::{decode_records, encode_records};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

// =============================================================================
// RECORDSTORE TRAIT
// =============================================================================

/// Durable keyed-collection storage.
///
/// All operations return `Result<T, ParlorError>` so in-memory and
/// persistent backends are used uniformly. Each call is atomic on its own;
/// `write_batch` makes several keys change together.
pub trait RecordStore {
    /// Read the raw bytes stored under `key`.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ParlorError>;

    /// Replace the bytes stored under `key`.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), ParlorError>;

    /// Replace several keys in one atomic unit.
    fn write_batch(&mut self, entries: &[(&str, Vec<u8>)]) -> Result<(), ParlorError>;

    /// Delete `key`. Deleting an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), ParlorError>;

    /// All keys currently present, in sorted order.
    fn keys(&self) -> Result<Vec<String>, ParlorError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// A volatile store backed by a `BTreeMap`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ParlorError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), ParlorError> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn write_batch(&mut self, entries: &[(&str, Vec<u8>)]) -> Result<(), ParlorError> {
        for (key, bytes) in entries {
            self.entries.insert((*key).to_string(), bytes.clone());
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ParlorError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, ParlorError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

// =============================================================================
// TYPED COLLECTION HELPERS
// =============================================================================

/// Load every record of a collection.
///
/// A missing key is an empty collection. Undecodable bytes are logged and
/// also yield an empty collection. Backend I/O failures are propagated.
pub fn load_collection<T, S>(store: &S, key: &str) -> Result<Vec<T>, ParlorError>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    let Some(bytes) = store.read(key)? else {
        return Ok(Vec::new());
    };
    match decode_records(&bytes) {
        Ok(records) => Ok(records),
        Err(e) => {
            tracing::warn!(
                collection = key,
                error = %e,
                "discarding undecodable collection"
            );
            Ok(Vec::new())
        }
    }
}

/// Encode a collection without writing it, for use in `write_batch`.
pub fn encode_collection<T: Serialize>(records: &[T]) -> Result<Vec<u8>, ParlorError> {
    encode_records(records)
}

/// Replace a whole collection.
pub fn save_collection<T, S>(store: &mut S, key: &str, records: &[T]) -> Result<(), ParlorError>
where
    T: Serialize,
    S: RecordStore + ?Sized,
{
    let bytes = encode_records(records)?;
    store.write(key, &bytes)
}

/// Load a single-record key such as the current-session marker.
///
/// Undecodable bytes are logged and read as absent.
pub fn load_record<T, S>(store: &S, key: &str) -> Result<Option<T>, ParlorError>
where
    T: DeserializeOwned,
    S: RecordStore + ?Sized,
{
    let Some(bytes) = store.read(key)? else {
        return Ok(None);
    };
    match decode_records(&bytes) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable record");
            Ok(None)
        }
    }
}

/// Store a single record under `key`.
pub fn save_record<T, S>(store: &mut S, key: &str, record: &T) -> Result<(), ParlorError>
where
    T: Serialize,
    S: RecordStore + ?Sized,
{
    let bytes = encode_records(record)?;
    store.write(key, &bytes)
}

// =============================================================================
// TESTS
// =============================================================================
