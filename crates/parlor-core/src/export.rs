//! # Snapshot Export Module
//!
//! > **The redb compromise:**
//! > - Runtime: the persistent backend is `redb`, whose files are not
//! >   bit-identical across runs.
//! > - Portability: `export_snapshot()` serializes every collection key to a
//! >   bit-exact `postcard` stream. Two stores holding the same records
//! >   export the same bytes.
//!
//! Format:
//! ```text
//! [header_len: u32 LE] [SnapshotHeader (postcard)] [Snapshot (postcard)]
//! ```
//!
//! Entries hold each key's stored bytes unchanged, so collections keep their
//! own `PRLR` header inside the snapshot.

use crate::primitives::{
    ALL_KEYS, BOOKMARKS, CURRENT_SESSION, MESSAGES, NOTIFICATIONS, POSTS, SNAPSHOT_MAGIC, USERS,
    VIDEOS,
};
use crate::store::{RecordStore, load_collection, load_record};
use crate::{Bookmark, Message, Notification, ParlorError, Post, User, Video};
use serde::{Deserialize, Serialize};

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Length prefix size in bytes.
const LEN_PREFIX: usize = 4;

/// Header for snapshot files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
    /// Number of keys in the snapshot.
    pub entry_count: u64,
    /// FNV-1a checksum of the entries.
    pub checksum: u64,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new(entry_count: u64, checksum: u64) -> Self {
        Self {
            magic: *SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            entry_count,
            checksum,
        }
    }

    /// Validate magic and version.
    ///
    /// Error messages stay generic so they do not describe the format.
    pub fn validate(&self) -> Result<(), ParlorError> {
        if &self.magic != SNAPSHOT_MAGIC {
            return Err(ParlorError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(ParlorError::SerializationError(
                "Unsupported format version".to_string(),
            ));
        }
        Ok(())
    }
}

/// The stored bytes of one collection key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Every present collection key, in `ALL_KEYS` order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Capture the current contents of `store`.
    pub fn capture<S: RecordStore + ?Sized>(store: &S) -> Result<Self, ParlorError> {
        let mut entries = Vec::new();
        for key in ALL_KEYS {
            if let Some(bytes) = store.read(key)? {
                entries.push(SnapshotEntry {
                    key: key.to_string(),
                    bytes,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Deterministic FNV-1a checksum over keys, lengths and bytes.
    ///
    /// Detects accidental corruption only. It is not collision-resistant;
    /// use the `crypto-hash` feature for BLAKE3.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        let mut feed = |bytes: &[u8]| {
            for byte in bytes {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(PRIME);
            }
        };
        for entry in &self.entries {
            feed(entry.key.as_bytes());
            feed(&(entry.bytes.len() as u64).to_le_bytes());
            feed(&entry.bytes);
        }
        hash
    }
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export every collection key of `store`.
pub fn export_snapshot<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<u8>, ParlorError> {
    let snapshot = Snapshot::capture(store)?;
    let header = SnapshotHeader::new(snapshot.entries.len() as u64, snapshot.checksum());

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| ParlorError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(&snapshot)
        .map_err(|e| ParlorError::SerializationError(format!("Data: {}", e)))?;

    let mut result = Vec::with_capacity(LEN_PREFIX + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Decode and verify a snapshot without touching any store.
pub fn decode_snapshot(data: &[u8]) -> Result<Snapshot, ParlorError> {
    let Some(prefix) = data.get(..LEN_PREFIX) else {
        return Err(ParlorError::SerializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    let Some(header_bytes) = data.get(LEN_PREFIX..LEN_PREFIX.saturating_add(header_len)) else {
        return Err(ParlorError::SerializationError(
            "Data too short for header".to_string(),
        ));
    };

    let header: SnapshotHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| ParlorError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    // At most one entry per known key; checked before decoding the payload.
    if header.entry_count > ALL_KEYS.len() as u64 {
        return Err(ParlorError::SerializationError(format!(
            "Entry count {} exceeds maximum allowed {}",
            header.entry_count,
            ALL_KEYS.len()
        )));
    }

    let snapshot: Snapshot = postcard::from_bytes(&data[LEN_PREFIX + header_len..])
        .map_err(|e| ParlorError::SerializationError(format!("Data: {}", e)))?;

    let computed = snapshot.checksum();
    if computed != header.checksum {
        return Err(ParlorError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if snapshot.entries.len() as u64 != header.entry_count {
        return Err(ParlorError::SerializationError(
            "Entry count mismatch".to_string(),
        ));
    }
    if let Some(unknown) = snapshot
        .entries
        .iter()
        .find(|e| !ALL_KEYS.contains(&e.key.as_str()))
    {
        return Err(ParlorError::SerializationError(format!(
            "Unknown collection key: {}",
            unknown.key
        )));
    }
    Ok(snapshot)
}

/// Replace the contents of `store` with a snapshot. Returns the number of
/// keys written.
///
/// Keys absent from the snapshot are removed, so the store ends up equal to
/// the one that was exported.
pub fn import_snapshot<S: RecordStore + ?Sized>(
    store: &mut S,
    data: &[u8],
) -> Result<usize, ParlorError> {
    let snapshot = decode_snapshot(data)?;

    let batch: Vec<(&str, Vec<u8>)> = snapshot
        .entries
        .iter()
        .map(|e| (e.key.as_str(), e.bytes.clone()))
        .collect();
    store.write_batch(&batch)?;

    for key in ALL_KEYS {
        if !snapshot.entries.iter().any(|e| e.key == key) {
            store.remove(key)?;
        }
    }

    tracing::info!(keys = batch.len(), "snapshot imported");
    Ok(batch.len())
}

/// Whether `store` currently holds exactly what `data` describes.
pub fn verify_snapshot<S: RecordStore + ?Sized>(
    store: &S,
    data: &[u8],
) -> Result<bool, ParlorError> {
    let imported = decode_snapshot(data)?;
    Ok(Snapshot::capture(store)? == imported)
}

/// The FNV-1a checksum of the current contents of `store`.
pub fn snapshot_checksum<S: RecordStore + ?Sized>(store: &S) -> Result<u64, ParlorError> {
    Ok(Snapshot::capture(store)?.checksum())
}

/// Record count per present collection key, in `ALL_KEYS` order.
///
/// Undecodable collections count as empty, matching how engines read them.
pub fn collection_sizes<S: RecordStore + ?Sized>(
    store: &S,
) -> Result<Vec<(String, usize)>, ParlorError> {
    let mut sizes = Vec::new();
    for key in ALL_KEYS {
        if store.read(key)?.is_none() {
            continue;
        }
        let count = match key {
            USERS => load_collection::<User, _>(store, key)?.len(),
            POSTS => load_collection::<Post, _>(store, key)?.len(),
            MESSAGES => load_collection::<Message, _>(store, key)?.len(),
            NOTIFICATIONS => load_collection::<Notification, _>(store, key)?.len(),
            VIDEOS => load_collection::<Video, _>(store, key)?.len(),
            BOOKMARKS => load_collection::<Bookmark, _>(store, key)?.len(),
            CURRENT_SESSION => usize::from(load_record::<User, _>(store, key)?.is_some()),
            _ => 0,
        };
        sizes.push((key.to_string(), count));
    }
    Ok(sizes)
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// BLAKE3 hash of the exported snapshot, hex-encoded.
///
/// Collision-resistant counterpart of [`snapshot_checksum`].
#[cfg(feature = "crypto-hash")]
pub fn snapshot_crypto_hash<S: RecordStore + ?Sized>(store: &S) -> Result<String, ParlorError> {
    Ok(compute_blake3_hash(&export_snapshot(store)?))
}

/// BLAKE3 hash of raw bytes, hex-encoded.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::store::MemoryStore;

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        Identity::register(&mut store, "Jane Doe", "jane@x.io", "pw").unwrap();
        Identity::register(&mut store, "Bob", "bob@x.io", "pw").unwrap();
        store
    }

    #[test]
    fn export_import_roundtrip() {
        let source = populated();
        let data = export_snapshot(&source).unwrap();

        let mut target = MemoryStore::new();
        let written = import_snapshot(&mut target, &data).unwrap();

        assert_eq!(written, 2);
        assert_eq!(target, source);
        assert!(verify_snapshot(&target, &data).unwrap());
    }

    #[test]
    fn import_removes_keys_missing_from_snapshot() {
        let data = export_snapshot(&MemoryStore::new()).unwrap();
        let mut target = populated();

        assert_eq!(import_snapshot(&mut target, &data).unwrap(), 0);
        assert!(target.is_empty());
    }

    #[test]
    fn export_is_deterministic() {
        let store = populated();
        assert_eq!(export_snapshot(&store).unwrap(), export_snapshot(&store).unwrap());
        assert_eq!(
            snapshot_checksum(&store).unwrap(),
            snapshot_checksum(&store.clone()).unwrap()
        );
    }

    #[test]
    fn checksum_changes_with_data() {
        let mut store = populated();
        let before = snapshot_checksum(&store).unwrap();
        Identity::end_session(&mut store).unwrap();
        assert_ne!(before, snapshot_checksum(&store).unwrap());
    }

    #[test]
    fn empty_data_rejected() {
        assert!(decode_snapshot(&[]).is_err());
        assert!(decode_snapshot(&[1, 2]).is_err());
    }

    #[test]
    fn header_length_beyond_data_rejected() {
        let data = 1000u32.to_le_bytes();
        assert!(decode_snapshot(&data).is_err());
    }

    #[test]
    fn corrupted_payload_rejected() {
        let mut data = export_snapshot(&populated()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;
        assert!(decode_snapshot(&data).is_err());
    }

    #[test]
    fn invalid_magic_rejected() {
        let header = SnapshotHeader {
            magic: *b"NOPE",
            ..SnapshotHeader::new(0, 0)
        };
        assert!(header.validate().is_err());
        let header = SnapshotHeader {
            version: 99,
            ..SnapshotHeader::new(0, 0)
        };
        assert!(header.validate().is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let snapshot = Snapshot {
            entries: vec![SnapshotEntry {
                key: "stories".to_string(),
                bytes: vec![1],
            }],
        };
        let header = SnapshotHeader::new(1, snapshot.checksum());
        let header_bytes = postcard::to_allocvec(&header).unwrap();
        let mut data = (header_bytes.len() as u32).to_le_bytes().to_vec();
        data.extend_from_slice(&header_bytes);
        data.extend_from_slice(&postcard::to_allocvec(&snapshot).unwrap());

        let err = decode_snapshot(&data).unwrap_err();
        assert!(err.to_string().contains("stories"));
    }

    #[test]
    fn sizes_count_records() {
        let store = populated();
        let sizes = collection_sizes(&store).unwrap();
        assert_eq!(
            sizes,
            vec![
                (USERS.to_string(), 2),
                (CURRENT_SESSION.to_string(), 1)
            ]
        );
    }

    #[cfg(feature = "crypto-hash")]
    #[test]
    fn blake3_hash_is_stable() {
        let store = populated();
        let a = snapshot_crypto_hash(&store).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, snapshot_crypto_hash(&store).unwrap());
    }
}
