//! # Persistence Format
//!
//! Binary encoding of one stored collection.
//!
//! Format: Header (5 bytes) + postcard-serialized records.
//! - 4 bytes: Magic ("PRLR")
//! - 1 byte: Version
//!
//! The size limit and header are checked before the payload is decoded.
//! Callers that must self-heal (the typed loaders in `store`) turn any error
//! returned here into an empty collection.

use crate::{ParlorError, primitives};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The header preceding every stored collection.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate magic bytes and version.
    pub fn validate(&self) -> Result<(), ParlorError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(ParlorError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(ParlorError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParlorError> {
        if bytes.len() < HEADER_LEN {
            return Err(ParlorError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a collection (or single record) to stored bytes.
pub fn encode_records<T: Serialize + ?Sized>(records: &T) -> Result<Vec<u8>, ParlorError> {
    let payload = postcard::to_stdvec(records)
        .map_err(|e| ParlorError::SerializationError(e.to_string()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&PersistenceHeader::new().to_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode stored bytes produced by [`encode_records`].
pub fn decode_records<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ParlorError> {
    if bytes.len() < HEADER_LEN {
        return Err(ParlorError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > primitives::MAX_COLLECTION_SIZE {
        return Err(ParlorError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_COLLECTION_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        ParlorError::SerializationError(format!("Failed to decode records: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, MessageId, UserId};

    fn sample() -> Vec<Message> {
        vec![Message {
            id: MessageId::new("msg_1_abcde"),
            sender: UserId::new("u_a"),
            receiver: UserId::new("u_b"),
            text: "hello".to_string(),
            timestamp: 42,
        }]
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let restored = PersistenceHeader::from_bytes(&header.to_bytes()).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn encode_is_bit_exact_after_decode() {
        let bytes1 = encode_records(&sample()).expect("encode");
        let decoded: Vec<Message> = decode_records(&bytes1).expect("decode");
        let bytes2 = encode_records(&decoded).expect("encode again");
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = encode_records(&sample()).expect("encode");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(decode_records::<Vec<Message>>(&bytes).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = encode_records(&sample()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(decode_records::<Vec<Message>>(&bytes).is_err());
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = encode_records(&sample()).expect("encode");
        let cut = &bytes[..bytes.len() - 3];
        assert!(decode_records::<Vec<Message>>(cut).is_err());
    }
}
