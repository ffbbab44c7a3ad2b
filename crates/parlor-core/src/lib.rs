//! # parlor-core
//!
//! The local-first state synchronization engine for Parlor - THE LOGIC.
//!
//! This crate keeps a small social network consistent on top of a keyed
//! record store: who follows whom, posts with their likes and comments, the
//! direct message log, and the notifications raised by all of it.
//!
//! ## Layout
//!
//! - `types` → records and `ParlorError`
//! - `formats` / `store` / `storage` → the record store and its backends
//! - `identity`, `social`, `content`, `conversation`, `notify` → the engines
//! - `network` → the façade binding a store to its collaborators
//!
//! ## Architectural Constraints
//!
//! - Every engine call is one read-modify-write of whole collections
//! - Derived views (conversations, feeds) are recomputed on every read
//! - Corrupt stored collections read as empty instead of failing
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod content;
pub mod conversation;
pub mod export;
pub mod formats;
pub mod identity;
pub mod ids;
pub mod moderation;
pub mod network;
pub mod notify;
pub mod primitives;
pub mod social;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Bookmark, Comment, CommentId, Conversation, Credential, Message, MessageId, Notification,
    NotificationId, NotificationKind, ParlorError, Post, PostId, ProfileUpdate, User, UserId,
    UserSnapshot, Video, VideoId,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use content::Content;
pub use conversation::{CHAT_ALERT_KIND, Conversations};
pub use identity::Identity;
pub use moderation::{AllowAll, BlocklistModerator, Moderator, Verdict};
pub use notify::{
    Alert, AlertLog, AlertMeta, AlertOutcome, AlertSink, NoAlerts, Notifier, Presence,
};
pub use social::{FollowOutcome, SocialGraph};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use export::{
    Snapshot, SnapshotHeader, collection_sizes, decode_snapshot, export_snapshot,
    import_snapshot, snapshot_checksum, verify_snapshot,
};
#[cfg(feature = "crypto-hash")]
pub use export::{compute_blake3_hash, snapshot_crypto_hash};
pub use formats::{PersistenceHeader, decode_records, encode_records};
pub use network::{Network, StorageBackend};
pub use storage::RedbStore;
pub use store::{MemoryStore, RecordStore};
