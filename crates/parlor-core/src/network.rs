//! # Network
//!
//! The façade combining a record store with its collaborators and the
//! volatile presence table.
//!
//! - Presence is session-local state: never serialized, cleared on reset
//! - Every operation takes the acting user explicitly; the persisted
//!   session marker is only consulted through `current_user`
//!
//! ## Storage Backends
//!
//! - `InMemory`: a `MemoryStore` (fast, volatile)
//! - `Persistent`: a `RedbStore` for disk-backed ACID storage

use crate::content::Content;
use crate::conversation::Conversations;
use crate::identity::Identity;
use crate::moderation::{AllowAll, Moderator};
use crate::notify::{AlertMeta, AlertOutcome, AlertSink, NoAlerts, Notifier, Presence};
use crate::social::{FollowOutcome, SocialGraph};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, RecordStore};
use crate::{
    Comment, Conversation, Message, Notification, ParlorError, Post, PostId, ProfileUpdate, User,
    UserId, Video, VideoId,
};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a Network.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl RecordStore for StorageBackend {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ParlorError> {
        match self {
            Self::InMemory(store) => store.read(key),
            Self::Persistent(store) => store.read(key),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), ParlorError> {
        match self {
            Self::InMemory(store) => store.write(key, bytes),
            Self::Persistent(store) => store.write(key, bytes),
        }
    }

    fn write_batch(&mut self, entries: &[(&str, Vec<u8>)]) -> Result<(), ParlorError> {
        match self {
            Self::InMemory(store) => store.write_batch(entries),
            Self::Persistent(store) => store.write_batch(entries),
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), ParlorError> {
        match self {
            Self::InMemory(store) => store.remove(key),
            Self::Persistent(store) => store.remove(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>, ParlorError> {
        match self {
            Self::InMemory(store) => store.keys(),
            Self::Persistent(store) => store.keys(),
        }
    }
}

// =============================================================================
// NETWORK
// =============================================================================

/// A record store plus the moderation and alert collaborators.
///
/// Does NOT implement Clone: the redb handle cannot be shared that way.
pub struct Network {
    backend: StorageBackend,
    presence: Presence,
    alerts: Arc<dyn AlertSink>,
    moderator: Arc<dyn Moderator>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("backend", &self.backend)
            .field("presence", &self.presence)
            .finish_non_exhaustive()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::with_backend(StorageBackend::default())
    }
}

impl Network {
    /// Create an empty in-memory network with no alert permission and no
    /// moderation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing backend.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            presence: Presence::new(),
            alerts: Arc::new(NoAlerts),
            moderator: Arc::new(AllowAll),
        }
    }

    /// Open or create a redb database at `path`.
    ///
    /// A corrupt session marker found on open is discarded.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, ParlorError> {
        let mut network = Self::with_backend(StorageBackend::Persistent(RedbStore::open(path)?));
        Identity::restore(&mut network.backend)?;
        Ok(network)
    }

    /// Replace the alert surface.
    #[must_use]
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Replace the moderation collaborator.
    #[must_use]
    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = moderator;
        self
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Get a mutable reference to the storage backend.
    pub fn backend_mut(&mut self) -> &mut StorageBackend {
        &mut self.backend
    }

    /// Get a reference to the presence table.
    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    pub fn register(&mut self, name: &str, email: &str, secret: &str) -> Result<User, ParlorError> {
        Identity::register(&mut self.backend, name, email, secret)
    }

    pub fn authenticate(&mut self, email: &str, secret: &str) -> Result<User, ParlorError> {
        Identity::authenticate(&mut self.backend, email, secret)
    }

    /// End the current session and close its open conversation.
    pub fn end_session(&mut self) -> Result<(), ParlorError> {
        if let Some(user) = Identity::current(&self.backend)? {
            self.presence.set_active_peer(&user.id, None);
        }
        Identity::end_session(&mut self.backend)
    }

    pub fn current_user(&self) -> Result<Option<User>, ParlorError> {
        Identity::current(&self.backend)
    }

    pub fn find_user(&self, id: &UserId) -> Result<Option<User>, ParlorError> {
        Identity::find_user(&self.backend, id)
    }

    pub fn all_users(&self) -> Result<Vec<User>, ParlorError> {
        Identity::all_users(&self.backend)
    }

    pub fn update_profile(
        &mut self,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, ParlorError> {
        Identity::update_profile(&mut self.backend, id, update)
    }

    // =========================================================================
    // SOCIAL GRAPH
    // =========================================================================

    pub fn toggle_follow(
        &mut self,
        actor: &UserId,
        target: &UserId,
    ) -> Result<FollowOutcome, ParlorError> {
        SocialGraph::toggle_follow(&mut self.backend, self.alerts.as_ref(), actor, target)
    }

    pub fn is_following(&self, actor: &UserId, target: &UserId) -> Result<bool, ParlorError> {
        SocialGraph::is_following(&self.backend, actor, target)
    }

    pub fn discover(&self, viewer: &UserId, query: &str) -> Result<Vec<User>, ParlorError> {
        SocialGraph::discover(&self.backend, viewer, query)
    }

    pub fn followers(&self, user: &UserId) -> Result<Vec<User>, ParlorError> {
        SocialGraph::followers(&self.backend, user)
    }

    pub fn following(&self, user: &UserId) -> Result<Vec<User>, ParlorError> {
        SocialGraph::following(&self.backend, user)
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    pub fn create_post(
        &mut self,
        author: &UserId,
        text: &str,
        image: Option<&str>,
    ) -> Result<Post, ParlorError> {
        Content::create_post(&mut self.backend, self.moderator.as_ref(), author, text, image)
    }

    pub fn toggle_like(&mut self, actor: &UserId, post: &PostId) -> Result<Post, ParlorError> {
        Content::toggle_like(&mut self.backend, self.alerts.as_ref(), actor, post)
    }

    pub fn add_comment(
        &mut self,
        actor: &UserId,
        post: &PostId,
        text: &str,
    ) -> Result<Option<Comment>, ParlorError> {
        Content::add_comment(&mut self.backend, self.alerts.as_ref(), actor, post, text)
    }

    pub fn record_view(&mut self, post: &PostId) -> Result<u64, ParlorError> {
        Content::record_view(&mut self.backend, post)
    }

    pub fn list_posts(&self) -> Result<Vec<Post>, ParlorError> {
        Content::list_posts(&self.backend)
    }

    pub fn posts_by(&self, author: &UserId) -> Result<Vec<Post>, ParlorError> {
        Content::posts_by(&self.backend, author)
    }

    pub fn create_video(
        &mut self,
        author: &UserId,
        title: &str,
        video_ref: &str,
        thumbnail_ref: &str,
        description: &str,
    ) -> Result<Video, ParlorError> {
        Content::create_video(
            &mut self.backend,
            author,
            title,
            video_ref,
            thumbnail_ref,
            description,
        )
    }

    pub fn list_videos(&mut self) -> Result<Vec<Video>, ParlorError> {
        Content::list_videos(&mut self.backend)
    }

    pub fn toggle_bookmark(&mut self, user: &UserId, video: &VideoId) -> Result<bool, ParlorError> {
        Content::toggle_bookmark(&mut self.backend, user, video)
    }

    pub fn is_bookmarked(&self, user: &UserId, video: &VideoId) -> Result<bool, ParlorError> {
        Content::is_bookmarked(&self.backend, user, video)
    }

    // =========================================================================
    // CONVERSATIONS
    // =========================================================================

    pub fn list_conversations(&self, me: &UserId) -> Result<Vec<Conversation>, ParlorError> {
        Conversations::list_conversations(&self.backend, me)
    }

    pub fn search_conversations(
        &self,
        me: &UserId,
        query: &str,
    ) -> Result<Vec<Conversation>, ParlorError> {
        Conversations::search_conversations(&self.backend, me, query)
    }

    pub fn list_messages(&self, me: &UserId, peer: &UserId) -> Result<Vec<Message>, ParlorError> {
        Conversations::list_messages(&self.backend, me, peer)
    }

    pub fn send_message(
        &mut self,
        sender: &UserId,
        receiver: &UserId,
        text: &str,
    ) -> Result<(Message, AlertOutcome), ParlorError> {
        Conversations::send_message(
            &mut self.backend,
            &self.presence,
            self.alerts.as_ref(),
            sender,
            receiver,
            text,
        )
    }

    /// Record which conversation `viewer` has open; `None` closes it.
    pub fn set_active_peer(&mut self, viewer: &UserId, peer: Option<&UserId>) {
        self.presence.set_active_peer(viewer, peer);
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    pub fn list_notifications(&self, user: &UserId) -> Result<Vec<Notification>, ParlorError> {
        Notifier::list_for(&self.backend, user)
    }

    pub fn mark_all_read(&mut self, user: &UserId) -> Result<usize, ParlorError> {
        Notifier::mark_all_read(&mut self.backend, user)
    }

    pub fn unread_count(&self, user: &UserId) -> Result<usize, ParlorError> {
        Notifier::unread_count(&self.backend, user)
    }

    pub fn send_direct_alert(
        &self,
        recipient: &UserId,
        title: &str,
        body: &str,
        icon: Option<&str>,
        meta: &AlertMeta,
    ) -> Result<AlertOutcome, ParlorError> {
        Notifier::send_direct_alert(
            &self.backend,
            &self.presence,
            self.alerts.as_ref(),
            recipient,
            title,
            body,
            icon,
            meta,
        )
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Forget every open conversation.
    pub fn clear_presence(&mut self) {
        self.presence.clear();
    }

    /// Number of records stored under each collection key that is present.
    pub fn collection_sizes(&self) -> Result<Vec<(String, usize)>, ParlorError> {
        crate::export::collection_sizes(&self.backend)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::AlertLog;
    use tempfile::tempdir;

    #[test]
    fn default_is_in_memory() {
        let network = Network::new();
        assert!(!network.is_persistent());
        assert!(network.current_user().expect("current").is_none());
    }

    #[test]
    fn end_session_closes_open_conversation() {
        let mut network = Network::new();
        let a = network.register("A", "a@x.io", "pw").expect("register");
        let b = network.register("B", "b@x.io", "pw").expect("register");
        network.authenticate("a@x.io", "pw").expect("login");
        network.set_active_peer(&a.id, Some(&b.id));

        network.end_session().expect("end");
        assert!(network.presence().active_peer(&a.id).is_none());
        assert!(network.current_user().expect("current").is_none());
    }

    #[test]
    fn shared_alert_log_receives_alerts() {
        let alerts = Arc::new(AlertLog::new());
        let mut network = Network::new().with_alerts(alerts.clone());
        let a = network.register("A", "a@x.io", "pw").expect("register");
        let b = network.register("B", "b@x.io", "pw").expect("register");

        network.toggle_follow(&a.id, &b.id).expect("follow");
        assert_eq!(alerts.drain_for(&b.id).len(), 1);
    }

    #[test]
    fn redb_network_survives_reopen() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("parlor.db");

        let user_id = {
            let mut network = Network::with_redb(&path).expect("open");
            let user = network.register("Jane Doe", "jane@x.io", "pw").expect("register");
            network.create_post(&user.id, "Hello network", None).expect("post");
            user.id
        };

        let network = Network::with_redb(&path).expect("reopen");
        assert!(network.is_persistent());
        assert_eq!(
            network.current_user().expect("current").map(|u| u.id),
            Some(user_id)
        );
        assert_eq!(network.list_posts().expect("posts").len(), 1);
    }

    #[test]
    fn reopen_discards_corrupt_marker() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("parlor.db");
        {
            let mut network = Network::with_redb(&path).expect("open");
            network
                .backend_mut()
                .write(crate::primitives::CURRENT_SESSION, b"junk")
                .expect("write");
        }

        let network = Network::with_redb(&path).expect("reopen");
        let marker = network
            .backend()
            .read(crate::primitives::CURRENT_SESSION)
            .expect("read");
        assert!(marker.is_none());
    }
}
