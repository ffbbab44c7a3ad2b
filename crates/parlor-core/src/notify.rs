//! # Notification Engine
//!
//! Generates, stores and suppresses cross-user activity alerts.
//!
//! Two paths reach a recipient:
//! - `notify`: a stored `Notification` (like, comment, follow) plus an
//!   immediate platform alert when the recipient's alert surface permits it.
//! - `send_direct_alert`: an alert only, used for chat delivery. It is
//!   suppressed when the recipient already has the sender's conversation open.
//!
//! "Who is viewing what" lives in `Presence`, keyed by the viewing user. It is
//! volatile and never written to the store.

use crate::identity::Identity;
use crate::ids::{new_notification_id, now_millis};
use crate::primitives::{ALERT_TITLE, DEFAULT_ALERT_ICON, NOTIFICATIONS};
use crate::store::{RecordStore, load_collection, save_collection};
use crate::{Notification, NotificationKind, ParlorError, PostId, UserId, UserSnapshot};
use std::collections::BTreeMap;
use std::sync::Mutex;

// =============================================================================
// PRESENCE (volatile)
// =============================================================================

/// Which conversation each user currently has open.
///
/// - Keyed by the viewing user, so many users can be tracked at once
/// - Never serialized
#[derive(Debug, Clone, Default)]
pub struct Presence {
    active_peers: BTreeMap<UserId, UserId>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `viewer` opened the conversation with `peer`, or closed
    /// whatever was open when `peer` is `None`.
    pub fn set_active_peer(&mut self, viewer: &UserId, peer: Option<&UserId>) {
        match peer {
            Some(peer) => {
                self.active_peers.insert(viewer.clone(), peer.clone());
            }
            None => {
                self.active_peers.remove(viewer);
            }
        }
    }

    /// The peer whose conversation `viewer` has open.
    #[must_use]
    pub fn active_peer(&self, viewer: &UserId) -> Option<&UserId> {
        self.active_peers.get(viewer)
    }

    /// Forget every open conversation.
    pub fn clear(&mut self) {
        self.active_peers.clear();
    }
}

// =============================================================================
// ALERT SURFACE
// =============================================================================

/// A platform-level alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub icon: String,
}

/// Extra data carried by a direct alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMeta {
    /// The user whose action caused the alert.
    pub sender: Option<UserId>,
    /// Free-form alert type, e.g. `chat_message`.
    pub kind: String,
}

/// What happened to a direct alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Raised on the recipient's alert surface.
    Delivered,
    /// Withheld: the recipient has the sender's conversation open.
    Suppressed,
    /// Withheld: the recipient's surface has not granted permission.
    NotPermitted,
    /// Withheld: the recipient is not a registered user.
    UnknownRecipient,
}

/// Where platform alerts are shown.
///
/// Permission is owned by the UI layer; the engines only query it.
pub trait AlertSink: Send + Sync {
    /// Whether `recipient` has granted alert permission.
    fn permitted(&self, recipient: &UserId) -> bool;

    /// Show `alert` to `recipient`.
    fn raise(&self, recipient: &UserId, alert: Alert);
}

/// A surface that never has permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAlerts;

impl AlertSink for NoAlerts {
    fn permitted(&self, _recipient: &UserId) -> bool {
        false
    }

    fn raise(&self, _recipient: &UserId, _alert: Alert) {}
}

/// A surface that queues alerts per recipient until they are collected.
#[derive(Debug, Default)]
pub struct AlertLog {
    pending: Mutex<Vec<(UserId, Alert)>>,
}

impl AlertLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every queued alert for `recipient`, oldest first.
    pub fn drain_for(&self, recipient: &UserId) -> Vec<Alert> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let (mine, rest): (Vec<_>, Vec<_>) =
            pending.drain(..).partition(|(to, _)| to == recipient);
        *pending = rest;
        mine.into_iter().map(|(_, alert)| alert).collect()
    }

    /// Number of queued alerts across all recipients.
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for AlertLog {
    fn permitted(&self, _recipient: &UserId) -> bool {
        true
    }

    fn raise(&self, recipient: &UserId, alert: Alert) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((recipient.clone(), alert));
    }
}

// =============================================================================
// NOTIFIER
// =============================================================================

/// Sort newest first; among equal timestamps the later-stored record wins.
fn newest_first(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.reverse();
    notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    notifications
}

/// The Notifier stores and surfaces activity alerts.
pub struct Notifier;

impl Notifier {
    /// Record a `kind` notification from `actor` to `recipient`.
    ///
    /// Returns `None` without touching the store when the recipient is the
    /// actor: nobody is notified about their own activity.
    pub fn notify<S: RecordStore + ?Sized>(
        store: &mut S,
        alerts: &dyn AlertSink,
        recipient: &UserId,
        kind: NotificationKind,
        actor: &UserSnapshot,
        post: Option<&PostId>,
    ) -> Result<Option<Notification>, ParlorError> {
        if recipient == &actor.id {
            return Ok(None);
        }

        let now = now_millis();
        let notification = Notification {
            id: new_notification_id(now),
            recipient: recipient.clone(),
            actor: actor.id.clone(),
            actor_name: actor.name.clone(),
            actor_avatar: actor.avatar.clone(),
            kind,
            post: post.cloned(),
            timestamp: now,
            read: false,
        };

        let mut all: Vec<Notification> = load_collection(store, NOTIFICATIONS)?;
        all.push(notification.clone());
        save_collection(store, NOTIFICATIONS, &all)?;

        tracing::debug!(
            recipient = %recipient,
            actor = %actor.id,
            kind = %kind,
            "notification stored"
        );

        if alerts.permitted(recipient) {
            alerts.raise(
                recipient,
                Alert {
                    title: ALERT_TITLE.to_string(),
                    body: format!("{} {}", actor.name, kind.phrase()),
                    icon: actor.avatar.clone(),
                },
            );
        }

        Ok(Some(notification))
    }

    /// Raise an alert directly, without storing a notification.
    ///
    /// Suppressed when `meta.sender` is the peer whose conversation the
    /// recipient currently has open.
    pub fn send_direct_alert<S: RecordStore + ?Sized>(
        store: &S,
        presence: &Presence,
        alerts: &dyn AlertSink,
        recipient: &UserId,
        title: &str,
        body: &str,
        icon: Option<&str>,
        meta: &AlertMeta,
    ) -> Result<AlertOutcome, ParlorError> {
        if Identity::find_user(store, recipient)?.is_none() {
            return Ok(AlertOutcome::UnknownRecipient);
        }

        if let Some(sender) = &meta.sender {
            if presence.active_peer(recipient) == Some(sender) {
                tracing::debug!(
                    recipient = %recipient,
                    sender = %sender,
                    kind = %meta.kind,
                    "alert suppressed: conversation already open"
                );
                return Ok(AlertOutcome::Suppressed);
            }
        }

        if !alerts.permitted(recipient) {
            return Ok(AlertOutcome::NotPermitted);
        }

        alerts.raise(
            recipient,
            Alert {
                title: title.to_string(),
                body: body.to_string(),
                icon: icon.unwrap_or(DEFAULT_ALERT_ICON).to_string(),
            },
        );
        Ok(AlertOutcome::Delivered)
    }

    /// All notifications addressed to `user`, newest first.
    pub fn list_for<S: RecordStore + ?Sized>(
        store: &S,
        user: &UserId,
    ) -> Result<Vec<Notification>, ParlorError> {
        let all: Vec<Notification> = load_collection(store, NOTIFICATIONS)?;
        Ok(newest_first(
            all.into_iter().filter(|n| &n.recipient == user).collect(),
        ))
    }

    /// Mark every notification addressed to `user` as read.
    ///
    /// Other recipients' notifications are untouched. Returns how many
    /// flipped from unread to read.
    pub fn mark_all_read<S: RecordStore + ?Sized>(
        store: &mut S,
        user: &UserId,
    ) -> Result<usize, ParlorError> {
        let mut all: Vec<Notification> = load_collection(store, NOTIFICATIONS)?;
        let mut flipped = 0;
        for n in all.iter_mut().filter(|n| &n.recipient == user && !n.read) {
            n.read = true;
            flipped += 1;
        }
        if flipped > 0 {
            save_collection(store, NOTIFICATIONS, &all)?;
        }
        Ok(flipped)
    }

    /// Number of unread notifications addressed to `user`.
    pub fn unread_count<S: RecordStore + ?Sized>(
        store: &S,
        user: &UserId,
    ) -> Result<usize, ParlorError> {
        let all: Vec<Notification> = load_collection(store, NOTIFICATIONS)?;
        Ok(all
            .iter()
            .filter(|n| &n.recipient == user && !n.read)
            .count())
    }
}

// =============================================================================
// TESTS
// =============================================================================
