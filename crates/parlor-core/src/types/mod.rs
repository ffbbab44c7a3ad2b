//! # Core Type Definitions
//!
//! This module contains all record types held by the Parlor record store:
//! - Identifiers (`UserId`, `PostId`, `CommentId`, `MessageId`, `NotificationId`, `VideoId`)
//! - Persisted entities (`User`, `Post`, `Comment`, `Message`, `Notification`, `Video`, `Bookmark`)
//! - Denormalized author copies (`UserSnapshot`)
//! - Derived, never-persisted views (`Conversation`)
//! - Error types (`ParlorError`)
//!
//! ## Relationship Rules
//!
//! No entity holds a pointer to another. Every cross-entity relationship is an
//! identifier that is resolved against the store at read time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from any string-like value.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Unique identifier of a registered user (`u_` + 9 base-36 chars).
    UserId
);
string_id!(
    /// Identifier of a post, derived from its creation time in millis.
    PostId
);
string_id!(
    /// Identifier of a comment, unique within the whole store.
    CommentId
);
string_id!(
    /// Identifier of a direct message (`msg_{millis}_{suffix}`).
    MessageId
);
string_id!(
    /// Identifier of a notification (`{millis}{suffix}`).
    NotificationId
);
string_id!(
    /// Identifier of a video (`vid_{millis}`).
    VideoId
);

// =============================================================================
// USER
// =============================================================================

/// Login credential stored alongside a user record.
///
/// Stored as given; hardening the secret at rest is not handled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub email: String,
    pub secret: String,
}

/// A registered user.
///
/// Invariants maintained by the social graph engine:
/// - `id` never appears in its own `following`
/// - `b ∈ a.following` exactly when `a ∈ b.followers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Avatar image reference (URI).
    pub avatar: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    /// Follower ids in the order the follows happened; no duplicates.
    pub followers: Vec<UserId>,
    /// Followed ids in the order the follows happened; no duplicates.
    pub following: Vec<UserId>,
    pub push_token: Option<String>,
    pub credential: Credential,
}

impl User {
    /// Whether this user currently follows `target`.
    #[must_use]
    pub fn follows(&self, target: &UserId) -> bool {
        self.following.contains(target)
    }

    /// Take a denormalized copy of the public profile fields.
    #[must_use]
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            city: self.city.clone(),
        }
    }
}

/// Copy of a user's public profile embedded in another record at creation time.
///
/// Snapshots are not kept live. Readers repair them by re-resolving `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub city: Option<String>,
}

/// A partial profile edit. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub avatar: Option<String>,
}

// =============================================================================
// CONTENT
// =============================================================================

/// A comment attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserSnapshot,
    pub text: String,
    /// Display label for the creation time.
    pub time: String,
}

/// A feed post.
///
/// `likes == liked_by.len()` after every engine mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserSnapshot,
    /// Display label for the creation time.
    pub time: String,
    /// Creation time in Unix millis.
    pub timestamp: i64,
    pub content: String,
    pub image: Option<String>,
    pub likes: u64,
    pub liked_by: Vec<UserId>,
    /// Comments in arrival order.
    pub comments: Vec<Comment>,
    pub shares: u64,
    /// Impression count. Every recorded view counts.
    pub views: u64,
}

/// A video entry on the watch screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    /// External video reference.
    pub video_ref: String,
    pub thumbnail_ref: String,
    pub author: UserSnapshot,
    /// View count as a display string ("1.2M"), not a number.
    pub views: String,
    pub time: String,
    pub description: String,
}

/// A video saved by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub user: UserId,
    pub video: VideoId,
}

// =============================================================================
// MESSAGING
// =============================================================================

/// A direct message between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
    /// Creation time in Unix millis.
    pub timestamp: i64,
}

impl Message {
    /// Whether `user` is the sender or the receiver.
    #[must_use]
    pub fn involves(&self, user: &UserId) -> bool {
        &self.sender == user || &self.receiver == user
    }

    /// The participant that is not `me`, if `me` takes part at all.
    #[must_use]
    pub fn other_party(&self, me: &UserId) -> Option<&UserId> {
        if &self.sender == me {
            Some(&self.receiver)
        } else if &self.receiver == me {
            Some(&self.sender)
        } else {
            None
        }
    }
}

/// One conversation as seen by the current user.
///
/// Derived from the message log on every read and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// The other participant, resolved live.
    pub peer: User,
    pub last_message: Message,
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// The activity a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Like,
    Follow,
    Comment,
}

impl NotificationKind {
    /// The phrase that follows the actor name in an alert.
    #[must_use]
    pub const fn phrase(self) -> &'static str {
        match self {
            Self::Like => "liked your post",
            Self::Comment => "commented on your post",
            Self::Follow => "started following you",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Like => "like",
            Self::Follow => "follow",
            Self::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// A stored activity alert addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub actor: UserId,
    pub actor_name: String,
    pub actor_avatar: String,
    pub kind: NotificationKind,
    pub post: Option<PostId>,
    /// Creation time in Unix millis.
    pub timestamp: i64,
    pub read: bool,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Parlor.
///
/// The user-facing variants are expected conditions for the caller to
/// display. None of them is retried internally.
#[derive(Debug, Error)]
pub enum ParlorError {
    /// Another user already registered this email (case-insensitive).
    #[error("This email is already registered")]
    DuplicateEmail,

    /// Unknown email or wrong secret.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// A referenced user, post, video or message does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Post, comment or message text is blank.
    #[error("Content is empty")]
    EmptyContent,

    /// The moderation collaborator vetoed the text.
    #[error("Content rejected by moderation")]
    ContentRejected {
        /// Alternative phrasings offered by the moderator, possibly empty.
        suggestions: Vec<String>,
    },

    /// The acting user has no active session or no longer exists.
    #[error("No active session")]
    Unauthorized,

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred in the storage backend.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, receiver: &str) -> Message {
        Message {
            id: MessageId::new("m1"),
            sender: UserId::new(sender),
            receiver: UserId::new(receiver),
            text: "hi".to_string(),
            timestamp: 1,
        }
    }

    #[test]
    fn other_party_from_either_side() {
        let msg = message("a", "b");
        assert_eq!(msg.other_party(&UserId::new("a")), Some(&UserId::new("b")));
        assert_eq!(msg.other_party(&UserId::new("b")), Some(&UserId::new("a")));
        assert_eq!(msg.other_party(&UserId::new("c")), None);
        assert!(!msg.involves(&UserId::new("c")));
    }

    #[test]
    fn notification_phrases() {
        assert_eq!(NotificationKind::Like.phrase(), "liked your post");
        assert_eq!(NotificationKind::Comment.phrase(), "commented on your post");
        assert_eq!(NotificationKind::Follow.phrase(), "started following you");
        assert_eq!(NotificationKind::Follow.to_string(), "follow");
    }

    #[test]
    fn snapshot_drops_credentials_and_edges() {
        let user = User {
            id: UserId::new("u_1"),
            name: "Jane".to_string(),
            avatar: "a".to_string(),
            bio: Some("bio".to_string()),
            city: None,
            followers: vec![UserId::new("u_2")],
            following: Vec::new(),
            push_token: None,
            credential: Credential {
                email: "j@x.io".to_string(),
                secret: "pw".to_string(),
            },
        };
        let snap = user.snapshot();
        assert_eq!(snap.id, user.id);
        assert_eq!(snap.bio.as_deref(), Some("bio"));
    }
}
