//! # Primitives
//!
//! Hardcoded runtime constants for the Parlor engines.
//!
//! These are compiled into the binary and are immutable at runtime:
//! collection keys, the stored-collection header, identifier shapes,
//! simulated latencies and input limits.

use std::time::Duration;

// =============================================================================
// COLLECTION KEYS
// =============================================================================

/// All registered users.
pub const USERS: &str = "users";

/// All posts, with their comments embedded.
pub const POSTS: &str = "posts";

/// The flat, cross-conversation message log.
pub const MESSAGES: &str = "messages";

/// All notifications for every recipient.
pub const NOTIFICATIONS: &str = "notifications";

/// All videos.
pub const VIDEOS: &str = "videos";

/// Saved videos, one entry per (user, video).
pub const BOOKMARKS: &str = "bookmarks";

/// The serialized user of the active session, or absent.
pub const CURRENT_SESSION: &str = "current-session";

/// Every key a snapshot covers, in canonical order.
pub const ALL_KEYS: [&str; 7] = [
    USERS,
    POSTS,
    MESSAGES,
    NOTIFICATIONS,
    VIDEOS,
    BOOKMARKS,
    CURRENT_SESSION,
];

// =============================================================================
// STORED FORMAT
// =============================================================================

/// Magic bytes preceding every stored collection.
pub const MAGIC_BYTES: &[u8; 4] = b"PRLR";

/// Current stored-collection format version.
///
/// Increment this when making breaking changes to a stored record type.
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes preceding a whole-store snapshot.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"PRLS";

// =============================================================================
// IDENTIFIERS & PLACEHOLDERS
// =============================================================================

/// Prefix of user identifiers.
pub const USER_ID_PREFIX: &str = "u_";

/// Random base-36 characters after the user id prefix.
pub const USER_ID_SUFFIX_LEN: usize = 9;

/// Prefix of placeholder push-delivery tokens.
pub const PUSH_TOKEN_PREFIX: &str = "fcm_";

/// Random base-36 characters after the push token prefix.
pub const PUSH_TOKEN_SUFFIX_LEN: usize = 12;

/// Random suffix length for message ids, so same-millisecond sends differ.
pub const MESSAGE_SUFFIX_LEN: usize = 5;

/// Random suffix length for notification ids.
pub const NOTIFICATION_SUFFIX_LEN: usize = 6;

/// Placeholder avatar service; the url-encoded name is appended.
pub const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/?name=";

/// Query parameters appended after the name in placeholder avatars.
pub const AVATAR_STYLE: &str = "&background=312E81&color=fff&size=256";

/// Display label given to freshly created posts, comments and videos.
pub const JUST_NOW: &str = "Just now";

/// Title of every platform alert raised for a stored notification.
pub const ALERT_TITLE: &str = "R Network Update";

/// Icon used when an alert is raised without one.
pub const DEFAULT_ALERT_ICON: &str = "/favicon.ico";

// =============================================================================
// SIMULATED LATENCY
// =============================================================================

/// Delay awaited by the async layer before completing a registration.
pub const SIGNUP_LATENCY: Duration = Duration::from_millis(1200);

/// Delay awaited by the async layer before completing a login.
pub const LOGIN_LATENCY: Duration = Duration::from_millis(800);

/// Default interval between refresh polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of post, comment and message text in bytes.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum length of a display name in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum encoded size of one stored collection (64 MB).
///
/// Checked before decoding so a corrupt length cannot drive allocation.
pub const MAX_COLLECTION_SIZE: usize = 64 * 1024 * 1024;
