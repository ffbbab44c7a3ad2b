//! # Identifier and Placeholder Generation
//!
//! Fresh identifiers are derived from wall-clock millis plus a random
//! base-36 suffix, so two records created in the same millisecond still get
//! distinct ids. Placeholder avatars and push tokens are minted here too.

use crate::primitives::{
    AVATAR_BASE_URL, AVATAR_STYLE, MESSAGE_SUFFIX_LEN, NOTIFICATION_SUFFIX_LEN,
    PUSH_TOKEN_PREFIX, PUSH_TOKEN_SUFFIX_LEN, USER_ID_PREFIX, USER_ID_SUFFIX_LEN,
};
use crate::{CommentId, MessageId, NotificationId, PostId, UserId, VideoId};
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Current wall-clock time in Unix millis.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `len` random lowercase base-36 characters.
#[must_use]
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

#[must_use]
pub fn new_user_id() -> UserId {
    UserId(format!("{USER_ID_PREFIX}{}", random_base36(USER_ID_SUFFIX_LEN)))
}

/// Placeholder push-delivery token for a new user.
#[must_use]
pub fn new_push_token() -> String {
    format!("{PUSH_TOKEN_PREFIX}{}", random_base36(PUSH_TOKEN_SUFFIX_LEN))
}

#[must_use]
pub fn new_post_id(millis: i64) -> PostId {
    PostId(format!("{millis}_{}", random_base36(4)))
}

#[must_use]
pub fn new_comment_id(millis: i64) -> CommentId {
    CommentId(format!("c{millis}_{}", random_base36(4)))
}

#[must_use]
pub fn new_message_id(millis: i64) -> MessageId {
    MessageId(format!("msg_{millis}_{}", random_base36(MESSAGE_SUFFIX_LEN)))
}

#[must_use]
pub fn new_notification_id(millis: i64) -> NotificationId {
    NotificationId(format!(
        "{millis}{}",
        random_base36(NOTIFICATION_SUFFIX_LEN)
    ))
}

#[must_use]
pub fn new_video_id(millis: i64) -> VideoId {
    VideoId(format!("vid_{millis}_{}", random_base36(4)))
}

/// Placeholder avatar URI derived from a display name.
#[must_use]
pub fn placeholder_avatar(name: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{AVATAR_BASE_URL}{encoded}{AVATAR_STYLE}")
}
