//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Every mutating request names its acting user explicitly. Requests are
//! length-checked here, before anything reaches the engines.

use super::error::ApiError;
use parlor_core::{
    Alert, AlertOutcome, Comment, Conversation, FollowOutcome, Message, Notification, Post,
    ProfileUpdate, User, UserId, Video,
    primitives::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH},
};
use serde::{Deserialize, Serialize};

/// Reject `value` when it is longer than `max` bytes.
fn check_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.len() > max {
        return Err(ApiError::InvalidRequest(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> Result<(), ApiError> {
    value.map_or(Ok(()), |v| check_len(field, v, max))
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Record count of one stored collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionJson {
    pub key: String,
    pub records: usize,
}

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub persistent: bool,
    pub collections: Vec<CollectionJson>,
}

// =============================================================================
// USERS
// =============================================================================

/// The public view of a user. Credentials never leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJson {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub followers: Vec<UserId>,
    pub following: Vec<UserId>,
}

impl From<&User> for UserJson {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            city: user.city.clone(),
            followers: user.followers.clone(),
            following: user.following.clone(),
        }
    }
}

impl From<User> for UserJson {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: UserJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserJson>,
}

impl UsersResponse {
    pub fn from_users(users: Vec<User>) -> Self {
        Self {
            users: users.into_iter().map(UserJson::from).collect(),
        }
    }
}

/// The user holding the current-session marker, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: Option<UserJson>,
}

/// Sign-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("name", &self.name, MAX_NAME_LENGTH)?;
        check_len("email", &self.email, MAX_NAME_LENGTH)?;
        check_len("password", &self.password, MAX_NAME_LENGTH)
    }
}

/// Sign-in request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("email", &self.email, MAX_NAME_LENGTH)?;
        check_len("password", &self.password, MAX_NAME_LENGTH)
    }
}

/// Profile edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl ProfileRequest {
    pub fn to_update(&self) -> Result<ProfileUpdate, ApiError> {
        check_opt_len("name", self.name.as_deref(), MAX_NAME_LENGTH)?;
        check_opt_len("city", self.city.as_deref(), MAX_NAME_LENGTH)?;
        check_opt_len("bio", self.bio.as_deref(), MAX_TEXT_LENGTH)?;
        check_opt_len("avatar", self.avatar.as_deref(), MAX_TEXT_LENGTH)?;
        Ok(ProfileUpdate {
            name: self.name.clone(),
            bio: self.bio.clone(),
            city: self.city.clone(),
            avatar: self.avatar.clone(),
        })
    }
}

// =============================================================================
// SOCIAL GRAPH
// =============================================================================

/// Follow toggle request, also used as the query of `GET /follow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub actor: UserId,
    pub target: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResponse {
    /// `followed`, `unfollowed` or `unchanged`.
    pub outcome: String,
    pub following: bool,
}

impl FollowResponse {
    pub fn from_outcome(outcome: FollowOutcome, following: bool) -> Self {
        let label = match outcome {
            FollowOutcome::Followed => "followed",
            FollowOutcome::Unfollowed => "unfollowed",
            FollowOutcome::Unchanged => "unchanged",
        };
        Self {
            outcome: label.to_string(),
            following,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverQuery {
    pub viewer: UserId,
    #[serde(default)]
    pub q: Option<String>,
}

// =============================================================================
// POSTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub author: UserId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("text", &self.text, MAX_TEXT_LENGTH)?;
        check_opt_len("image", self.image.as_deref(), MAX_TEXT_LENGTH)
    }
}

/// A request whose only field is the acting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub actor: UserId,
    pub text: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("text", &self.text, MAX_TEXT_LENGTH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

/// `comment` is null when the text was blank or the post is gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewResponse {
    pub views: u64,
}

// =============================================================================
// VIDEOS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub author: UserId,
    pub title: String,
    pub video_ref: String,
    #[serde(default)]
    pub thumbnail_ref: String,
    #[serde(default)]
    pub description: String,
}

impl CreateVideoRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("title", &self.title, MAX_NAME_LENGTH)?;
        check_len("video_ref", &self.video_ref, MAX_TEXT_LENGTH)?;
        check_len("thumbnail_ref", &self.thumbnail_ref, MAX_TEXT_LENGTH)?;
        check_len("description", &self.description, MAX_TEXT_LENGTH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoResponse {
    pub video: Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideosResponse {
    pub videos: Vec<Video>,
}

/// Bookmark toggle body, also used as the query of the bookmark lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkRequest {
    pub user: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkResponse {
    pub bookmarked: bool,
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationQuery {
    pub user: UserId,
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationJson {
    pub peer: UserJson,
    pub last_message: Message,
}

impl From<Conversation> for ConversationJson {
    fn from(conversation: Conversation) -> Self {
        Self {
            peer: UserJson::from(&conversation.peer),
            last_message: conversation.last_message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadQuery {
    pub user: UserId,
    pub peer: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("text", &self.text, MAX_TEXT_LENGTH)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message: Message,
    /// What happened to the receiver's alert, see [`outcome_label`].
    pub alert: String,
}

/// Which conversation `viewer` has open. `peer: null` closes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRequest {
    pub viewer: UserId,
    #[serde(default)]
    pub peer: Option<UserId>,
}

// =============================================================================
// NOTIFICATIONS & ALERTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuery {
    pub user: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

/// Direct alert request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectAlertRequest {
    pub recipient: UserId,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sender: Option<UserId>,
    #[serde(default = "default_alert_kind")]
    pub kind: String,
}

fn default_alert_kind() -> String {
    "direct".to_string()
}

impl DirectAlertRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_len("title", &self.title, MAX_NAME_LENGTH)?;
        check_len("body", &self.body, MAX_TEXT_LENGTH)?;
        check_len("kind", &self.kind, MAX_NAME_LENGTH)?;
        check_opt_len("icon", self.icon.as_deref(), MAX_TEXT_LENGTH)
    }
}

/// Stable wire name of an alert outcome.
pub fn outcome_label(outcome: AlertOutcome) -> &'static str {
    match outcome {
        AlertOutcome::Delivered => "delivered",
        AlertOutcome::Suppressed => "suppressed",
        AlertOutcome::NotPermitted => "not_permitted",
        AlertOutcome::UnknownRecipient => "unknown_recipient",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertResponse {
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertJson {
    pub title: String,
    pub body: String,
    pub icon: String,
}

impl From<Alert> for AlertJson {
    fn from(alert: Alert) -> Self {
        Self {
            title: alert.title,
            body: alert.body,
            icon: alert.icon,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertJson>,
}

// =============================================================================
// EXPORT & HASH
// =============================================================================

/// Snapshot export response. `data` is base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub data: String,
    pub size: usize,
    pub checksum: u64,
}

/// BLAKE3 hash of the canonical snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub hash: String,
    pub algorithm: String,
    pub checksum: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_fields_are_rejected() {
        let request = RegisterRequest {
            name: "x".repeat(MAX_NAME_LENGTH + 1),
            email: "a@x.io".to_string(),
            password: "pw".to_string(),
        };
        assert!(matches!(request.validate(), Err(ApiError::InvalidRequest(_))));

        let post = CreatePostRequest {
            author: UserId::new("u_1"),
            text: "ok".to_string(),
            image: None,
        };
        assert!(post.validate().is_ok());
    }

    #[test]
    fn profile_request_keeps_absent_fields_absent() {
        let update = ProfileRequest {
            bio: Some("hi".to_string()),
            ..ProfileRequest::default()
        }
        .to_update();
        assert!(matches!(
            update,
            Ok(ProfileUpdate { name: None, bio: Some(_), city: None, avatar: None })
        ));
    }

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(outcome_label(AlertOutcome::NotPermitted), "not_permitted");
        assert_eq!(
            FollowResponse::from_outcome(FollowOutcome::Unchanged, false).outcome,
            "unchanged"
        );
    }
}
