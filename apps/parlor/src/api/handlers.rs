//! # API Handlers
//!
//! One handler per engine operation. Writers take the network write lock,
//! readers the read lock; no handler holds a lock across an await point
//! other than the lock acquisition itself.

use super::AppState;
use super::error::ApiResult;
use super::types::{
    ActorRequest, AlertJson, AlertResponse, AlertsResponse, BookmarkRequest, BookmarkResponse,
    CollectionJson, CommentRequest, CommentResponse, ConversationJson, ConversationQuery,
    ConversationsResponse, CreatePostRequest, CreateVideoRequest, DirectAlertRequest,
    DiscoverQuery, ExportResponse, FollowRequest, FollowResponse, HashResponse, HealthResponse,
    LoginRequest, MarkReadResponse, MessagesResponse, NotificationsResponse, PostResponse,
    PostsResponse, PresenceRequest, ProfileRequest, RegisterRequest, SendMessageRequest,
    SendMessageResponse, SessionResponse, StatusResponse, ThreadQuery, UserJson, UserQuery,
    UserResponse, UsersResponse, VideoResponse, VideosResponse, ViewResponse, outcome_label,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::Engine;
use parlor_core::primitives::{LOGIN_LATENCY, SIGNUP_LATENCY};
use parlor_core::{
    AlertMeta, ParlorError, PostId, UserId, VideoId, compute_blake3_hash, export_snapshot,
    snapshot_checksum,
};
use std::time::Duration;

async fn simulated_latency(state: &AppState, latency: Duration) {
    if state.simulate_latency {
        tokio::time::sleep(latency).await;
    }
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn status_handler(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let network = state.network.read().await;
    let collections = network
        .collection_sizes()?
        .into_iter()
        .map(|(key, records)| CollectionJson { key, records })
        .collect();
    Ok(Json(StatusResponse {
        persistent: network.is_persistent(),
        collections,
    }))
}

// =============================================================================
// IDENTITY
// =============================================================================

pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    request.validate()?;
    simulated_latency(&state, SIGNUP_LATENCY).await;

    let user = state
        .network
        .write()
        .await
        .register(&request.name, &request.email, &request.password)?;
    tracing::info!(user = %user.id, "Registered");
    Ok((StatusCode::CREATED, Json(UserResponse { user: user.into() })))
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<UserResponse>> {
    request.validate()?;
    simulated_latency(&state, LOGIN_LATENCY).await;

    let user = state
        .network
        .write()
        .await
        .authenticate(&request.email, &request.password)?;
    tracing::info!(user = %user.id, "Signed in");
    Ok(Json(UserResponse { user: user.into() }))
}

pub async fn logout_handler(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.network.write().await.end_session()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session_handler(State(state): State<AppState>) -> ApiResult<Json<SessionResponse>> {
    let user = state.network.read().await.current_user()?;
    Ok(Json(SessionResponse {
        user: user.map(UserJson::from),
    }))
}

pub async fn users_handler(State(state): State<AppState>) -> ApiResult<Json<UsersResponse>> {
    let users = state.network.read().await.all_users()?;
    Ok(Json(UsersResponse::from_users(users)))
}

pub async fn user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .network
        .read()
        .await
        .find_user(&UserId::new(&id))?
        .ok_or_else(|| ParlorError::NotFound(format!("user {id}")))?;
    Ok(Json(UserResponse { user: user.into() }))
}

pub async fn profile_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let update = request.to_update()?;
    let user = state
        .network
        .write()
        .await
        .update_profile(&UserId::new(id), &update)?;
    Ok(Json(UserResponse { user: user.into() }))
}

// =============================================================================
// SOCIAL GRAPH
// =============================================================================

pub async fn follow_handler(
    State(state): State<AppState>,
    Json(request): Json<FollowRequest>,
) -> ApiResult<Json<FollowResponse>> {
    let mut network = state.network.write().await;
    let outcome = network.toggle_follow(&request.actor, &request.target)?;
    let following = network.is_following(&request.actor, &request.target)?;
    Ok(Json(FollowResponse::from_outcome(outcome, following)))
}

pub async fn is_following_handler(
    State(state): State<AppState>,
    Query(query): Query<FollowRequest>,
) -> ApiResult<Json<FollowResponse>> {
    let following = state
        .network
        .read()
        .await
        .is_following(&query.actor, &query.target)?;
    Ok(Json(FollowResponse {
        outcome: "unchanged".to_string(),
        following,
    }))
}

pub async fn discover_handler(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
) -> ApiResult<Json<UsersResponse>> {
    let users = state
        .network
        .read()
        .await
        .discover(&query.viewer, query.q.as_deref().unwrap_or_default())?;
    Ok(Json(UsersResponse::from_users(users)))
}

pub async fn followers_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UsersResponse>> {
    let users = state.network.read().await.followers(&UserId::new(id))?;
    Ok(Json(UsersResponse::from_users(users)))
}

pub async fn following_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UsersResponse>> {
    let users = state.network.read().await.following(&UserId::new(id))?;
    Ok(Json(UsersResponse::from_users(users)))
}

// =============================================================================
// POSTS
// =============================================================================

pub async fn list_posts_handler(State(state): State<AppState>) -> ApiResult<Json<PostsResponse>> {
    let posts = state.network.read().await.list_posts()?;
    Ok(Json(PostsResponse { posts }))
}

pub async fn user_posts_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PostsResponse>> {
    let posts = state.network.read().await.posts_by(&UserId::new(id))?;
    Ok(Json(PostsResponse { posts }))
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    request.validate()?;
    let post = state.network.write().await.create_post(
        &request.author,
        &request.text,
        request.image.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(PostResponse { post })))
}

pub async fn like_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> ApiResult<Json<PostResponse>> {
    let post = state
        .network
        .write()
        .await
        .toggle_like(&request.actor, &PostId::new(id))?;
    Ok(Json(PostResponse { post }))
}

pub async fn comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    request.validate()?;
    let comment =
        state
            .network
            .write()
            .await
            .add_comment(&request.actor, &PostId::new(id), &request.text)?;
    Ok(Json(CommentResponse { comment }))
}

pub async fn view_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ViewResponse>> {
    let views = state.network.write().await.record_view(&PostId::new(id))?;
    Ok(Json(ViewResponse { views }))
}

// =============================================================================
// VIDEOS
// =============================================================================

pub async fn list_videos_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<VideosResponse>> {
    // Seeding an empty catalogue writes, hence the write lock.
    let videos = state.network.write().await.list_videos()?;
    Ok(Json(VideosResponse { videos }))
}

pub async fn create_video_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateVideoRequest>,
) -> ApiResult<(StatusCode, Json<VideoResponse>)> {
    request.validate()?;
    let video = state.network.write().await.create_video(
        &request.author,
        &request.title,
        &request.video_ref,
        &request.thumbnail_ref,
        &request.description,
    )?;
    Ok((StatusCode::CREATED, Json(VideoResponse { video })))
}

pub async fn bookmark_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BookmarkRequest>,
) -> ApiResult<Json<BookmarkResponse>> {
    let bookmarked = state
        .network
        .write()
        .await
        .toggle_bookmark(&request.user, &VideoId::new(id))?;
    Ok(Json(BookmarkResponse { bookmarked }))
}

pub async fn is_bookmarked_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<BookmarkRequest>,
) -> ApiResult<Json<BookmarkResponse>> {
    let bookmarked = state
        .network
        .read()
        .await
        .is_bookmarked(&query.user, &VideoId::new(id))?;
    Ok(Json(BookmarkResponse { bookmarked }))
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

pub async fn conversations_handler(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Json<ConversationsResponse>> {
    let network = state.network.read().await;
    let conversations = match query.q.as_deref() {
        Some(q) => network.search_conversations(&query.user, q)?,
        None => network.list_conversations(&query.user)?,
    };
    Ok(Json(ConversationsResponse {
        conversations: conversations.into_iter().map(ConversationJson::from).collect(),
    }))
}

pub async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
) -> ApiResult<Json<MessagesResponse>> {
    let messages = state
        .network
        .read()
        .await
        .list_messages(&query.user, &query.peer)?;
    Ok(Json(MessagesResponse { messages }))
}

pub async fn send_message_handler(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<SendMessageResponse>)> {
    request.validate()?;
    let (message, outcome) = state.network.write().await.send_message(
        &request.sender,
        &request.receiver,
        &request.text,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message,
            alert: outcome_label(outcome).to_string(),
        }),
    ))
}

pub async fn presence_handler(
    State(state): State<AppState>,
    Json(request): Json<PresenceRequest>,
) -> StatusCode {
    state
        .network
        .write()
        .await
        .set_active_peer(&request.viewer, request.peer.as_ref());
    StatusCode::NO_CONTENT
}

// =============================================================================
// NOTIFICATIONS & ALERTS
// =============================================================================

pub async fn notifications_handler(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<NotificationsResponse>> {
    let network = state.network.read().await;
    let notifications = network.list_notifications(&query.user)?;
    let unread = network.unread_count(&query.user)?;
    Ok(Json(NotificationsResponse {
        notifications,
        unread,
    }))
}

pub async fn mark_read_handler(
    State(state): State<AppState>,
    Json(request): Json<UserQuery>,
) -> ApiResult<Json<MarkReadResponse>> {
    let marked = state.network.write().await.mark_all_read(&request.user)?;
    Ok(Json(MarkReadResponse { marked }))
}

pub async fn direct_alert_handler(
    State(state): State<AppState>,
    Json(request): Json<DirectAlertRequest>,
) -> ApiResult<Json<AlertResponse>> {
    request.validate()?;
    let meta = AlertMeta {
        sender: request.sender.clone(),
        kind: request.kind.clone(),
    };
    let outcome = state.network.read().await.send_direct_alert(
        &request.recipient,
        &request.title,
        &request.body,
        request.icon.as_deref(),
        &meta,
    )?;
    Ok(Json(AlertResponse {
        outcome: outcome_label(outcome).to_string(),
    }))
}

/// Hand over and forget every alert queued for one user.
pub async fn drain_alerts_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AlertsResponse> {
    let alerts = state
        .alerts
        .drain_for(&UserId::new(id))
        .into_iter()
        .map(AlertJson::from)
        .collect();
    Json(AlertsResponse { alerts })
}

// =============================================================================
// EXPORT & HASH
// =============================================================================

pub async fn export_handler(State(state): State<AppState>) -> ApiResult<Json<ExportResponse>> {
    let network = state.network.read().await;
    let data = export_snapshot(network.backend())?;
    let checksum = snapshot_checksum(network.backend())?;
    Ok(Json(ExportResponse {
        size: data.len(),
        data: base64::engine::general_purpose::STANDARD.encode(&data),
        checksum,
    }))
}

pub async fn hash_handler(State(state): State<AppState>) -> ApiResult<Json<HashResponse>> {
    let network = state.network.read().await;
    let data = export_snapshot(network.backend())?;
    let checksum = snapshot_checksum(network.backend())?;
    Ok(Json(HashResponse {
        hash: compute_blake3_hash(&data),
        algorithm: "blake3".to_string(),
        checksum,
    }))
}
