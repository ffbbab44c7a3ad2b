//! # Parlor HTTP API Module
//!
//! JSON-over-HTTP facade for the engines, built on axum.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/health` | liveness |
//! | GET | `/status` | record count per collection |
//! | POST | `/auth/register`, `/auth/login`, `/auth/logout` | identity |
//! | GET | `/session` | current-session user |
//! | GET | `/users`, `/users/{id}` | user lookup |
//! | POST | `/users/{id}/profile` | profile edit |
//! | GET | `/users/{id}/followers`, `/users/{id}/following`, `/users/{id}/posts` | per-user views |
//! | GET | `/discover?viewer=&q=` | user search |
//! | GET, POST | `/follow` | follow lookup / toggle |
//! | GET, POST | `/posts` | feed / create |
//! | POST | `/posts/{id}/like`, `/posts/{id}/comments`, `/posts/{id}/view` | post activity |
//! | GET, POST | `/videos` | catalogue / publish |
//! | GET, POST | `/videos/{id}/bookmark` | bookmark lookup / toggle |
//! | GET | `/conversations?user=&q=` | conversation list or search |
//! | GET, POST | `/messages` | thread / send |
//! | POST | `/presence` | open or close a conversation |
//! | GET | `/notifications?user=` | notifications + unread count |
//! | POST | `/notifications/read` | mark all read |
//! | POST | `/alerts` | direct alert |
//! | GET | `/alerts/{id}` | drain queued alerts |
//! | POST | `/export` | base64 snapshot |
//! | GET | `/hash` | BLAKE3 of the snapshot |
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `PARLOR_CORS_ORIGINS`: comma-separated origins, or `*` for all (default: localhost only)
//! - `PARLOR_RATE_LIMIT`: requests per second (default: 100, 0 to disable)
//! - `PARLOR_API_KEY`: if set, requires Bearer token authentication

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{ApiKey, get_api_key_from_env};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use middleware::{DEFAULT_RATE_LIMIT, create_rate_limiter, get_rate_limit_from_env};
pub use types::*;

use crate::config::ParlorConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use parlor_core::{AlertLog, Network, ParlorError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub network: Arc<RwLock<Network>>,
    /// Alerts raised by the engines, held until the recipient drains them.
    pub alerts: Arc<AlertLog>,
    /// Await the simulated sign-up and login latency.
    pub simulate_latency: bool,
}

impl AppState {
    /// Wrap `network`, routing its alerts into a fresh queue. No latency.
    #[must_use]
    pub fn new(network: Network) -> Self {
        let alerts = Arc::new(AlertLog::new());
        Self {
            network: Arc::new(RwLock::new(network.with_alerts(alerts.clone()))),
            alerts,
            simulate_latency: false,
        }
    }

    /// Wrap `network` with the moderator, alert permission and latency
    /// settings from `config`.
    #[must_use]
    pub fn from_config(network: Network, config: &ParlorConfig) -> Self {
        let network = network.with_moderator(config.moderator());
        let mut state = if config.alerts.enabled {
            Self::new(network)
        } else {
            Self {
                network: Arc::new(RwLock::new(network)),
                alerts: Arc::new(AlertLog::new()),
                simulate_latency: false,
            }
        };
        state.simulate_latency = config.server.simulate_latency;
        state
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn allowed_methods() -> [Method; 3] {
    [Method::GET, Method::POST, Method::OPTIONS]
}

/// CORS policy from `PARLOR_CORS_ORIGINS`.
///
/// `*` allows every origin; a comma list allows exactly those; unset or an
/// all-invalid list falls back to localhost only.
fn build_cors_layer() -> CorsLayer {
    let configured = std::env::var("PARLOR_CORS_ORIGINS").ok();

    match configured.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (PARLOR_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("CORS: ignoring invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if origins.is_empty() {
                tracing::warn!("CORS: no valid origins configured, using localhost only");
                build_localhost_cors()
            } else {
                tracing::info!(count = origins.len(), "CORS: allowing configured origins");
                CorsLayer::new()
                    .allow_origin(origins)
                    .allow_methods(allowed_methods())
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = ["localhost", "127.0.0.1"]
        .iter()
        .flat_map(|host| [3000, 8080].map(|port| format!("http://{host}:{port}")))
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(allowed_methods())
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        // Identity
        .route("/auth/register", post(handlers::register_handler))
        .route("/auth/login", post(handlers::login_handler))
        .route("/auth/logout", post(handlers::logout_handler))
        .route("/session", get(handlers::session_handler))
        .route("/users", get(handlers::users_handler))
        .route("/users/{id}", get(handlers::user_handler))
        .route("/users/{id}/profile", post(handlers::profile_handler))
        // Social graph
        .route("/users/{id}/followers", get(handlers::followers_handler))
        .route("/users/{id}/following", get(handlers::following_handler))
        .route("/discover", get(handlers::discover_handler))
        .route(
            "/follow",
            get(handlers::is_following_handler).post(handlers::follow_handler),
        )
        // Content
        .route("/users/{id}/posts", get(handlers::user_posts_handler))
        .route(
            "/posts",
            get(handlers::list_posts_handler).post(handlers::create_post_handler),
        )
        .route("/posts/{id}/like", post(handlers::like_handler))
        .route("/posts/{id}/comments", post(handlers::comment_handler))
        .route("/posts/{id}/view", post(handlers::view_handler))
        .route(
            "/videos",
            get(handlers::list_videos_handler).post(handlers::create_video_handler),
        )
        .route(
            "/videos/{id}/bookmark",
            get(handlers::is_bookmarked_handler).post(handlers::bookmark_handler),
        )
        // Conversations
        .route("/conversations", get(handlers::conversations_handler))
        .route(
            "/messages",
            get(handlers::messages_handler).post(handlers::send_message_handler),
        )
        .route("/presence", post(handlers::presence_handler))
        // Notifications
        .route("/notifications", get(handlers::notifications_handler))
        .route("/notifications/read", post(handlers::mark_read_handler))
        .route("/alerts", post(handlers::direct_alert_handler))
        .route("/alerts/{id}", get(handlers::drain_alerts_handler))
        // Maintenance
        .route("/export", post(handlers::export_handler))
        .route("/hash", get(handlers::hash_handler))
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate
/// limiting (if enabled), authentication (if configured).
pub fn create_router(state: AppState) -> Router {
    let mut router = routes();

    match get_api_key_from_env() {
        Some(key) => {
            tracing::info!("API key authentication enabled");
            router = router.layer(axum_middleware::from_fn_with_state(
                key,
                auth::api_key_auth_middleware,
            ));
        }
        None => tracing::warn!(
            "API key authentication DISABLED - set PARLOR_API_KEY to require a bearer key"
        ),
    }

    let rate_limit = get_rate_limit_from_env();
    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind `addr` and serve until the process is stopped.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), ParlorError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ParlorError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Parlor HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| ParlorError::IoError(format!("Server error: {}", e)))
}
