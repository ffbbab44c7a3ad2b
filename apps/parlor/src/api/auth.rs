//! # Authentication Module
//!
//! Optional bearer-key gate in front of the Parlor HTTP API.
//!
//! `PARLOR_API_KEY` is read once when the router is built. When it is set,
//! every request except `GET /health` must carry
//!
//! ```text
//! Authorization: Bearer <key>
//! ```
//!
//! This gate protects the server as a whole. Which user is acting is named
//! in each request body and checked by the engines.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Paths reachable without a key.
const OPEN_PATHS: [&str; 1] = ["/health"];

/// The configured server key.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// The key from `PARLOR_API_KEY`, or `None` when unset or empty.
pub fn get_api_key_from_env() -> Option<ApiKey> {
    std::env::var("PARLOR_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(ApiKey::new)
}

/// Compare two keys in time independent of where they differ.
///
/// Both sides are zero-padded to a common length first, so the comparison
/// also does not stop early on a length mismatch.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let width = provided.len().max(expected.len());
    let mut left = vec![0u8; width];
    let mut right = vec![0u8; width];
    left[..provided.len()].copy_from_slice(provided);
    right[..expected.len()].copy_from_slice(expected);

    let same: bool = left.ct_eq(&right).into();
    same && provided.len() == expected.len()
}

/// Reject requests that do not present the configured key.
pub async fn api_key_auth_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if OPEN_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match presented {
        Some(candidate) if keys_match(candidate.as_bytes(), key.0.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!(event = "auth_failure", reason = "invalid_api_key", "Rejected API key");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_comparison() {
        assert!(keys_match(b"secret", b"secret"));
        assert!(!keys_match(b"secret", b"secreT"));
        assert!(!keys_match(b"secret", b"secret-but-longer"));
        assert!(!keys_match(b"", b"secret"));
    }

    #[test]
    fn debug_hides_the_key() {
        assert_eq!(format!("{:?}", ApiKey::new("hunter2")), "ApiKey(***)");
    }
}
