//! # Middleware Module
//!
//! Global request rate limiting for the Parlor HTTP API.
//!
//! `PARLOR_RATE_LIMIT` sets the sustained requests per second (default 100,
//! `0` disables the limiter). Rejected requests get `429` with a
//! `Retry-After` hint in whole seconds.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests per second when `PARLOR_RATE_LIMIT` is unset or invalid.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(DEFAULT_RATE_LIMIT) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

/// Shared limiter for all clients.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Build a limiter allowing `requests_per_second`, or the default for zero.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// `PARLOR_RATE_LIMIT`, falling back to [`DEFAULT_RATE_LIMIT`].
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("PARLOR_RATE_LIMIT")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT)
}

pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs().saturating_add(1);
            tracing::warn!(retry_after, "Rate limit exceeded");

            let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_admits_first_request() {
        assert!(create_rate_limiter(5).check().is_ok());
        assert!(create_rate_limiter(0).check().is_ok());
    }

    #[test]
    fn burst_is_bounded_by_quota() {
        let limiter = create_rate_limiter(2);
        let admitted = (0..10).filter(|_| limiter.check().is_ok()).count();
        assert!(admitted <= 2);
    }
}
