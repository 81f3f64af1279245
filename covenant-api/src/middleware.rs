//! Request middleware: request IDs, authentication, rate limiting.

use crate::auth::{authenticate, AuthContext, API_KEY_HEADER};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// REQUEST ID
// ============================================================================

/// Request-scoped identifier, injected into extensions and echoed in the
/// `x-request-id` response header and in error envelopes.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let response = next.run(request).await;
    let response = inject_request_id(response, &request_id).await;

    let mut response = response;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Rewrite JSON error envelopes to carry the request id. Success bodies
/// pass through untouched.
async fn inject_request_id(response: Response, request_id: &str) -> Response {
    if !response.status().is_client_error() && !response.status().is_server_error() {
        return response;
    }
    let is_json = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            if value.is_object() {
                value["request_id"] = serde_json::Value::String(request_id.to_string());
            }
            let bytes = serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec());
            let mut parts = parts;
            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(presented) = presented else {
        return ApiError::unauthorized("Missing X-API-Key header").into_response();
    };

    match authenticate(&state, &presented).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

// ============================================================================
// RATE LIMITING MIDDLEWARE
// ============================================================================

use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};
use std::num::NonZeroU32;

/// Type alias for the rate limiter we use.
type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

/// Key for rate limiting - one bucket per issued API key; statically
/// configured root keys share one bucket.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Database-issued key, keyed by its ID.
    ApiKey(Uuid),
    /// Bootstrap key from `COVENANT_ROOT_API_KEYS`.
    Root,
}

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    /// Requests allowed per key per minute.
    per_minute: u32,
    /// Per-key rate limiters - uses DashMap for lock-free concurrent access
    limiters: Arc<DashMap<RateLimitKey, Arc<DirectRateLimiter>>>,
}

impl RateLimitState {
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            limiters: Arc::new(DashMap::new()),
        }
    }

    /// Get or create a rate limiter for the given key.
    ///
    /// DashMap's entry API handles the get-or-insert atomically.
    fn get_or_create_limiter(&self, key: &RateLimitKey) -> Arc<DirectRateLimiter> {
        let limiter = self.limiters.entry(key.clone()).or_insert_with(|| {
            let quota =
                Quota::per_minute(NonZeroU32::new(self.per_minute).unwrap_or(NonZeroU32::MIN));
            Arc::new(RateLimiter::direct(quota))
        });
        limiter.clone()
    }
}

/// Error type for rate limit middleware.
pub struct RateLimitError {
    /// Seconds until the limit admits another request.
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut response = ApiError::rate_limited(self.retry_after).into_response();
        response.headers_mut().insert(
            axum::http::header::HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Rate limiting middleware.
///
/// Runs after authentication, so every request is keyed by its API key.
/// When rate limited, returns 429 with a Retry-After header.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let key = request
        .extensions()
        .get::<AuthContext>()
        .and_then(|ctx| ctx.api_key_id)
        .map(|id| RateLimitKey::ApiKey(covenant_core::EntityIdType::as_uuid(&id)))
        .unwrap_or(RateLimitKey::Root);

    let limiter = state.get_or_create_limiter(&key);
    match limiter.check() {
        Ok(_) => {
            // Request allowed - surface the configured ceiling.
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&state.per_minute.to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("120")),
            );
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))
                .as_secs()
                .max(1); // Minimum 1 second
            Err(RateLimitError { retry_after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_exhausts_burst() {
        let state = RateLimitState::new(3);
        let key = RateLimitKey::ApiKey(Uuid::new_v4());
        let limiter = state.get_or_create_limiter(&key);
        for _ in 0..3 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_rate_limit_is_per_key() {
        let state = RateLimitState::new(1);
        let a = RateLimitKey::ApiKey(Uuid::new_v4());
        let b = RateLimitKey::ApiKey(Uuid::new_v4());
        assert!(state.get_or_create_limiter(&a).check().is_ok());
        assert!(state.get_or_create_limiter(&b).check().is_ok());
        assert!(state.get_or_create_limiter(&a).check().is_err());
    }

    #[test]
    fn test_limiters_are_cached_per_key() {
        let state = RateLimitState::new(1);
        let first = state.get_or_create_limiter(&RateLimitKey::Root);
        let second = state.get_or_create_limiter(&RateLimitKey::Root);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
