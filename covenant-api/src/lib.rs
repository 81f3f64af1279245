//! Covenant API - REST layer and coordination core
//!
//! Exposes the contract registry over HTTP (Axum) and hosts the write
//! paths: the publish coordinator, the proposal lifecycle, impact
//! analysis, the audit recorder and the webhook notifier. Everything is
//! written against the `covenant-storage` abstraction, so the same code
//! runs on the in-memory store (tests, single node) and PostgreSQL.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{authenticate, AuthContext, API_KEY_HEADER};
pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{
    auth_middleware, rate_limit_middleware, request_context_middleware, RateLimitKey,
    RateLimitState,
};
pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
