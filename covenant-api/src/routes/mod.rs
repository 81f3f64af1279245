//! Route assembly.

pub mod api_keys;
pub mod assets;
pub mod audit;
pub mod contracts;
pub mod health;
pub mod proposals;
pub mod registrations;
pub mod sync;
pub mod teams;

use crate::middleware::{
    auth_middleware, rate_limit_middleware, request_context_middleware, RateLimitState,
};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

/// Build the full `/api/v1` router.
///
/// Health stays outside authentication; everything else goes through
/// auth, then per-key rate limiting. The request-context layer wraps the
/// whole stack so every response (including auth failures) carries a
/// request id.
pub fn create_api_router(state: AppState) -> Router {
    let limiter = RateLimitState::new(state.config.rate_limit_per_minute);

    let assets = assets::router()
        .nest("/:id/contracts", contracts::asset_router())
        .nest("/:id/registrations", registrations::asset_router());

    let authed = Router::new()
        .nest("/teams", teams::router())
        .nest("/assets", assets)
        .nest("/contracts", contracts::router())
        .nest("/registrations", registrations::router())
        .nest("/proposals", proposals::router())
        .nest("/api-keys", api_keys::router())
        .nest("/audit", audit::router())
        .nest("/sync", sync::router())
        .route("/compare", axum::routing::post(contracts::compare))
        .layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .route("/health", get(health::health))
        .merge(authed);

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
