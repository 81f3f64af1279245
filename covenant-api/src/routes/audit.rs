//! Audit query routes. The log itself is append-only; this surface is
//! read-only with keyset pagination on `(occurred_at, id)`.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use covenant_core::{
    ApiKeyScope, AuditAction, AuditCursor, AuditEvent, AuditFilter, EntityType, Timestamp,
};
use covenant_storage::StoreTx;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct AuditQueryParams {
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub action: Option<AuditAction>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub since: Option<Timestamp>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub until: Option<Timestamp>,
    /// Opaque cursor from a previous page.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    /// Pass back as `cursor` to fetch the next page; absent on the last
    /// page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// GET /api/v1/audit
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    tag = "Audit",
    params(AuditQueryParams),
    responses((status = 200, description = "Audit events, newest first", body = AuditPage))
)]
pub async fn query_audit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<AuditPage>> {
    auth.require_scope(ApiKeyScope::Read)?;

    let cursor = params
        .cursor
        .as_deref()
        .map(str::parse::<AuditCursor>)
        .transpose()
        .map_err(ApiError::validation)?;
    let limit = params.limit.unwrap_or(50).clamp(1, 100);

    let filter = AuditFilter {
        entity_type: params.entity_type,
        entity_id: params.entity_id,
        actor_id: params.actor_id,
        action: params.action,
        since: params.since,
        until: params.until,
    };

    let mut tx = state.store.begin().await?;
    let events = tx.audit_query(&filter, cursor, limit).await?;
    tx.rollback().await?;

    let next_cursor = if events.len() == limit as usize {
        events.last().map(|event| {
            AuditCursor {
                occurred_at: event.occurred_at,
                event_id: event.event_id,
            }
            .encode()
        })
    } else {
        None
    };

    Ok(Json(AuditPage {
        events,
        next_cursor,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(query_audit))
}
