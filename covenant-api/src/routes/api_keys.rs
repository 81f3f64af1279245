//! API key management routes. Admin surface.

use crate::audit::{log_entity_event, Effects};
use crate::auth::{generate_key_secret, AuthContext};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use covenant_core::{
    hash_api_key, ApiKey, ApiKeyId, ApiKeyScope, AuditAction, EntityIdType, EntityType, TeamId,
};
use covenant_storage::StoreTx;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateApiKeyRequest {
    #[schema(value_type = String, format = "uuid")]
    pub team_id: TeamId,
    pub name: String,
    pub scopes: Vec<ApiKeyScope>,
}

/// The only response that ever carries the raw secret.
#[derive(Debug, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct CreatedApiKeyResponse {
    pub api_key: ApiKey,
    /// Shown exactly once; only the digest is stored.
    pub secret: String,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct ApiKeyListQuery {
    #[param(value_type = String)]
    pub team_id: TeamId,
}

/// POST /api/v1/api-keys
#[utoipa::path(
    post,
    path = "/api/v1/api-keys",
    tag = "ApiKeys",
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created; secret shown once", body = CreatedApiKeyResponse),
        (status = 403, description = "Admin scope required", body = ApiError),
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateApiKeyRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<CreatedApiKeyResponse>)> {
    auth.require_scope(ApiKeyScope::Admin)?;
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("Key name must not be empty"));
    }
    if body.scopes.is_empty() {
        return Err(ApiError::validation("Key must carry at least one scope"));
    }

    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let secret = generate_key_secret(state.ids.as_ref());
    let api_key = ApiKey {
        api_key_id: ApiKeyId::new(state.ids.new_id()),
        team_id: body.team_id,
        name: body.name.trim().to_string(),
        key_hash: hash_api_key(&secret),
        scopes: body.scopes,
        created_at: state.clock.now(),
        last_used_at: None,
        revoked_at: None,
    };

    let mut tx = state.store.begin().await?;
    if tx.team_get(body.team_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Team {} not found", body.team_id)));
    }
    tx.api_key_insert(&api_key).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::ApiKey,
        api_key.api_key_id.as_uuid(),
        AuditAction::ApiKeyCreated,
        auth.team_id,
        json!({ "team_id": api_key.team_id, "name": api_key.name, "scopes": api_key.scopes }),
    )
    .await?;
    tx.commit().await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreatedApiKeyResponse { api_key, secret }),
    ))
}

/// GET /api/v1/api-keys?team_id=...
#[utoipa::path(
    get,
    path = "/api/v1/api-keys",
    tag = "ApiKeys",
    params(ApiKeyListQuery),
    responses((status = 200, description = "Keys for a team", body = Vec<ApiKey>))
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ApiKeyListQuery>,
) -> ApiResult<Json<Vec<ApiKey>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    auth.require_team(query.team_id)?;

    let mut tx = state.store.begin().await?;
    let keys = tx.api_key_list_for_team(query.team_id).await?;
    tx.rollback().await?;
    Ok(Json(keys))
}

/// POST /api/v1/api-keys/{id}/revoke
#[utoipa::path(
    post,
    path = "/api/v1/api-keys/{id}/revoke",
    tag = "ApiKeys",
    params(("id" = String, Path, description = "API key ID")),
    responses(
        (status = 200, description = "Key revoked", body = ApiKey),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ApiKeyId>,
) -> ApiResult<Json<ApiKey>> {
    auth.require_scope(ApiKeyScope::Admin)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    let mut key = tx
        .api_key_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API key {id} not found")))?;
    if key.revoked_at.is_none() {
        key.revoked_at = Some(state.clock.now());
        tx.api_key_update(&key).await?;
        log_entity_event(
            &mut *tx,
            &effects,
            EntityType::ApiKey,
            key.api_key_id.as_uuid(),
            AuditAction::ApiKeyRevoked,
            auth.team_id,
            json!({ "team_id": key.team_id }),
        )
        .await?;
    }
    tx.commit().await?;
    Ok(Json(key))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_api_key).get(list_api_keys))
        .route("/:id/revoke", post(revoke_api_key))
}
