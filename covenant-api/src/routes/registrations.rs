//! Consumer registration routes.

use crate::audit::{log_entity_event, Effects};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{patch, post},
    Extension, Json, Router,
};
use covenant_core::{
    ApiKeyScope, AssetId, AuditAction, EntityIdType, EntityType, Page, Registration,
    RegistrationFilter, RegistrationId, RegistrationStatus, TeamId,
};
use covenant_storage::StoreTx;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateRegistrationRequest {
    /// Defaults to the caller's team; admins may register other teams.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub consumer_team_id: Option<TeamId>,
    /// None tracks the latest compatible version.
    #[serde(default)]
    pub pinned_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct UpdateRegistrationRequest {
    #[serde(default)]
    pub status: Option<RegistrationStatus>,
    #[serde(default)]
    pub pinned_version: Option<String>,
    /// Explicitly clear the pin.
    #[serde(default)]
    pub clear_pinned_version: bool,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct RegistrationListQuery {
    #[serde(default)]
    pub status: Option<RegistrationStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// POST /api/v1/assets/{id}/registrations
#[utoipa::path(
    post,
    path = "/api/v1/assets/{id}/registrations",
    tag = "Registrations",
    params(("id" = String, Path, description = "Asset ID")),
    request_body = CreateRegistrationRequest,
    responses(
        (status = 201, description = "Registration created", body = Registration),
        (status = 404, description = "Asset not found", body = ApiError),
    )
)]
pub async fn create_registration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(asset_id): Path<AssetId>,
    Json(body): Json<CreateRegistrationRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<Registration>)> {
    auth.require_scope(ApiKeyScope::Write)?;
    let consumer = body.consumer_team_id.unwrap_or(auth.team_id);
    auth.require_team(consumer)?;

    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;
    if tx.asset_get(asset_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Asset {asset_id} not found")));
    }
    if tx.team_get(consumer).await?.is_none() {
        return Err(ApiError::not_found(format!("Team {consumer} not found")));
    }

    let registration = Registration {
        registration_id: RegistrationId::new(state.ids.new_id()),
        asset_id,
        consumer_team_id: consumer,
        pinned_version: body.pinned_version,
        status: RegistrationStatus::Active,
        registered_at: state.clock.now(),
    };
    tx.registration_insert(&registration).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Registration,
        registration.registration_id.as_uuid(),
        AuditAction::RegistrationCreated,
        auth.team_id,
        json!({
            "asset_id": asset_id,
            "consumer_team_id": consumer,
            "pinned_version": registration.pinned_version,
        }),
    )
    .await?;
    tx.commit().await?;

    Ok((axum::http::StatusCode::CREATED, Json(registration)))
}

/// GET /api/v1/assets/{id}/registrations
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}/registrations",
    tag = "Registrations",
    params(("id" = String, Path, description = "Asset ID"), RegistrationListQuery),
    responses((status = 200, description = "Registrations", body = Vec<Registration>))
)]
pub async fn list_registrations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(asset_id): Path<AssetId>,
    Query(query): Query<RegistrationListQuery>,
) -> ApiResult<Json<Vec<Registration>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let filter = RegistrationFilter {
        asset_id: Some(asset_id),
        consumer_team_id: None,
        status: query.status,
    };
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    }
    .clamped();

    let mut tx = state.store.begin().await?;
    let registrations = tx.registration_list(&filter, page).await?;
    tx.rollback().await?;
    Ok(Json(registrations))
}

/// PATCH /api/v1/registrations/{id}
#[utoipa::path(
    patch,
    path = "/api/v1/registrations/{id}",
    tag = "Registrations",
    params(("id" = String, Path, description = "Registration ID")),
    request_body = UpdateRegistrationRequest,
    responses(
        (status = 200, description = "Registration updated", body = Registration),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn update_registration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<RegistrationId>,
    Json(body): Json<UpdateRegistrationRequest>,
) -> ApiResult<Json<Registration>> {
    auth.require_scope(ApiKeyScope::Write)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    let mut registration = tx
        .registration_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Registration {id} not found")))?;
    auth.require_team(registration.consumer_team_id)?;

    if let Some(status) = body.status {
        registration.status = status;
    }
    if body.clear_pinned_version {
        registration.pinned_version = None;
    } else if let Some(pin) = body.pinned_version {
        registration.pinned_version = Some(pin);
    }
    tx.registration_update(&registration).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Registration,
        registration.registration_id.as_uuid(),
        AuditAction::RegistrationUpdated,
        auth.team_id,
        json!({
            "status": registration.status,
            "pinned_version": registration.pinned_version,
        }),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(registration))
}

/// DELETE /api/v1/registrations/{id} - deactivate.
#[utoipa::path(
    delete,
    path = "/api/v1/registrations/{id}",
    tag = "Registrations",
    params(("id" = String, Path, description = "Registration ID")),
    responses(
        (status = 200, description = "Registration deactivated", body = Registration),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn delete_registration(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<RegistrationId>,
) -> ApiResult<Json<Registration>> {
    auth.require_scope(ApiKeyScope::Write)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    let mut registration = tx
        .registration_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Registration {id} not found")))?;
    auth.require_team(registration.consumer_team_id)?;

    registration.status = RegistrationStatus::Inactive;
    tx.registration_update(&registration).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Registration,
        registration.registration_id.as_uuid(),
        AuditAction::RegistrationDeleted,
        auth.team_id,
        json!({ "asset_id": registration.asset_id }),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(registration))
}

/// Routes mounted under `/assets/{id}/registrations`.
pub fn asset_router() -> Router<AppState> {
    Router::new().route("/", post(create_registration).get(list_registrations))
}

/// Routes mounted under `/registrations`.
pub fn router() -> Router<AppState> {
    Router::new().route("/:id", patch(update_registration).delete(delete_registration))
}
