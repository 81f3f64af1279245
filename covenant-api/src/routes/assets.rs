//! Asset routes: CRUD, lineage edges and impact analysis.

use crate::audit::{log_entity_event, Effects};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::services::{analyze_impact, ImpactReport};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use covenant_core::{
    ApiKeyScope, Asset, AssetDependency, AssetFilter, AssetId, AuditAction, DependencyId,
    DependencyKind, EntityIdType, EntityType, Page, ResourceType, TeamId,
};
use covenant_storage::StoreTx;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateAssetRequest {
    /// Dotted fully-qualified name, e.g. `warehouse.analytics.orders`.
    pub fqn: String,
    /// Defaults to the caller's team. Admins may create for any team.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_team_id: Option<TeamId>,
    #[serde(default)]
    pub resource_type: ResourceType,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct AssetListQuery {
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub owner_team_id: Option<TeamId>,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub fqn_contains: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct AddDependencyRequest {
    /// The asset that consumes this one.
    #[schema(value_type = String, format = "uuid")]
    pub downstream_asset_id: AssetId,
    #[serde(default)]
    pub kind: DependencyKind,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ImpactRequest {
    #[schema(value_type = Object)]
    pub proposed_schema: serde_json::Value,
    #[serde(default)]
    pub depth: Option<usize>,
}

fn validate_fqn(fqn: &str) -> ApiResult<()> {
    if fqn.trim().is_empty() {
        return Err(ApiError::validation("Asset fqn must not be empty"));
    }
    if fqn.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("Asset fqn must not contain whitespace"));
    }
    Ok(())
}

/// POST /api/v1/assets
#[utoipa::path(
    post,
    path = "/api/v1/assets",
    tag = "Assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 409, description = "FQN already taken", body = ApiError),
    )
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateAssetRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<Asset>)> {
    auth.require_scope(ApiKeyScope::Write)?;
    validate_fqn(&body.fqn)?;

    let owner = body.owner_team_id.unwrap_or(auth.team_id);
    auth.require_team(owner)?;

    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let asset = Asset {
        asset_id: AssetId::new(state.ids.new_id()),
        fqn: body.fqn.trim().to_string(),
        owner_team_id: owner,
        resource_type: body.resource_type,
        current_contract_id: None,
        metadata: body.metadata.unwrap_or_else(|| json!({})),
        created_at: state.clock.now(),
        deleted_at: None,
    };

    let mut tx = state.store.begin().await?;
    if tx.team_get(owner).await?.is_none() {
        return Err(ApiError::not_found(format!("Team {owner} not found")));
    }
    tx.asset_insert(&asset).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Asset,
        asset.asset_id.as_uuid(),
        AuditAction::AssetCreated,
        auth.team_id,
        json!({ "fqn": asset.fqn, "resource_type": asset.resource_type }),
    )
    .await?;
    tx.commit().await?;

    Ok((axum::http::StatusCode::CREATED, Json(asset)))
}

/// GET /api/v1/assets
#[utoipa::path(
    get,
    path = "/api/v1/assets",
    tag = "Assets",
    params(AssetListQuery),
    responses((status = 200, description = "Live assets", body = Vec<Asset>))
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AssetListQuery>,
) -> ApiResult<Json<Vec<Asset>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let filter = AssetFilter {
        owner_team_id: query.owner_team_id,
        resource_type: query.resource_type,
        fqn_contains: query.fqn_contains.clone(),
    };
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    }
    .clamped();

    let mut tx = state.store.begin().await?;
    let assets = tx.asset_list(&filter, page).await?;
    tx.rollback().await?;
    Ok(Json(assets))
}

/// GET /api/v1/assets/{id}
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}",
    tag = "Assets",
    params(("id" = String, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<AssetId>,
) -> ApiResult<Json<Asset>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    let asset = tx.asset_get(id).await?;
    tx.rollback().await?;
    asset
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Asset {id} not found")))
}

/// DELETE /api/v1/assets/{id} - soft delete.
#[utoipa::path(
    delete,
    path = "/api/v1/assets/{id}",
    tag = "Assets",
    params(("id" = String, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset soft-deleted", body = Asset),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<AssetId>,
) -> ApiResult<Json<Asset>> {
    auth.require_scope(ApiKeyScope::Write)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    let mut asset = tx
        .asset_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Asset {id} not found")))?;
    auth.require_team(asset.owner_team_id)?;

    asset.deleted_at = Some(state.clock.now());
    tx.asset_update(&asset).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Asset,
        asset.asset_id.as_uuid(),
        AuditAction::AssetDeleted,
        auth.team_id,
        json!({ "fqn": asset.fqn }),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(asset))
}

/// POST /api/v1/assets/{id}/dependencies
#[utoipa::path(
    post,
    path = "/api/v1/assets/{id}/dependencies",
    tag = "Assets",
    params(("id" = String, Path, description = "Upstream asset ID")),
    request_body = AddDependencyRequest,
    responses((status = 201, description = "Edge recorded", body = AssetDependency))
)]
pub async fn add_dependency(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<AssetId>,
    Json(body): Json<AddDependencyRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<AssetDependency>)> {
    auth.require_scope(ApiKeyScope::Write)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    for asset_id in [id, body.downstream_asset_id] {
        if tx.asset_get(asset_id).await?.is_none() {
            return Err(ApiError::not_found(format!("Asset {asset_id} not found")));
        }
    }

    let edge = AssetDependency {
        dependency_id: DependencyId::new(state.ids.new_id()),
        upstream_asset_id: id,
        downstream_asset_id: body.downstream_asset_id,
        kind: body.kind,
        created_at: state.clock.now(),
        deleted_at: None,
    };
    tx.dependency_insert(&edge).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Dependency,
        edge.dependency_id.as_uuid(),
        AuditAction::DependencyAdded,
        auth.team_id,
        json!({
            "upstream_asset_id": edge.upstream_asset_id,
            "downstream_asset_id": edge.downstream_asset_id,
            "kind": edge.kind,
        }),
    )
    .await?;
    tx.commit().await?;

    Ok((axum::http::StatusCode::CREATED, Json(edge)))
}

/// GET /api/v1/assets/{id}/dependencies - direct downstream edges.
#[utoipa::path(
    get,
    path = "/api/v1/assets/{id}/dependencies",
    tag = "Assets",
    params(("id" = String, Path, description = "Upstream asset ID")),
    responses((status = 200, description = "Downstream edges", body = Vec<AssetDependency>))
)]
pub async fn list_dependencies(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<AssetId>,
) -> ApiResult<Json<Vec<AssetDependency>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    if tx.asset_get(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Asset {id} not found")));
    }
    let edges = tx.dependencies_downstream_of(id).await?;
    tx.rollback().await?;
    Ok(Json(edges))
}

/// POST /api/v1/assets/{id}/impact - analyze a proposed schema.
#[utoipa::path(
    post,
    path = "/api/v1/assets/{id}/impact",
    tag = "Assets",
    params(("id" = String, Path, description = "Asset ID")),
    request_body = ImpactRequest,
    responses(
        (status = 200, description = "Impact report", body = ImpactReport),
        (status = 404, description = "Asset not found", body = ApiError),
    )
)]
pub async fn asset_impact(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<AssetId>,
    Json(body): Json<ImpactRequest>,
) -> ApiResult<Json<ImpactReport>> {
    auth.require_scope(ApiKeyScope::Read)?;

    // Impact analysis walks the lineage graph; restrict to the owning
    // team or admins, like the rest of the producer surface.
    let mut tx = state.store.begin().await?;
    let asset = tx
        .asset_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Asset {id} not found")))?;
    tx.rollback().await?;
    auth.require_team(asset.owner_team_id)?;

    let depth = body.depth.unwrap_or(state.config.impact_depth_default);
    let report = analyze_impact(&state, id, &body.proposed_schema, depth).await?;
    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_asset).get(list_assets))
        .route("/:id", get(get_asset).delete(delete_asset))
        .route("/:id/dependencies", post(add_dependency).get(list_dependencies))
        .route("/:id/impact", post(asset_impact))
}
