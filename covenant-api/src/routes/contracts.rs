//! Contract routes: publish, list, read, diff and compare.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::services::{publish_contract, PublishContractRequest, PublishOutcome};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use covenant_core::{
    ApiKeyScope, AssetId, CompatibilityMode, Contract, ContractId, EntityIdType, Guarantees, Page,
};
use covenant_diff::{diff_schemas, DiffReport};
use covenant_storage::StoreTx;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct PublishBody {
    #[schema(value_type = Object)]
    pub schema: Value,
    /// Omit to auto-generate the suggested next version.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub compatibility_mode: Option<CompatibilityMode>,
    #[serde(default)]
    pub guarantees: Option<Guarantees>,
    /// Publish a breaking change without a proposal. Admin only.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct ContractListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct DiffQuery {
    /// Contract to diff against (the "new" side).
    #[param(value_type = String)]
    pub against: ContractId,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CompareRequest {
    #[schema(value_type = Object)]
    pub old_schema: Value,
    #[schema(value_type = Object)]
    pub new_schema: Value,
    #[serde(default)]
    pub compatibility_mode: CompatibilityMode,
}

/// Wire shape of a diff: the changes plus classification.
#[derive(Debug, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct DiffResponse {
    pub change_type: covenant_core::ChangeType,
    pub is_compatible: bool,
    #[schema(value_type = Vec<Object>)]
    pub changes: Vec<covenant_diff::Change>,
    #[schema(value_type = Vec<Object>)]
    pub breaking_changes: Vec<covenant_diff::Change>,
}

impl From<DiffReport> for DiffResponse {
    fn from(report: DiffReport) -> Self {
        Self {
            change_type: report.change_type,
            is_compatible: report.breaking.is_empty(),
            changes: report.changes,
            breaking_changes: report.breaking,
        }
    }
}

/// POST /api/v1/assets/{asset_id}/contracts - the central write path.
#[utoipa::path(
    post,
    path = "/api/v1/assets/{asset_id}/contracts",
    tag = "Contracts",
    params(("asset_id" = String, Path, description = "Asset ID")),
    request_body = PublishBody,
    responses(
        (status = 200, description = "Published, force-published or proposal opened", body = PublishOutcome),
        (status = 404, description = "Asset not found", body = ApiError),
        (status = 409, description = "Pending proposal or version conflict", body = ApiError),
    )
)]
pub async fn publish(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(asset_id): Path<AssetId>,
    Json(body): Json<PublishBody>,
) -> ApiResult<Json<PublishOutcome>> {
    auth.require_scope(ApiKeyScope::Write)?;
    if body.force {
        auth.require_scope(ApiKeyScope::Admin)?;
    }

    // Only the owning team (or an admin) publishes contracts for an asset.
    let mut tx = state.store.begin().await?;
    let asset = tx
        .asset_get(asset_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Asset {asset_id} not found")))?;
    tx.rollback().await?;
    auth.require_team(asset.owner_team_id)?;

    let outcome = publish_contract(
        &state,
        PublishContractRequest {
            asset_id,
            schema: body.schema,
            version: body.version,
            compatibility_mode: body.compatibility_mode,
            guarantees: body.guarantees,
            publisher: if auth.team_id.as_uuid().is_nil() {
                asset.owner_team_id
            } else {
                auth.team_id
            },
            force: body.force,
        },
    )
    .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/assets/{asset_id}/contracts - version history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/assets/{asset_id}/contracts",
    tag = "Contracts",
    params(("asset_id" = String, Path, description = "Asset ID"), ContractListQuery),
    responses((status = 200, description = "Contracts", body = Vec<Contract>))
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(asset_id): Path<AssetId>,
    Query(query): Query<ContractListQuery>,
) -> ApiResult<Json<Vec<Contract>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    }
    .clamped();

    let mut tx = state.store.begin().await?;
    if tx.asset_get(asset_id).await?.is_none() {
        return Err(ApiError::not_found(format!("Asset {asset_id} not found")));
    }
    let contracts = tx.contract_list_for_asset(asset_id, page).await?;
    tx.rollback().await?;
    Ok(Json(contracts))
}

/// GET /api/v1/contracts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}",
    tag = "Contracts",
    params(("id" = String, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Contract", body = Contract),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_contract(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ContractId>,
) -> ApiResult<Json<Contract>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    let contract = tx.contract_get(id).await?;
    tx.rollback().await?;
    contract
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Contract {id} not found")))
}

/// GET /api/v1/contracts/{id}/diff?against={other} - diff two stored
/// contract versions. The path contract is the old side.
#[utoipa::path(
    get,
    path = "/api/v1/contracts/{id}/diff",
    tag = "Contracts",
    params(("id" = String, Path, description = "Old-side contract ID"), DiffQuery),
    responses(
        (status = 200, description = "Diff report", body = DiffResponse),
        (status = 404, description = "Either contract missing", body = ApiError),
    )
)]
pub async fn diff_contracts_route(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ContractId>,
    Query(query): Query<DiffQuery>,
) -> ApiResult<Json<DiffResponse>> {
    auth.require_scope(ApiKeyScope::Read)?;

    let mut tx = state.store.begin().await?;
    let old = tx
        .contract_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Contract {id} not found")))?;
    let new = tx
        .contract_get(query.against)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Contract {} not found", query.against)))?;
    tx.rollback().await?;

    if old.asset_id != new.asset_id {
        return Err(ApiError::validation(
            "Contracts belong to different assets and cannot be diffed",
        ));
    }

    let report = diff_schemas(&old.schema, &new.schema, old.compatibility_mode)
        .map_err(|e| ApiError::broken_contract(e.to_string()))?;
    Ok(Json(report.into()))
}

/// POST /api/v1/compare - compare two raw schemas without touching any
/// stored entity.
#[utoipa::path(
    post,
    path = "/api/v1/compare",
    tag = "Contracts",
    request_body = CompareRequest,
    responses((status = 200, description = "Diff report", body = DiffResponse))
)]
pub async fn compare(
    State(_state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CompareRequest>,
) -> ApiResult<Json<DiffResponse>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let report = diff_schemas(&body.old_schema, &body.new_schema, body.compatibility_mode)
        .map_err(|e| ApiError::validation(format!("Invalid schema: {e}")))?;
    Ok(Json(report.into()))
}

/// Routes mounted under `/assets/{asset_id}/contracts`.
pub fn asset_router() -> Router<AppState> {
    Router::new().route("/", post(publish).get(list_contracts))
}

/// Routes mounted under `/contracts`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_contract))
        .route("/:id/diff", get(diff_contracts_route))
}
