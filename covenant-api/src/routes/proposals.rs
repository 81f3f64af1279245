//! Proposal routes: listing, status, acknowledgment and resolution.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::services::{acknowledge, force_approve, publish_proposal, withdraw};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use covenant_core::{
    AckResponse, Acknowledgment, ApiKeyScope, AssetId, Contract, EntityIdType, Page, Proposal,
    ProposalFilter, ProposalId, ProposalStatus, TeamId, Timestamp,
};
use covenant_storage::StoreTx;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct ProposalListQuery {
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub asset_id: Option<AssetId>,
    #[serde(default)]
    pub status: Option<ProposalStatus>,
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub proposed_by: Option<TeamId>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct AcknowledgeRequest {
    pub response: AckResponse,
    /// Defaults to the caller's team; acknowledging for another team
    /// requires admin scope.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub consumer_team_id: Option<TeamId>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub migration_deadline: Option<Timestamp>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ProposalPublishRequest {
    /// Defaults to the version proposed at open time.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct AcknowledgeResponse {
    pub acknowledgment: Acknowledgment,
    pub proposal: Proposal,
}

#[derive(Debug, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct ProposalPublishResponse {
    pub contract: Contract,
    pub proposal: Proposal,
}

/// GET /api/v1/proposals
#[utoipa::path(
    get,
    path = "/api/v1/proposals",
    tag = "Proposals",
    params(ProposalListQuery),
    responses((status = 200, description = "Proposals, newest first", body = Vec<Proposal>))
)]
pub async fn list_proposals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ProposalListQuery>,
) -> ApiResult<Json<Vec<Proposal>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let filter = ProposalFilter {
        asset_id: query.asset_id,
        status: query.status,
        proposed_by: query.proposed_by,
    };
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    }
    .clamped();

    let mut tx = state.store.begin().await?;
    let proposals = tx.proposal_list(&filter, page).await?;
    tx.rollback().await?;
    Ok(Json(proposals))
}

/// GET /api/v1/proposals/{id}
#[utoipa::path(
    get,
    path = "/api/v1/proposals/{id}",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal", body = Proposal),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_proposal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<Proposal>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    let proposal = tx.proposal_get(id).await?;
    tx.rollback().await?;
    proposal
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Proposal {id} not found")))
}

/// GET /api/v1/proposals/{id}/status - acknowledgment progress.
#[utoipa::path(
    get,
    path = "/api/v1/proposals/{id}/status",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Detailed acknowledgment progress"),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn proposal_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<serde_json::Value>> {
    auth.require_scope(ApiKeyScope::Read)?;

    let mut tx = state.store.begin().await?;
    let proposal = tx
        .proposal_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Proposal {id} not found")))?;
    let asset = tx.asset_get(proposal.asset_id).await?;
    let proposer = tx.team_get(proposal.proposed_by).await?;
    let acks = tx.acks_for_proposal(id).await?;

    let mut ack_list = Vec::with_capacity(acks.len());
    let mut acknowledged = Vec::new();
    let mut blocked_count = 0usize;
    for ack in &acks {
        acknowledged.push(ack.consumer_team_id);
        if ack.response == AckResponse::Blocked {
            blocked_count += 1;
        }
        let team = tx.team_get(ack.consumer_team_id).await?;
        ack_list.push(json!({
            "consumer_team_id": ack.consumer_team_id,
            "consumer_team_name": team.map(|t| t.name),
            "response": ack.response,
            "migration_deadline": ack.migration_deadline,
            "responded_at": ack.responded_at,
            "notes": ack.notes,
        }));
    }

    let mut pending = Vec::new();
    for team_id in &proposal.pending_consumers {
        if !acknowledged.contains(team_id) {
            let team = tx.team_get(*team_id).await?;
            pending.push(json!({
                "team_id": team_id,
                "team_name": team.map(|t| t.name),
            }));
        }
    }
    tx.rollback().await?;

    Ok(Json(json!({
        "proposal_id": proposal.proposal_id,
        "status": proposal.status,
        "asset_fqn": asset.map(|a| a.fqn),
        "change_type": proposal.change_type,
        "breaking_changes": proposal.breaking_changes,
        "proposed_by": {
            "team_id": proposal.proposed_by,
            "team_name": proposer.map(|t| t.name),
        },
        "proposed_at": proposal.proposed_at,
        "resolved_at": proposal.resolved_at,
        "consumers": {
            "total": proposal.pending_consumers.len(),
            "acknowledged": acks.len(),
            "pending": pending.len(),
            "blocked": blocked_count,
        },
        "acknowledgments": ack_list,
        "pending_consumers": pending,
    })))
}

/// POST /api/v1/proposals/{id}/acknowledge
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/acknowledge",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 201, description = "Acknowledgment recorded", body = AcknowledgeResponse),
        (status = 403, description = "Not in the snapshot set", body = ApiError),
        (status = 409, description = "Proposal not pending", body = ApiError),
    )
)]
pub async fn acknowledge_proposal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
    Json(body): Json<AcknowledgeRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<AcknowledgeResponse>)> {
    auth.require_scope(ApiKeyScope::Write)?;
    let consumer = body.consumer_team_id.unwrap_or(auth.team_id);
    auth.require_team(consumer)?;

    let (acknowledgment, proposal) = acknowledge(
        &state,
        id,
        consumer,
        body.response,
        body.migration_deadline,
        body.notes,
    )
    .await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(AcknowledgeResponse {
            acknowledgment,
            proposal,
        }),
    ))
}

/// POST /api/v1/proposals/{id}/withdraw
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/withdraw",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal withdrawn", body = Proposal),
        (status = 403, description = "Not the proposer", body = ApiError),
    )
)]
pub async fn withdraw_proposal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<Proposal>> {
    auth.require_scope(ApiKeyScope::Write)?;
    let proposal = withdraw(&state, id, auth.team_id, auth.is_admin()).await?;
    Ok(Json(proposal))
}

/// POST /api/v1/proposals/{id}/force - admin force-approval.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/force",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    responses(
        (status = 200, description = "Proposal force-approved", body = Proposal),
        (status = 403, description = "Admin scope required", body = ApiError),
    )
)]
pub async fn force_proposal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
) -> ApiResult<Json<Proposal>> {
    auth.require_scope(ApiKeyScope::Admin)?;
    let proposal = force_approve(&state, id, auth.team_id).await?;
    Ok(Json(proposal))
}

/// POST /api/v1/proposals/{id}/publish - publish an approved proposal.
#[utoipa::path(
    post,
    path = "/api/v1/proposals/{id}/publish",
    tag = "Proposals",
    params(("id" = String, Path, description = "Proposal ID")),
    request_body = ProposalPublishRequest,
    responses(
        (status = 200, description = "Contract published from proposal", body = ProposalPublishResponse),
        (status = 409, description = "Not approved, or stale base contract", body = ApiError),
    )
)]
pub async fn publish_proposal_route(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<ProposalId>,
    Json(body): Json<ProposalPublishRequest>,
) -> ApiResult<Json<ProposalPublishResponse>> {
    auth.require_scope(ApiKeyScope::Write)?;

    // Only the proposing team or an admin may publish from a proposal.
    let mut tx = state.store.begin().await?;
    let proposal = tx
        .proposal_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Proposal {id} not found")))?;
    tx.rollback().await?;
    auth.require_team(proposal.proposed_by)?;

    let actor = if auth.team_id.as_uuid().is_nil() {
        proposal.proposed_by
    } else {
        auth.team_id
    };
    let (contract, proposal) = publish_proposal(&state, id, actor, body.version).await?;
    Ok(Json(ProposalPublishResponse { contract, proposal }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_proposals))
        .route("/:id", get(get_proposal))
        .route("/:id/status", get(proposal_status))
        .route("/:id/acknowledge", post(acknowledge_proposal))
        .route("/:id/withdraw", post(withdraw_proposal))
        .route("/:id/force", post(force_proposal))
        .route("/:id/publish", post(publish_proposal_route))
}
