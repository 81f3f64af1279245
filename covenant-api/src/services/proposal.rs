//! Proposal lifecycle: acknowledgment collection, resolution, withdrawal,
//! force-approval and publish-on-approval.
//!
//! Transitions: `pending -> approved | rejected | withdrawn`, then
//! `approved -> published` via an explicit publish. Every transition
//! takes the asset row lock so it serialises with concurrent publishes
//! on the same asset.

use crate::audit::{
    log_contract_deprecated, log_contract_published, log_proposal_acknowledged,
    log_proposal_resolved, Effects,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use covenant_core::{
    AckResponse, Acknowledgment, AcknowledgmentId, AuditAction, Contract, ContractId,
    ContractStatus, EntityIdType, Proposal, ProposalId, ProposalStatus, SemVer, TeamId, Timestamp,
};
use covenant_storage::StoreTx;
use serde_json::json;

async fn load_pending(
    tx: &mut dyn StoreTx,
    proposal_id: ProposalId,
) -> ApiResult<Proposal> {
    let proposal = tx
        .proposal_get(proposal_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Proposal {proposal_id} not found")))?;
    if proposal.status != ProposalStatus::Pending {
        return Err(ApiError::conflict(format!(
            "Proposal is {}, not pending",
            proposal.status
        )));
    }
    Ok(proposal)
}

/// Record a consumer's response and run the resolution trigger.
pub async fn acknowledge(
    state: &AppState,
    proposal_id: ProposalId,
    consumer_team: TeamId,
    response: AckResponse,
    migration_deadline: Option<Timestamp>,
    notes: Option<String>,
) -> ApiResult<(Acknowledgment, Proposal)> {
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;

    let mut proposal = load_pending(&mut *tx, proposal_id).await?;
    tx.lock_asset(proposal.asset_id).await?;

    // Only teams captured in the snapshot at open time may acknowledge.
    if !proposal.pending_consumers.contains(&consumer_team) {
        return Err(ApiError::forbidden(
            "Team is not a registered consumer on this proposal",
        ));
    }
    if tx.team_get(consumer_team).await?.is_none() {
        return Err(ApiError::forbidden("Consumer team no longer exists"));
    }

    let ack = Acknowledgment {
        ack_id: AcknowledgmentId::new(effects.ids.new_id()),
        proposal_id,
        consumer_team_id: consumer_team,
        response,
        migration_deadline,
        notes: notes.clone(),
        responded_at: effects.clock.now(),
    };
    tx.ack_upsert(&ack).await?;
    log_proposal_acknowledged(
        &mut *tx,
        &effects,
        &proposal,
        consumer_team,
        response.as_str(),
        notes.as_deref(),
    )
    .await?;

    // Resolution trigger.
    if response == AckResponse::Blocked {
        proposal.status = ProposalStatus::Rejected;
        proposal.resolved_at = Some(effects.clock.now());
        tx.proposal_update(&proposal).await?;
        log_proposal_resolved(
            &mut *tx,
            &effects,
            &proposal,
            AuditAction::ProposalRejected,
            consumer_team,
            json!({ "blocked_by": consumer_team }),
        )
        .await?;
    } else {
        let acks = tx.acks_for_proposal(proposal_id).await?;
        let assenting: Vec<TeamId> = acks
            .iter()
            .filter(|a| a.response.is_assenting())
            .map(|a| a.consumer_team_id)
            .collect();
        let all_responded = proposal
            .pending_consumers
            .iter()
            .all(|team| assenting.contains(team));
        if all_responded {
            proposal.status = ProposalStatus::Approved;
            proposal.resolved_at = Some(effects.clock.now());
            tx.proposal_update(&proposal).await?;
            log_proposal_resolved(
                &mut *tx,
                &effects,
                &proposal,
                AuditAction::ProposalApproved,
                consumer_team,
                json!({ "acknowledged_count": acks.len() }),
            )
            .await?;
        }
    }

    tx.commit().await?;
    Ok((ack, proposal))
}

/// Withdraw a pending proposal. Only the proposing team or an admin.
pub async fn withdraw(
    state: &AppState,
    proposal_id: ProposalId,
    actor: TeamId,
    is_admin: bool,
) -> ApiResult<Proposal> {
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;

    let mut proposal = load_pending(&mut *tx, proposal_id).await?;
    tx.lock_asset(proposal.asset_id).await?;

    if proposal.proposed_by != actor && !is_admin {
        return Err(ApiError::forbidden(
            "Only the proposing team may withdraw this proposal",
        ));
    }

    proposal.status = ProposalStatus::Withdrawn;
    proposal.resolved_at = Some(effects.clock.now());
    tx.proposal_update(&proposal).await?;
    log_proposal_resolved(
        &mut *tx,
        &effects,
        &proposal,
        AuditAction::ProposalWithdrawn,
        actor,
        json!({}),
    )
    .await?;

    tx.commit().await?;
    Ok(proposal)
}

/// Approve a proposal treating every outstanding acknowledgment as
/// approved. Admin scope enforced at the HTTP boundary.
pub async fn force_approve(
    state: &AppState,
    proposal_id: ProposalId,
    actor: TeamId,
) -> ApiResult<Proposal> {
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;

    let mut proposal = load_pending(&mut *tx, proposal_id).await?;
    tx.lock_asset(proposal.asset_id).await?;

    let acks = tx.acks_for_proposal(proposal_id).await?;
    let responded: Vec<TeamId> = acks.iter().map(|a| a.consumer_team_id).collect();
    let unresolved: Vec<TeamId> = proposal
        .pending_consumers
        .iter()
        .copied()
        .filter(|team| !responded.contains(team))
        .collect();

    proposal.status = ProposalStatus::Approved;
    proposal.resolved_at = Some(effects.clock.now());
    tx.proposal_update(&proposal).await?;
    log_proposal_resolved(
        &mut *tx,
        &effects,
        &proposal,
        AuditAction::ProposalForceApproved,
        actor,
        json!({ "unresolved_consumers": unresolved }),
    )
    .await?;

    tx.commit().await?;
    Ok(proposal)
}

/// Publish the contract carried by an approved proposal.
///
/// Re-verifies the base contract is still current. If the asset advanced
/// meanwhile (say through a forced publish) the proposal is rejected as
/// stale and the caller gets a conflict.
pub async fn publish_proposal(
    state: &AppState,
    proposal_id: ProposalId,
    actor: TeamId,
    version: Option<String>,
) -> ApiResult<(Contract, Proposal)> {
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;

    let mut proposal = tx
        .proposal_get(proposal_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Proposal {proposal_id} not found")))?;
    if proposal.status != ProposalStatus::Approved {
        return Err(ApiError::conflict(format!(
            "Cannot publish from proposal with status '{}'. Proposal must be approved first.",
            proposal.status
        )));
    }
    tx.lock_asset(proposal.asset_id).await?;

    let asset = tx
        .asset_get(proposal.asset_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Asset for proposal no longer exists"))?;
    let current = tx.contract_active_for_asset(proposal.asset_id).await?;

    // Stale base: the active contract moved on since this proposal was
    // approved. Reject the proposal and surface the conflict.
    let stale = current
        .as_ref()
        .map_or(true, |c| c.contract_id != proposal.base_contract_id);
    if stale {
        proposal.status = ProposalStatus::Rejected;
        proposal.resolved_at = Some(effects.clock.now());
        tx.proposal_update(&proposal).await?;
        log_proposal_resolved(
            &mut *tx,
            &effects,
            &proposal,
            AuditAction::ProposalRejected,
            actor,
            json!({ "reason": "stale_base_contract" }),
        )
        .await?;
        tx.commit().await?;
        return Err(ApiError::conflict(
            "Base contract is no longer current; proposal rejected as stale",
        ));
    }
    let current = current.expect("non-stale proposal implies an active contract");

    let version = version.unwrap_or_else(|| proposal.proposed_version.clone());
    let parsed = SemVer::parse(&version).map_err(|e| ApiError::validation(e.to_string()))?;
    if parsed <= SemVer::parse_lenient(&current.version) {
        return Err(ApiError::conflict(format!(
            "Version {} must be strictly greater than current {}",
            version, current.version
        )));
    }

    let contract = Contract {
        contract_id: ContractId::new(effects.ids.new_id()),
        asset_id: proposal.asset_id,
        version: version.clone(),
        schema: proposal.proposed_schema.clone(),
        compatibility_mode: proposal.proposed_compatibility_mode,
        guarantees: proposal.proposed_guarantees.clone(),
        status: ContractStatus::Active,
        published_at: effects.clock.now(),
        published_by: actor,
    };
    tx.contract_insert(&contract).await?;

    let mut deprecated = current.clone();
    deprecated.status = ContractStatus::Deprecated;
    tx.contract_update(&deprecated).await?;

    let mut asset = asset;
    asset.current_contract_id = Some(contract.contract_id);
    tx.asset_update(&asset).await?;

    proposal.status = ProposalStatus::Published;
    tx.proposal_update(&proposal).await?;

    log_contract_deprecated(&mut *tx, &effects, &deprecated, &contract, actor).await?;
    log_contract_published(
        &mut *tx,
        &effects,
        &contract,
        actor,
        Some(proposal.change_type.as_str()),
        false,
    )
    .await?;
    log_proposal_resolved(
        &mut *tx,
        &effects,
        &proposal,
        AuditAction::ProposalPublished,
        actor,
        json!({ "contract_id": contract.contract_id, "version": version }),
    )
    .await?;

    tx.commit().await?;
    Ok((contract, proposal))
}
