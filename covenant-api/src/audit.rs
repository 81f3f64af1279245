//! Audit recorder.
//!
//! Every state transition appends an event through these helpers, inside
//! the same transaction as the mutation itself. A commit-then-audit
//! pattern is forbidden: if the append fails, the whole transaction fails
//! and neither the mutation nor the missing history can be observed.

use covenant_core::{
    AuditAction, AuditEvent, AuditEventId, Clock, Contract, EntityIdType, EntityType, IdGen,
    Proposal, TeamId,
};
use covenant_storage::{StoreResult, StoreTx};
use serde_json::{json, Value};
use uuid::Uuid;

/// Clock and ID generator bundle threaded through the write paths.
pub struct Effects<'a> {
    pub clock: &'a dyn Clock,
    pub ids: &'a dyn IdGen,
}

impl<'a> Effects<'a> {
    pub fn new(clock: &'a dyn Clock, ids: &'a dyn IdGen) -> Self {
        Self { clock, ids }
    }
}

async fn append(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    entity_type: EntityType,
    entity_id: Uuid,
    action: AuditAction,
    actor_id: Option<Uuid>,
    payload: Value,
) -> StoreResult<()> {
    let event = AuditEvent {
        event_id: AuditEventId::new(effects.ids.new_id()),
        entity_type,
        entity_id,
        action,
        actor_id,
        payload,
        occurred_at: effects.clock.now(),
    };
    tx.append_audit(&event).await
}

/// Generic entity-lifecycle event (create/update/delete of teams, assets,
/// registrations, dependencies, API keys).
pub async fn log_entity_event(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    entity_type: EntityType,
    entity_id: Uuid,
    action: AuditAction,
    actor: TeamId,
    payload: Value,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        entity_type,
        entity_id,
        action,
        Some(actor.as_uuid()),
        payload,
    )
    .await
}

pub async fn log_contract_published(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    contract: &Contract,
    actor: TeamId,
    change_type: Option<&str>,
    prerelease: bool,
) -> StoreResult<()> {
    let mut payload = json!({ "version": contract.version });
    if let Some(change_type) = change_type {
        payload["change_type"] = json!(change_type);
    }
    if prerelease {
        payload["prerelease"] = json!(true);
    }
    append(
        tx,
        effects,
        EntityType::Contract,
        contract.contract_id.as_uuid(),
        AuditAction::ContractPublished,
        Some(actor.as_uuid()),
        payload,
    )
    .await
}

pub async fn log_contract_force_published(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    contract: &Contract,
    actor: TeamId,
    breaking_changes: &[Value],
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Contract,
        contract.contract_id.as_uuid(),
        AuditAction::ContractForcePublished,
        Some(actor.as_uuid()),
        json!({
            "version": contract.version,
            "breaking_changes": breaking_changes,
        }),
    )
    .await
}

pub async fn log_contract_deprecated(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    deprecated: &Contract,
    superseded_by: &Contract,
    actor: TeamId,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Contract,
        deprecated.contract_id.as_uuid(),
        AuditAction::ContractDeprecated,
        Some(actor.as_uuid()),
        json!({
            "version": deprecated.version,
            "superseded_by": superseded_by.contract_id,
            "superseded_by_version": superseded_by.version,
        }),
    )
    .await
}

pub async fn log_guarantees_updated(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    contract: &Contract,
    actor: TeamId,
    old_guarantees: &Value,
    new_guarantees: &Value,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Contract,
        contract.contract_id.as_uuid(),
        AuditAction::GuaranteesUpdated,
        Some(actor.as_uuid()),
        json!({
            "old_guarantees": old_guarantees,
            "new_guarantees": new_guarantees,
        }),
    )
    .await
}

pub async fn log_proposal_opened(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    proposal: &Proposal,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Proposal,
        proposal.proposal_id.as_uuid(),
        AuditAction::ProposalOpened,
        Some(proposal.proposed_by.as_uuid()),
        json!({
            "asset_id": proposal.asset_id,
            "proposed_version": proposal.proposed_version,
            "change_type": proposal.change_type,
            "breaking_changes": proposal.breaking_changes,
            "pending_consumers": proposal.pending_consumers,
        }),
    )
    .await
}

pub async fn log_proposal_acknowledged(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    proposal: &Proposal,
    consumer: TeamId,
    response: &str,
    notes: Option<&str>,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Proposal,
        proposal.proposal_id.as_uuid(),
        AuditAction::ProposalAcknowledged,
        Some(consumer.as_uuid()),
        json!({ "response": response, "notes": notes }),
    )
    .await
}

pub async fn log_proposal_resolved(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    proposal: &Proposal,
    action: AuditAction,
    actor: TeamId,
    payload: Value,
) -> StoreResult<()> {
    append(
        tx,
        effects,
        EntityType::Proposal,
        proposal.proposal_id.as_uuid(),
        action,
        Some(actor.as_uuid()),
        payload,
    )
    .await
}
