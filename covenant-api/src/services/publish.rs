//! The publish coordinator.
//!
//! One serializable transaction decides, for each publish request,
//! between: initial publish, compatible auto-publish, forced publish,
//! pre-release / graduation publish, or opening a proposal. The asset row
//! lock taken up front serialises concurrent publishers on the same
//! asset; publishers on other assets proceed independently.

use crate::audit::{
    log_contract_deprecated, log_contract_force_published, log_contract_published,
    log_guarantees_updated, log_proposal_opened, log_proposal_resolved, Effects,
};
use crate::error::{ApiError, ApiResult};
use crate::notify::NotifiedConsumer;
use crate::services::impact::ImpactedConsumer;
use crate::state::AppState;
use covenant_core::{
    Asset, AuditAction, ChangeType, CompatibilityMode, Contract, ContractId, ContractStatus,
    EntityIdType, Guarantees, Proposal, ProposalId, ProposalStatus, SemVer, TeamId,
};
use covenant_diff::{
    compute_version_suggestion, diff_schemas, DiffReport, SchemaNode, VersionSuggestion,
};
use covenant_storage::StoreTx;
use serde::Serialize;
use serde_json::{json, Value};

/// Inputs to a single contract publish.
#[derive(Debug, Clone)]
pub struct PublishContractRequest {
    pub asset_id: covenant_core::AssetId,
    pub schema: Value,
    /// None auto-generates the suggested next version.
    pub version: Option<String>,
    /// Mode stored on the new contract; defaults to the current
    /// contract's mode, then `backward`. Classification of the diff always
    /// uses the current contract's stored mode.
    pub compatibility_mode: Option<CompatibilityMode>,
    pub guarantees: Option<Guarantees>,
    pub publisher: TeamId,
    /// Publish a breaking change without a proposal. Requires admin
    /// scope, checked at the HTTP boundary.
    pub force: bool,
}

/// What the coordinator decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[derive(utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    Published,
    ForcePublished,
    ProposalOpened,
}

/// Result of a publish request.
#[derive(Debug, Clone, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct PublishOutcome {
    pub action: PublishAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<Contract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<Proposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[schema(value_type = Vec<Object>)]
    pub breaking_changes: Vec<Value>,
    pub impacted_consumers: Vec<ImpactedConsumer>,
    #[schema(value_type = Object)]
    pub version_suggestion: VersionSuggestion,
    pub version_auto_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Execute the publish state machine for one asset.
pub async fn publish_contract(
    state: &AppState,
    req: PublishContractRequest,
) -> ApiResult<PublishOutcome> {
    SchemaNode::parse(&req.schema)
        .map_err(|e| ApiError::validation(format!("Invalid schema: {e}")))?;

    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let mut tx = state.store.begin().await?;

    let asset = tx
        .asset_get(req.asset_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Asset {} not found", req.asset_id)))?;
    tx.lock_asset(asset.asset_id).await?;

    if let Some(pending) = tx.proposal_pending_for_asset(asset.asset_id).await? {
        return Err(ApiError::conflict(format!(
            "Asset has a pending proposal ({}). Resolve it before publishing.",
            pending.proposal_id
        )));
    }

    let current = tx.contract_active_for_asset(asset.asset_id).await?;

    // Diff and classify against the current contract under its stored
    // compatibility mode.
    let (report, suggestion) = match &current {
        Some(current) => {
            let report = diff_schemas(&current.schema, &req.schema, current.compatibility_mode)
                .map_err(|e| ApiError::broken_contract(e.to_string()))?;
            let suggestion = compute_version_suggestion(
                Some(current.version.as_str()),
                report.change_type,
                report.is_compatible(),
                report.breaking.clone(),
            );
            (Some(report), suggestion)
        }
        None => (
            None,
            compute_version_suggestion(None, ChangeType::Patch, true, Vec::new()),
        ),
    };

    // Resolve and validate the target version.
    let (version, version_auto_generated) = match &req.version {
        Some(version) => (version.clone(), false),
        None => (suggestion.suggested_version.clone(), true),
    };
    let parsed_version =
        SemVer::parse(&version).map_err(|e| ApiError::validation(e.to_string()))?;
    if let Some(current) = &current {
        if parsed_version <= SemVer::parse_lenient(&current.version) {
            return Err(ApiError::conflict(format!(
                "Version {} must be strictly greater than current {}",
                version, current.version
            )));
        }
    }
    if tx
        .contract_by_version(asset.asset_id, &version)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(format!(
            "Version {version} already exists for this asset"
        )));
    }

    let stored_mode = req
        .compatibility_mode
        .or(current.as_ref().map(|c| c.compatibility_mode))
        .unwrap_or_default();

    let outcome_base = |action, contract, proposal, change_type, breaking, consumers| {
        PublishOutcome {
            action,
            contract,
            proposal,
            change_type,
            breaking_changes: breaking,
            impacted_consumers: consumers,
            version_suggestion: suggestion.clone(),
            version_auto_generated,
            message: None,
            warning: None,
        }
    };

    // First contract: always publishable.
    let Some(current) = current else {
        let contract = insert_active_contract(
            &mut *tx,
            &effects,
            &asset,
            &req,
            &version,
            stored_mode,
        )
        .await?;
        log_contract_published(&mut *tx, &effects, &contract, req.publisher, None, false).await?;
        tx.commit().await?;
        return Ok(outcome_base(
            PublishAction::Published,
            Some(contract),
            None,
            None,
            Vec::new(),
            Vec::new(),
        ));
    };
    let report = report.expect("report exists whenever a current contract does");

    // Compatible change: replace the active contract in place.
    if report.is_compatible() {
        let (contract, _) = replace_active_contract(
            &mut *tx,
            &effects,
            &asset,
            &current,
            &req,
            &version,
            stored_mode,
            Some(report.change_type),
        )
        .await?;
        tx.commit().await?;
        return Ok(outcome_base(
            PublishAction::Published,
            Some(contract),
            None,
            Some(report.change_type),
            Vec::new(),
            Vec::new(),
        ));
    }

    let breaking_values = report.breaking_as_values();

    // Breaking with force: publish anyway, with a loud audit record.
    if req.force {
        let (contract, _) = replace_active_contract(
            &mut *tx,
            &effects,
            &asset,
            &current,
            &req,
            &version,
            stored_mode,
            Some(report.change_type),
        )
        .await?;
        log_contract_force_published(&mut *tx, &effects, &contract, req.publisher, &breaking_values)
            .await?;
        tx.commit().await?;
        let mut outcome = outcome_base(
            PublishAction::ForcePublished,
            Some(contract),
            None,
            Some(report.change_type),
            breaking_values,
            Vec::new(),
        );
        outcome.warning =
            Some("Breaking change was force-published. Consumers may be affected.".to_string());
        return Ok(outcome);
    }

    // Pre-release versions skip the proposal workflow.
    if parsed_version.is_prerelease() {
        let (contract, _) = replace_active_contract(
            &mut *tx,
            &effects,
            &asset,
            &current,
            &req,
            &version,
            stored_mode,
            Some(report.change_type),
        )
        .await?;
        tx.commit().await?;
        let mut outcome = outcome_base(
            PublishAction::Published,
            Some(contract),
            None,
            Some(report.change_type),
            breaking_values,
            Vec::new(),
        );
        outcome.message = Some(
            "Pre-release version published. Breaking changes allowed without acknowledgment."
                .to_string(),
        );
        return Ok(outcome);
    }

    // Graduating the current pre-release to its stable base also skips it.
    let current_version = SemVer::parse_lenient(&current.version);
    if SemVer::is_graduation(&current_version, &parsed_version) {
        let (contract, _) = replace_active_contract(
            &mut *tx,
            &effects,
            &asset,
            &current,
            &req,
            &version,
            stored_mode,
            Some(report.change_type),
        )
        .await?;
        tx.commit().await?;
        let mut outcome = outcome_base(
            PublishAction::Published,
            Some(contract),
            None,
            Some(report.change_type),
            breaking_values,
            Vec::new(),
        );
        outcome.message = Some(format!(
            "Graduated from {} to stable release.",
            current.version
        ));
        return Ok(outcome);
    }

    // Breaking without force: open a proposal and notify consumers.
    let (proposal, consumers) = open_proposal(
        &mut *tx,
        &effects,
        &asset,
        &current,
        &req,
        &version,
        stored_mode,
        &report,
    )
    .await?;
    tx.commit().await?;

    // Fire-and-forget after commit; a lost notification never reverses
    // committed state.
    let notifier = state.notifier.clone();
    let notified: Vec<NotifiedConsumer> = consumers.iter().map(Into::into).collect();
    let proposal_for_notify = proposal.clone();
    tokio::spawn(async move {
        notifier
            .notify_proposal_opened(&proposal_for_notify, &notified)
            .await;
    });

    let mut outcome = outcome_base(
        PublishAction::ProposalOpened,
        None,
        Some(proposal),
        Some(report.change_type),
        breaking_values,
        consumers,
    );
    outcome.message =
        Some("Breaking change detected. Proposal created for consumer acknowledgment.".to_string());
    Ok(outcome)
}

/// Insert a fresh active contract and point the asset at it.
async fn insert_active_contract(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    asset: &Asset,
    req: &PublishContractRequest,
    version: &str,
    mode: CompatibilityMode,
) -> ApiResult<Contract> {
    let contract = Contract {
        contract_id: ContractId::new(effects.ids.new_id()),
        asset_id: asset.asset_id,
        version: version.to_string(),
        schema: req.schema.clone(),
        compatibility_mode: mode,
        guarantees: req.guarantees.clone(),
        status: ContractStatus::Active,
        published_at: effects.clock.now(),
        published_by: req.publisher,
    };
    tx.contract_insert(&contract).await?;

    let mut asset = asset.clone();
    asset.current_contract_id = Some(contract.contract_id);
    tx.asset_update(&asset).await?;
    Ok(contract)
}

/// Deprecate the current contract and activate a new one, in one
/// transaction. The two writes never happen separately.
#[allow(clippy::too_many_arguments)]
async fn replace_active_contract(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    asset: &Asset,
    current: &Contract,
    req: &PublishContractRequest,
    version: &str,
    mode: CompatibilityMode,
    change_type: Option<ChangeType>,
) -> ApiResult<(Contract, Contract)> {
    let contract = insert_active_contract(tx, effects, asset, req, version, mode).await?;

    let mut deprecated = current.clone();
    deprecated.status = ContractStatus::Deprecated;
    tx.contract_update(&deprecated).await?;

    log_contract_deprecated(tx, effects, &deprecated, &contract, req.publisher).await?;
    log_contract_published(
        tx,
        effects,
        &contract,
        req.publisher,
        change_type.map(|c| c.as_str()),
        SemVer::parse_lenient(version).is_prerelease(),
    )
    .await?;

    let old_guarantees = serde_json::to_value(&current.guarantees)?;
    let new_guarantees = serde_json::to_value(&req.guarantees)?;
    if old_guarantees != new_guarantees {
        log_guarantees_updated(
            tx,
            effects,
            &contract,
            req.publisher,
            &old_guarantees,
            &new_guarantees,
        )
        .await?;
    }

    Ok((contract, deprecated))
}

/// Open a pending proposal, snapshotting the active consumer teams.
#[allow(clippy::too_many_arguments)]
async fn open_proposal(
    tx: &mut dyn StoreTx,
    effects: &Effects<'_>,
    asset: &Asset,
    current: &Contract,
    req: &PublishContractRequest,
    version: &str,
    mode: CompatibilityMode,
    report: &DiffReport,
) -> ApiResult<(Proposal, Vec<ImpactedConsumer>)> {
    // Snapshot set: active registrations whose team is live, excluding
    // the producer itself. Captured now; later registrations do not join.
    let mut consumers: Vec<ImpactedConsumer> = Vec::new();
    let mut pending_consumers: Vec<TeamId> = Vec::new();
    for registration in tx.registrations_active_for_asset(asset.asset_id).await? {
        if registration.consumer_team_id == asset.owner_team_id {
            continue;
        }
        if pending_consumers.contains(&registration.consumer_team_id) {
            continue;
        }
        let Some(team) = tx.team_get(registration.consumer_team_id).await? else {
            continue;
        };
        pending_consumers.push(registration.consumer_team_id);
        consumers.push(ImpactedConsumer {
            team_id: registration.consumer_team_id,
            team_name: team.name,
            status: registration.status,
            pinned_version: registration.pinned_version,
            depth: 0,
        });
    }

    let now = effects.clock.now();
    // A breaking change with nobody registered has no one to wait for.
    let vacuously_approved = pending_consumers.is_empty();
    let mut proposal = Proposal {
        proposal_id: ProposalId::new(effects.ids.new_id()),
        asset_id: asset.asset_id,
        base_contract_id: current.contract_id,
        proposed_schema: req.schema.clone(),
        proposed_version: version.to_string(),
        proposed_compatibility_mode: mode,
        proposed_guarantees: req.guarantees.clone(),
        breaking_changes: report.breaking_as_values(),
        change_type: report.change_type,
        status: ProposalStatus::Pending,
        pending_consumers,
        proposed_by: req.publisher,
        proposed_at: now,
        resolved_at: None,
    };
    tx.proposal_insert(&proposal).await?;
    log_proposal_opened(tx, effects, &proposal).await?;

    if vacuously_approved {
        proposal.status = ProposalStatus::Approved;
        proposal.resolved_at = Some(now);
        tx.proposal_update(&proposal).await?;
        log_proposal_resolved(
            tx,
            effects,
            &proposal,
            AuditAction::ProposalApproved,
            req.publisher,
            json!({ "acknowledged_count": 0 }),
        )
        .await?;
    }

    Ok((proposal, consumers))
}
