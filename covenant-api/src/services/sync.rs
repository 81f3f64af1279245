//! Bulk contract publishing with dry-run preview.
//!
//! Each item is evaluated (and, outside dry-run, published) on its own;
//! one bad contract never aborts the batch. Outcomes are reported
//! per item alongside aggregate counts.

use crate::error::{ApiError, ApiResult};
use crate::services::publish::{
    publish_contract, PublishAction, PublishContractRequest, PublishOutcome,
};
use crate::state::AppState;
use covenant_core::{AssetId, CompatibilityMode, ContractId, Guarantees, ProposalId, TeamId};
use covenant_diff::{diff_schemas, next_version, SchemaNode};
use covenant_storage::StoreTx;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One contract in a bulk publish request.
#[derive(Debug, Clone, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct BulkContractItem {
    #[schema(value_type = String, format = "uuid")]
    pub asset_id: AssetId,
    #[schema(value_type = Object)]
    pub schema: Value,
    #[serde(default)]
    pub compatibility_mode: Option<CompatibilityMode>,
    #[serde(default)]
    pub guarantees: Option<Guarantees>,
}

/// Outcome of one item.
#[derive(Debug, Clone, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct BulkItemResult {
    #[schema(value_type = String, format = "uuid")]
    pub asset_id: AssetId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_fqn: Option<String>,
    /// `published`, `will_publish`, `skipped`, `will_skip`, `breaking`,
    /// `proposal_created` or `failed`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contract_id: Option<ContractId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub proposal_id: Option<ProposalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    #[schema(value_type = Vec<Object>)]
    pub breaking_changes: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemResult {
    fn new(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            asset_fqn: None,
            status: "failed".to_string(),
            contract_id: None,
            proposal_id: None,
            suggested_version: None,
            current_version: None,
            reason: None,
            breaking_changes: Vec::new(),
            error: None,
        }
    }
}

/// Aggregate result of a bulk publish.
#[derive(Debug, Clone, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct BulkPublishResult {
    pub preview: bool,
    pub total: usize,
    pub published: usize,
    pub skipped: usize,
    pub proposals_created: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

/// Publish many contracts in one call.
pub async fn bulk_publish(
    state: &AppState,
    items: Vec<BulkContractItem>,
    publisher: TeamId,
    dry_run: bool,
    create_proposals_for_breaking: bool,
) -> ApiResult<BulkPublishResult> {
    let mut result = BulkPublishResult {
        preview: dry_run,
        total: items.len(),
        published: 0,
        skipped: 0,
        proposals_created: 0,
        failed: 0,
        results: Vec::with_capacity(items.len()),
    };

    for item in items {
        let item_result = evaluate_item(
            state,
            &item,
            publisher,
            dry_run,
            create_proposals_for_breaking,
        )
        .await;
        match item_result.status.as_str() {
            "published" | "will_publish" => result.published += 1,
            "skipped" | "will_skip" => result.skipped += 1,
            "proposal_created" => result.proposals_created += 1,
            "breaking" => {
                if create_proposals_for_breaking {
                    result.proposals_created += 1;
                } else {
                    result.failed += 1;
                }
            }
            _ => result.failed += 1,
        }
        result.results.push(item_result);
    }

    Ok(result)
}

async fn evaluate_item(
    state: &AppState,
    item: &BulkContractItem,
    publisher: TeamId,
    dry_run: bool,
    create_proposals_for_breaking: bool,
) -> BulkItemResult {
    let mut out = BulkItemResult::new(item.asset_id);

    if let Err(e) = SchemaNode::parse(&item.schema) {
        out.error = Some(format!("Invalid schema: {e}"));
        return out;
    }

    // Read-only preflight: asset, pending proposal, current contract.
    let preflight = async {
        let mut tx = state.store.begin().await?;
        let asset = tx.asset_get(item.asset_id).await?;
        let Some(asset) = asset else {
            tx.rollback().await?;
            return Ok::<_, ApiError>(None);
        };
        let pending = tx.proposal_pending_for_asset(item.asset_id).await?;
        let current = tx.contract_active_for_asset(item.asset_id).await?;
        tx.rollback().await?;
        Ok(Some((asset, pending, current)))
    };
    let (asset, pending, current) = match preflight.await {
        Ok(Some(loaded)) => loaded,
        Ok(None) => {
            out.error = Some(format!("Asset not found: {}", item.asset_id));
            return out;
        }
        Err(e) => {
            out.error = Some(e.to_string());
            return out;
        }
    };
    out.asset_fqn = Some(asset.fqn.clone());

    if pending.is_some() {
        out.error = Some("Asset has a pending proposal. Resolve it before publishing.".to_string());
        return out;
    }

    let Some(current) = current else {
        // First contract for this asset.
        out.suggested_version = Some(covenant_core::INITIAL_VERSION.to_string());
        out.reason = Some("First contract for this asset".to_string());
        if dry_run {
            out.status = "will_publish".to_string();
            return out;
        }
        return apply_publish(state, item, publisher, false, out).await;
    };
    out.current_version = Some(current.version.clone());

    let report = match diff_schemas(&current.schema, &item.schema, current.compatibility_mode) {
        Ok(report) => report,
        Err(e) => {
            out.error = Some(format!("Stored contract could not be parsed: {e}"));
            return out;
        }
    };

    if !report.has_changes() {
        out.status = if dry_run { "will_skip" } else { "skipped" }.to_string();
        out.reason = Some("No schema changes detected".to_string());
        return out;
    }

    out.suggested_version = Some(next_version(
        Some(current.version.as_str()),
        report.is_compatible(),
        report.change_type,
    ));

    if report.is_compatible() {
        out.reason = Some(format!("Compatible {} change", report.change_type));
        if dry_run {
            out.status = "will_publish".to_string();
            return out;
        }
        return apply_publish(state, item, publisher, false, out).await;
    }

    // Breaking change.
    out.breaking_changes = report.breaking_as_values();
    if dry_run {
        out.status = "breaking".to_string();
        out.reason = Some(format!(
            "Breaking change: {} incompatible modification(s)",
            out.breaking_changes.len()
        ));
        return out;
    }
    if !create_proposals_for_breaking {
        out.error = Some(
            "Breaking change requires proposal. \
             Use create_proposals_for_breaking=true or resolve manually."
                .to_string(),
        );
        return out;
    }
    apply_publish(state, item, publisher, true, out).await
}

/// Run the real publish coordinator for one item and map its outcome.
async fn apply_publish(
    state: &AppState,
    item: &BulkContractItem,
    publisher: TeamId,
    expect_proposal: bool,
    mut out: BulkItemResult,
) -> BulkItemResult {
    let request = PublishContractRequest {
        asset_id: item.asset_id,
        schema: item.schema.clone(),
        version: None,
        compatibility_mode: item.compatibility_mode,
        guarantees: item.guarantees.clone(),
        publisher,
        force: false,
    };
    match publish_contract(state, request).await {
        Ok(PublishOutcome {
            action: PublishAction::ProposalOpened,
            proposal,
            breaking_changes,
            ..
        }) => {
            out.status = "proposal_created".to_string();
            out.proposal_id = proposal.map(|p| p.proposal_id);
            out.breaking_changes = breaking_changes;
            out.reason = Some("Breaking change: proposal created".to_string());
            out
        }
        Ok(outcome) => {
            out.status = "published".to_string();
            out.contract_id = outcome.contract.as_ref().map(|c| c.contract_id);
            if expect_proposal {
                // The asset moved between preflight and publish; report
                // what actually happened.
                out.reason = Some("Published without proposal after re-evaluation".to_string());
            }
            out
        }
        Err(e) => {
            out.error = Some(e.to_string());
            out
        }
    }
}
