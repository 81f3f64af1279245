//! Impact analysis: a pure read over the differ, the registrations and
//! the downstream dependency graph. No writes, no audit events.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use covenant_core::{
    Asset, AssetId, ChangeType, DependencyKind, RegistrationStatus, TeamId,
};
use covenant_diff::{diff_schemas, Change, DiffReport, SchemaNode};
use covenant_storage::StoreTx;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Ceiling on downstream assets returned from lineage traversal. Wide
/// graphs get cut off and flagged rather than ballooning the response.
pub const MAX_LINEAGE_RESULTS: usize = 500;

/// A consumer team affected by a proposed change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct ImpactedConsumer {
    #[schema(value_type = String, format = "uuid")]
    pub team_id: TeamId,
    pub team_name: String,
    pub status: RegistrationStatus,
    pub pinned_version: Option<String>,
    /// 0 for direct consumers of the analysed asset, 1+ for downstream.
    pub depth: usize,
}

/// A downstream asset reached through the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct ImpactedAsset {
    #[schema(value_type = String, format = "uuid")]
    pub asset_id: AssetId,
    pub fqn: String,
    pub dependency_kind: DependencyKind,
    pub depth: usize,
}

/// The full impact report for a proposed schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[derive(utoipa::ToSchema)]
pub struct ImpactReport {
    pub change_type: ChangeType,
    #[schema(value_type = Vec<Object>)]
    pub breaking_changes: Vec<Change>,
    pub impacted_consumers: Vec<ImpactedConsumer>,
    pub impacted_assets: Vec<ImpactedAsset>,
    pub safe_to_publish: bool,
    pub traversal_depth: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Whether a schema document constrains anything at all. An empty first
/// contract is a patch; a real one is a major event for the asset.
fn schema_is_nonempty(node: &SchemaNode) -> bool {
    !node.types.is_empty()
        || !node.properties.is_empty()
        || node.items.is_some()
        || node.enum_values.is_some()
}

/// Analyze the impact of publishing `proposed_schema` on an asset.
///
/// Idempotent: repeated calls with identical inputs yield identical
/// output.
pub async fn analyze_impact(
    state: &AppState,
    asset_id: AssetId,
    proposed_schema: &Value,
    depth: usize,
) -> ApiResult<ImpactReport> {
    let proposed_node = SchemaNode::parse(proposed_schema)
        .map_err(|e| ApiError::validation(format!("Invalid schema: {e}")))?;
    let depth = depth.clamp(1, state.config.impact_depth_max);

    let mut tx = state.store.begin().await?;
    let asset = tx
        .asset_get(asset_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Asset {asset_id} not found")))?;

    let Some(current) = tx.contract_active_for_asset(asset_id).await? else {
        let change_type = if schema_is_nonempty(&proposed_node) {
            ChangeType::Major
        } else {
            ChangeType::Patch
        };
        tx.rollback().await?;
        return Ok(ImpactReport {
            change_type,
            breaking_changes: Vec::new(),
            impacted_consumers: Vec::new(),
            impacted_assets: Vec::new(),
            safe_to_publish: true,
            traversal_depth: depth,
            truncated: false,
        });
    };

    let report: DiffReport = diff_schemas(&current.schema, proposed_schema, current.compatibility_mode)
        .map_err(|e| ApiError::broken_contract(e.to_string()))?;

    let (downstream, truncated) = downstream_assets(&mut *tx, &asset, depth).await?;
    let impacted_consumers = collect_consumers(&mut *tx, &asset, &downstream).await?;
    tx.rollback().await?;

    let impacted_assets = downstream
        .iter()
        .map(|(asset, kind, depth)| ImpactedAsset {
            asset_id: asset.asset_id,
            fqn: asset.fqn.clone(),
            dependency_kind: *kind,
            depth: *depth,
        })
        .collect();

    let safe_to_publish = report.breaking.is_empty();
    Ok(ImpactReport {
        change_type: report.change_type,
        breaking_changes: report.breaking,
        impacted_consumers,
        impacted_assets,
        safe_to_publish,
        traversal_depth: depth,
        truncated,
    })
}

/// Breadth-first traversal of the downstream graph with cycle detection.
async fn downstream_assets(
    tx: &mut dyn StoreTx,
    root: &Asset,
    max_depth: usize,
) -> ApiResult<(Vec<(Asset, DependencyKind, usize)>, bool)> {
    let mut visited: HashSet<AssetId> = HashSet::from([root.asset_id]);
    let mut results: Vec<(Asset, DependencyKind, usize)> = Vec::new();
    let mut frontier = vec![root.asset_id];
    let mut truncated = false;

    'levels: for depth in 1..=max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for upstream in frontier.drain(..) {
            for edge in tx.dependencies_downstream_of(upstream).await? {
                if !visited.insert(edge.downstream_asset_id) {
                    continue;
                }
                let Some(asset) = tx.asset_get(edge.downstream_asset_id).await? else {
                    continue;
                };
                results.push((asset, edge.kind, depth));
                next.push(edge.downstream_asset_id);
                if results.len() >= MAX_LINEAGE_RESULTS {
                    truncated = true;
                    break 'levels;
                }
            }
        }
        frontier = next;
    }

    Ok((results, truncated))
}

/// Active registrations on the root and every downstream asset, with the
/// consumer team deduplicated at its shallowest depth.
async fn collect_consumers(
    tx: &mut dyn StoreTx,
    root: &Asset,
    downstream: &[(Asset, DependencyKind, usize)],
) -> ApiResult<Vec<ImpactedConsumer>> {
    let mut by_team: HashMap<TeamId, ImpactedConsumer> = HashMap::new();
    let mut targets: Vec<(AssetId, usize)> = vec![(root.asset_id, 0)];
    targets.extend(downstream.iter().map(|(a, _, d)| (a.asset_id, *d)));

    for (asset_id, depth) in targets {
        for registration in tx.registrations_active_for_asset(asset_id).await? {
            if by_team.contains_key(&registration.consumer_team_id) {
                continue;
            }
            let Some(team) = tx.team_get(registration.consumer_team_id).await? else {
                continue;
            };
            by_team.insert(
                registration.consumer_team_id,
                ImpactedConsumer {
                    team_id: registration.consumer_team_id,
                    team_name: team.name,
                    status: registration.status,
                    pinned_version: registration.pinned_version,
                    depth,
                },
            );
        }
    }

    let mut consumers: Vec<ImpactedConsumer> = by_team.into_values().collect();
    consumers.sort_by(|a, b| (a.depth, a.team_id).cmp(&(b.depth, b.team_id)));
    Ok(consumers)
}
