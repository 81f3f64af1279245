//! End-to-end coverage of the publish coordinator and proposal lifecycle
//! on the in-memory store with deterministic clock and IDs.

use std::sync::Arc;

use covenant_api::services::{
    acknowledge, analyze_impact, bulk_publish, force_approve, publish_contract, publish_proposal,
    withdraw, BulkContractItem, PublishAction, PublishContractRequest,
};
use covenant_api::{ApiConfig, AppState, ErrorCode, NoopNotifier};
use covenant_core::{
    AckResponse, AuditAction, AuditFilter, ChangeType, ContractStatus, EntityIdType, EntityType,
    ProposalStatus,
};
use covenant_storage::{Store, StoreTx};
use covenant_test_utils::{
    asset, registration, schema_breaking_id_string, schema_v1, schema_with_optional_name, team,
    test_clock, Asset, SequentialIdGen, Team,
};

fn test_state() -> AppState {
    let store: Arc<dyn Store> = Arc::new(covenant_test_utils::MemoryStore::new());
    AppState::new(
        store,
        Arc::new(test_clock()),
        Arc::new(SequentialIdGen::new()),
        Arc::new(NoopNotifier),
        ApiConfig::default(),
    )
}

/// One producer team, two consumer teams, one asset with both consumers
/// actively registered.
async fn seed(state: &AppState) -> (Team, Team, Team, Asset) {
    let ids = state.ids.as_ref();
    let producer = team(ids, "Producers");
    let c1 = team(ids, "Consumer One");
    let c2 = team(ids, "Consumer Two");
    let orders = asset(ids, "warehouse.orders", producer.team_id);

    let mut tx = state.store.begin().await.unwrap();
    tx.team_insert(&producer).await.unwrap();
    tx.team_insert(&c1).await.unwrap();
    tx.team_insert(&c2).await.unwrap();
    tx.asset_insert(&orders).await.unwrap();
    tx.registration_insert(&registration(ids, orders.asset_id, c1.team_id))
        .await
        .unwrap();
    tx.registration_insert(&registration(ids, orders.asset_id, c2.team_id))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    (producer, c1, c2, orders)
}

fn publish_request(
    asset: &Asset,
    producer: &Team,
    schema: serde_json::Value,
    version: Option<&str>,
) -> PublishContractRequest {
    PublishContractRequest {
        asset_id: asset.asset_id,
        schema,
        version: version.map(str::to_string),
        compatibility_mode: None,
        guarantees: None,
        publisher: producer.team_id,
        force: false,
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn first_publish_activates_contract() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    let outcome = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    assert_eq!(outcome.action, PublishAction::Published);
    let contract = outcome.contract.expect("contract published");
    assert_eq!(contract.version, "1.0.0");
    assert_eq!(contract.status, ContractStatus::Active);

    let mut tx = state.store.begin().await.unwrap();
    let stored_asset = tx.asset_get(orders.asset_id).await.unwrap().unwrap();
    assert_eq!(stored_asset.current_contract_id, Some(contract.contract_id));

    let events = tx
        .audit_query(
            &AuditFilter {
                entity_type: Some(EntityType::Contract),
                entity_id: Some(contract.contract_id.as_uuid()),
                ..Default::default()
            },
            None,
            50,
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::ContractPublished);
}

#[tokio::test]
async fn compatible_addition_auto_publishes_as_minor() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    let first = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let first_contract = first.contract.unwrap();

    let outcome = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_with_optional_name(), Some("1.1.0")),
    )
    .await
    .unwrap();

    assert_eq!(outcome.action, PublishAction::Published);
    assert_eq!(outcome.change_type, Some(ChangeType::Minor));
    let second_contract = outcome.contract.unwrap();

    let mut tx = state.store.begin().await.unwrap();
    let old = tx
        .contract_get(first_contract.contract_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(old.status, ContractStatus::Deprecated);
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.contract_id, second_contract.contract_id);

    // Deprecation and publication audits, atomically with the swap.
    let events = tx
        .audit_query(&AuditFilter::default(), None, 100)
        .await
        .unwrap();
    let actions: Vec<AuditAction> = events.iter().map(|e| e.action).collect();
    assert!(actions.contains(&AuditAction::ContractDeprecated));
    assert!(actions.contains(&AuditAction::ContractPublished));
}

#[tokio::test]
async fn breaking_change_opens_proposal() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    let outcome = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap();

    assert_eq!(outcome.action, PublishAction::ProposalOpened);
    assert!(outcome.contract.is_none());
    let proposal = outcome.proposal.expect("proposal opened");
    assert_eq!(proposal.status, ProposalStatus::Pending);
    assert_eq!(proposal.change_type, ChangeType::Major);
    assert_eq!(proposal.breaking_changes.len(), 1);
    assert_eq!(proposal.breaking_changes[0]["kind"], "type_changed");
    assert_eq!(proposal.breaking_changes[0]["path"], "$.properties.id");

    let mut snapshot = proposal.pending_consumers.clone();
    snapshot.sort();
    let mut expected = vec![c1.team_id, c2.team_id];
    expected.sort();
    assert_eq!(snapshot, expected);

    // No contract change happened.
    let mut tx = state.store.begin().await.unwrap();
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.version, "1.0.0");
}

#[tokio::test]
async fn concurrent_second_publish_is_rejected_while_pending() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap();

    let err = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_with_optional_name(), Some("1.1.0")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn blocking_ack_rejects_proposal_and_publish_fails() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    let (_, after_c1) = acknowledge(
        &state,
        proposal.proposal_id,
        c1.team_id,
        AckResponse::Approved,
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(after_c1.status, ProposalStatus::Pending);

    let (_, after_c2) = acknowledge(
        &state,
        proposal.proposal_id,
        c2.team_id,
        AckResponse::Blocked,
        None,
        Some("We still read this column hourly".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(after_c2.status, ProposalStatus::Rejected);
    assert!(after_c2.resolved_at.is_some());

    // The base contract stays active and publish on the proposal fails.
    let err = publish_proposal(&state, proposal.proposal_id, producer.team_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    let mut tx = state.store.begin().await.unwrap();
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.version, "1.0.0");
}

#[tokio::test]
async fn full_approval_then_explicit_publish() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    acknowledge(
        &state,
        proposal.proposal_id,
        c1.team_id,
        AckResponse::Approved,
        None,
        None,
    )
    .await
    .unwrap();
    let (_, approved) = acknowledge(
        &state,
        proposal.proposal_id,
        c2.team_id,
        AckResponse::Migrating,
        Some(covenant_test_utils::test_epoch() + chrono::Duration::days(30)),
        None,
    )
    .await
    .unwrap();
    assert_eq!(approved.status, ProposalStatus::Approved);

    // Approval never auto-publishes; the contract is still v1.
    let mut tx = state.store.begin().await.unwrap();
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.version, "1.0.0");
    drop(tx);

    let (contract, published) =
        publish_proposal(&state, proposal.proposal_id, producer.team_id, None)
            .await
            .unwrap();
    assert_eq!(published.status, ProposalStatus::Published);
    assert_eq!(contract.version, "2.0.0");
    assert_eq!(contract.status, ContractStatus::Active);

    let mut tx = state.store.begin().await.unwrap();
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.contract_id, contract.contract_id);
}

#[tokio::test]
async fn stale_approved_proposal_is_rejected_on_publish() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    acknowledge(&state, proposal.proposal_id, c1.team_id, AckResponse::Approved, None, None)
        .await
        .unwrap();
    acknowledge(&state, proposal.proposal_id, c2.team_id, AckResponse::Approved, None, None)
        .await
        .unwrap();

    // A forced publish advances the asset underneath the proposal.
    let mut forced = publish_request(
        &orders,
        &producer,
        schema_with_optional_name(),
        Some("3.0.0"),
    );
    forced.force = true;
    let forced_outcome = publish_contract(&state, forced).await.unwrap();
    assert_eq!(forced_outcome.action, PublishAction::Published);

    let err = publish_proposal(&state, proposal.proposal_id, producer.team_id, Some("4.0.0".into()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    let mut tx = state.store.begin().await.unwrap();
    let stored = tx.proposal_get(proposal.proposal_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProposalStatus::Rejected);
}

// ============================================================================
// VERSIONING EDGE CASES
// ============================================================================

#[tokio::test]
async fn identical_schema_republish() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    // Same version: rejected, version must strictly increase.
    let err = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    // Auto version: publishes as a patch bump.
    let outcome = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), None),
    )
    .await
    .unwrap();
    assert_eq!(outcome.action, PublishAction::Published);
    assert!(outcome.version_auto_generated);
    assert_eq!(outcome.contract.unwrap().version, "1.0.1");
    assert_eq!(outcome.version_suggestion.change_type, ChangeType::Patch);
}

#[tokio::test]
async fn lower_version_is_rejected() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("2.0.0")),
    )
    .await
    .unwrap();
    let err = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_with_optional_name(), Some("1.9.0")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn malformed_version_is_rejected() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    let err = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("one-point-oh")),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
}

#[tokio::test]
async fn prerelease_skips_proposal_and_graduates() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    // Breaking change published as a pre-release: no proposal.
    let outcome = publish_contract(
        &state,
        publish_request(
            &orders,
            &producer,
            schema_breaking_id_string(),
            Some("2.0.0-alpha"),
        ),
    )
    .await
    .unwrap();
    assert_eq!(outcome.action, PublishAction::Published);
    assert!(outcome.message.unwrap().contains("Pre-release"));
    assert_eq!(outcome.breaking_changes.len(), 1);

    // Graduating alpha -> 2.0.0 with a still-breaking diff against the
    // alpha also skips the proposal.
    let graduated = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("2.0.0")),
    )
    .await
    .unwrap();
    assert_eq!(graduated.action, PublishAction::Published);
    assert!(graduated.message.unwrap().contains("Graduated"));

    let mut tx = state.store.begin().await.unwrap();
    let active = tx
        .contract_active_for_asset(orders.asset_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.version, "2.0.0");
}

// ============================================================================
// LIFECYCLE DETAILS
// ============================================================================

#[tokio::test]
async fn consumer_outside_snapshot_is_forbidden() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;
    let outsider = team(state.ids.as_ref(), "Latecomers");
    let mut tx = state.store.begin().await.unwrap();
    tx.team_insert(&outsider).await.unwrap();
    tx.commit().await.unwrap();

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    // Registering after the proposal opened does not join the snapshot.
    let mut tx = state.store.begin().await.unwrap();
    tx.registration_insert(&registration(
        state.ids.as_ref(),
        orders.asset_id,
        outsider.team_id,
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let err = acknowledge(
        &state,
        proposal.proposal_id,
        outsider.team_id,
        AckResponse::Blocked,
        None,
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[tokio::test]
async fn consumer_may_change_response_until_resolution() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    acknowledge(&state, proposal.proposal_id, c1.team_id, AckResponse::Migrating, None, None)
        .await
        .unwrap();
    // c1 reconsiders; still one acknowledgment row, latest response wins.
    acknowledge(&state, proposal.proposal_id, c1.team_id, AckResponse::Approved, None, None)
        .await
        .unwrap();

    let mut tx = state.store.begin().await.unwrap();
    let acks = tx.acks_for_proposal(proposal.proposal_id).await.unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].response, AckResponse::Approved);
    drop(tx);

    let (_, resolved) = acknowledge(
        &state,
        proposal.proposal_id,
        c2.team_id,
        AckResponse::Approved,
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(resolved.status, ProposalStatus::Approved);
}

#[tokio::test]
async fn withdraw_requires_proposer_or_admin() {
    let state = test_state();
    let (producer, c1, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    let err = withdraw(&state, proposal.proposal_id, c1.team_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Forbidden);

    let withdrawn = withdraw(&state, proposal.proposal_id, producer.team_id, false)
        .await
        .unwrap();
    assert_eq!(withdrawn.status, ProposalStatus::Withdrawn);
}

#[tokio::test]
async fn force_approve_records_unresolved_consumers() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    acknowledge(&state, proposal.proposal_id, c1.team_id, AckResponse::Approved, None, None)
        .await
        .unwrap();
    let forced = force_approve(&state, proposal.proposal_id, producer.team_id)
        .await
        .unwrap();
    assert_eq!(forced.status, ProposalStatus::Approved);

    let mut tx = state.store.begin().await.unwrap();
    let events = tx
        .audit_query(
            &AuditFilter {
                action: Some(AuditAction::ProposalForceApproved),
                ..Default::default()
            },
            None,
            10,
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    let unresolved = events[0].payload["unresolved_consumers"]
        .as_array()
        .unwrap();
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0], serde_json::json!(c2.team_id));
}

#[tokio::test]
async fn audit_log_reconstructs_proposal_history() {
    let state = test_state();
    let (producer, c1, c2, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();
    let proposal = publish_contract(
        &state,
        publish_request(&orders, &producer, schema_breaking_id_string(), Some("2.0.0")),
    )
    .await
    .unwrap()
    .proposal
    .unwrap();

    acknowledge(&state, proposal.proposal_id, c1.team_id, AckResponse::Approved, None, None)
        .await
        .unwrap();
    acknowledge(&state, proposal.proposal_id, c2.team_id, AckResponse::Blocked, None, None)
        .await
        .unwrap();

    let mut tx = state.store.begin().await.unwrap();
    let mut events = tx
        .audit_query(
            &AuditFilter {
                entity_type: Some(EntityType::Proposal),
                entity_id: Some(proposal.proposal_id.as_uuid()),
                ..Default::default()
            },
            None,
            100,
        )
        .await
        .unwrap();
    // Replay oldest-first and derive the final state.
    events.reverse();
    let mut status = None;
    for event in &events {
        status = Some(match event.action {
            AuditAction::ProposalOpened => ProposalStatus::Pending,
            AuditAction::ProposalAcknowledged => status.unwrap_or(ProposalStatus::Pending),
            AuditAction::ProposalApproved | AuditAction::ProposalForceApproved => {
                ProposalStatus::Approved
            }
            AuditAction::ProposalRejected => ProposalStatus::Rejected,
            AuditAction::ProposalWithdrawn => ProposalStatus::Withdrawn,
            AuditAction::ProposalPublished => ProposalStatus::Published,
            _ => continue,
        });
    }

    let stored = tx.proposal_get(proposal.proposal_id).await.unwrap().unwrap();
    assert_eq!(status, Some(stored.status));
    assert_eq!(stored.status, ProposalStatus::Rejected);
}

// ============================================================================
// IMPACT & BULK
// ============================================================================

#[tokio::test]
async fn impact_analysis_is_pure_and_idempotent() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    let schema = schema_breaking_id_string();
    let first = analyze_impact(&state, orders.asset_id, &schema, 3).await.unwrap();
    let second = analyze_impact(&state, orders.asset_id, &schema, 3).await.unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(!first.safe_to_publish);
    assert_eq!(first.change_type, ChangeType::Major);
    assert_eq!(first.impacted_consumers.len(), 2);

    // A pure read: no audit events beyond the publish's own.
    let mut tx = state.store.begin().await.unwrap();
    let events = tx
        .audit_query(&AuditFilter::default(), None, 100)
        .await
        .unwrap();
    assert!(events
        .iter()
        .all(|e| e.entity_type != EntityType::Proposal));
    // Seeding writes no audit rows; the single publish wrote exactly one.
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn impact_traverses_downstream_dependencies() {
    let state = test_state();
    let (producer, c1, _, orders) = seed(&state).await;
    let ids = state.ids.as_ref();

    // orders -> enriched_orders, consumed by a third team.
    let downstream_team = team(ids, "Downstream Analytics");
    let enriched = asset(ids, "warehouse.enriched_orders", downstream_team.team_id);
    let mut tx = state.store.begin().await.unwrap();
    tx.team_insert(&downstream_team).await.unwrap();
    tx.asset_insert(&enriched).await.unwrap();
    tx.dependency_insert(&covenant_test_utils::dependency(
        ids,
        orders.asset_id,
        enriched.asset_id,
    ))
    .await
    .unwrap();
    tx.registration_insert(&registration(ids, enriched.asset_id, downstream_team.team_id))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    let report = analyze_impact(&state, orders.asset_id, &schema_breaking_id_string(), 3)
        .await
        .unwrap();

    assert_eq!(report.impacted_assets.len(), 1);
    assert_eq!(report.impacted_assets[0].fqn, "warehouse.enriched_orders");
    assert_eq!(report.impacted_assets[0].depth, 1);

    let teams: Vec<_> = report
        .impacted_consumers
        .iter()
        .map(|c| c.team_id)
        .collect();
    assert!(teams.contains(&c1.team_id));
    assert!(teams.contains(&downstream_team.team_id));
}

#[tokio::test]
async fn bulk_publish_dry_run_previews_everything() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;
    let untouched = asset(state.ids.as_ref(), "warehouse.customers", producer.team_id);
    let mut tx = state.store.begin().await.unwrap();
    tx.asset_insert(&untouched).await.unwrap();
    tx.commit().await.unwrap();

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    let items = vec![
        // Unchanged schema: will_skip.
        BulkContractItem {
            asset_id: orders.asset_id,
            schema: schema_v1(),
            compatibility_mode: None,
            guarantees: None,
        },
        // First contract for the other asset: will_publish.
        BulkContractItem {
            asset_id: untouched.asset_id,
            schema: schema_v1(),
            compatibility_mode: None,
            guarantees: None,
        },
    ];

    let result = bulk_publish(&state, items, producer.team_id, true, false)
        .await
        .unwrap();
    assert!(result.preview);
    assert_eq!(result.total, 2);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.published, 1);
    assert_eq!(result.results[0].status, "will_skip");
    assert_eq!(result.results[1].status, "will_publish");

    // Dry run wrote nothing.
    let mut tx = state.store.begin().await.unwrap();
    assert!(tx
        .contract_active_for_asset(untouched.asset_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn bulk_publish_applies_and_opens_proposals() {
    let state = test_state();
    let (producer, _, _, orders) = seed(&state).await;

    publish_contract(
        &state,
        publish_request(&orders, &producer, schema_v1(), Some("1.0.0")),
    )
    .await
    .unwrap();

    let items = vec![BulkContractItem {
        asset_id: orders.asset_id,
        schema: schema_breaking_id_string(),
        compatibility_mode: None,
        guarantees: None,
    }];
    let result = bulk_publish(&state, items, producer.team_id, false, true)
        .await
        .unwrap();
    assert_eq!(result.proposals_created, 1);
    assert_eq!(result.results[0].status, "proposal_created");
    assert!(result.results[0].proposal_id.is_some());
}
