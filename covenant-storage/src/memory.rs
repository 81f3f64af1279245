//! In-memory store backend.
//!
//! The whole state sits behind one `tokio` mutex; a transaction owns the
//! guard and mutates a working copy, committing by swapping it in. That
//! makes every transaction trivially serializable, which is exactly the
//! isolation level the coordination core asks for. Suitable for tests and
//! single-node deployments; multi-node setups use `covenant-pg`.

use crate::{Store, StoreResult, StoreTx};
use async_trait::async_trait;
use covenant_core::{
    Acknowledgment, AcknowledgmentId, ApiKey, ApiKeyId, Asset, AssetDependency, AssetFilter,
    AssetId, AuditCursor, AuditEvent, AuditFilter, Contract, ContractId, ContractStatus,
    DependencyId, EntityIdType, EntityType, KeyHash, Page, Proposal, ProposalFilter, ProposalId,
    ProposalStatus, Registration, RegistrationFilter, RegistrationId, RegistrationStatus,
    StoreError, Team, TeamId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    teams: BTreeMap<Uuid, Team>,
    assets: BTreeMap<Uuid, Asset>,
    contracts: BTreeMap<Uuid, Contract>,
    registrations: BTreeMap<Uuid, Registration>,
    proposals: BTreeMap<Uuid, Proposal>,
    acknowledgments: BTreeMap<Uuid, Acknowledgment>,
    dependencies: BTreeMap<Uuid, AssetDependency>,
    api_keys: BTreeMap<Uuid, ApiKey>,
    audit_events: Vec<AuditEvent>,
}

/// In-memory [`Store`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn page_slice<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let page = page.clamped();
    let start = (page.offset as usize).min(items.len());
    let end = (start + page.limit as usize).min(items.len());
    items.drain(..start);
    items.truncate(end - start);
    items
}

#[async_trait]
impl StoreTx for MemoryTx {
    // === Teams ===

    async fn team_insert(&mut self, team: &Team) -> StoreResult<()> {
        for existing in self.working.teams.values() {
            if existing.deleted_at.is_none() {
                if existing.name == team.name {
                    return Err(StoreError::Duplicate {
                        entity_type: EntityType::Team,
                        field: "name",
                        value: team.name.clone(),
                    });
                }
                if existing.slug == team.slug {
                    return Err(StoreError::Duplicate {
                        entity_type: EntityType::Team,
                        field: "slug",
                        value: team.slug.clone(),
                    });
                }
            }
        }
        self.working
            .teams
            .insert(team.team_id.as_uuid(), team.clone());
        Ok(())
    }

    async fn team_get(&mut self, id: TeamId) -> StoreResult<Option<Team>> {
        Ok(self
            .working
            .teams
            .get(&id.as_uuid())
            .filter(|t| t.deleted_at.is_none())
            .cloned())
    }

    async fn team_get_by_slug(&mut self, slug: &str) -> StoreResult<Option<Team>> {
        Ok(self
            .working
            .teams
            .values()
            .find(|t| t.slug == slug && t.deleted_at.is_none())
            .cloned())
    }

    async fn team_update(&mut self, team: &Team) -> StoreResult<()> {
        let key = team.team_id.as_uuid();
        if !self.working.teams.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Team,
                id: key,
            });
        }
        self.working.teams.insert(key, team.clone());
        Ok(())
    }

    async fn team_list(&mut self, page: Page) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .working
            .teams
            .values()
            .filter(|t| t.deleted_at.is_none())
            .cloned()
            .collect();
        teams.sort_by(|a, b| (a.created_at, a.team_id).cmp(&(b.created_at, b.team_id)));
        Ok(page_slice(teams, page))
    }

    // === Assets ===

    async fn asset_insert(&mut self, asset: &Asset) -> StoreResult<()> {
        for existing in self.working.assets.values() {
            if existing.deleted_at.is_none() && existing.fqn == asset.fqn {
                return Err(StoreError::Duplicate {
                    entity_type: EntityType::Asset,
                    field: "fqn",
                    value: asset.fqn.clone(),
                });
            }
        }
        self.working
            .assets
            .insert(asset.asset_id.as_uuid(), asset.clone());
        Ok(())
    }

    async fn asset_get(&mut self, id: AssetId) -> StoreResult<Option<Asset>> {
        Ok(self
            .working
            .assets
            .get(&id.as_uuid())
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn asset_get_by_fqn(&mut self, fqn: &str) -> StoreResult<Option<Asset>> {
        Ok(self
            .working
            .assets
            .values()
            .find(|a| a.fqn == fqn && a.deleted_at.is_none())
            .cloned())
    }

    async fn asset_update(&mut self, asset: &Asset) -> StoreResult<()> {
        let key = asset.asset_id.as_uuid();
        if !self.working.assets.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Asset,
                id: key,
            });
        }
        self.working.assets.insert(key, asset.clone());
        Ok(())
    }

    async fn asset_list(&mut self, filter: &AssetFilter, page: Page) -> StoreResult<Vec<Asset>> {
        let mut assets: Vec<Asset> = self
            .working
            .assets
            .values()
            .filter(|a| a.deleted_at.is_none())
            .filter(|a| filter.owner_team_id.map_or(true, |t| a.owner_team_id == t))
            .filter(|a| filter.resource_type.map_or(true, |r| a.resource_type == r))
            .filter(|a| {
                filter
                    .fqn_contains
                    .as_ref()
                    .map_or(true, |needle| a.fqn.contains(needle))
            })
            .cloned()
            .collect();
        assets.sort_by(|a, b| (a.created_at, a.asset_id).cmp(&(b.created_at, b.asset_id)));
        Ok(page_slice(assets, page))
    }

    async fn lock_asset(&mut self, id: AssetId) -> StoreResult<()> {
        // The store-wide mutex already serialises writers; what remains is
        // surfacing missing assets the way a row lock would.
        if self.asset_get(id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Asset,
                id: id.as_uuid(),
            });
        }
        Ok(())
    }

    // === Contracts ===

    async fn contract_insert(&mut self, contract: &Contract) -> StoreResult<()> {
        let duplicate = self.working.contracts.values().any(|c| {
            c.asset_id == contract.asset_id && c.version == contract.version
        });
        if duplicate {
            return Err(StoreError::Duplicate {
                entity_type: EntityType::Contract,
                field: "version",
                value: contract.version.clone(),
            });
        }
        self.working
            .contracts
            .insert(contract.contract_id.as_uuid(), contract.clone());
        Ok(())
    }

    async fn contract_get(&mut self, id: ContractId) -> StoreResult<Option<Contract>> {
        Ok(self.working.contracts.get(&id.as_uuid()).cloned())
    }

    async fn contract_update(&mut self, contract: &Contract) -> StoreResult<()> {
        let key = contract.contract_id.as_uuid();
        if !self.working.contracts.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Contract,
                id: key,
            });
        }
        self.working.contracts.insert(key, contract.clone());
        Ok(())
    }

    async fn contract_active_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Option<Contract>> {
        let mut active: Vec<&Contract> = self
            .working
            .contracts
            .values()
            .filter(|c| c.asset_id == asset_id && c.status == ContractStatus::Active)
            .collect();
        active.sort_by_key(|c| c.published_at);
        Ok(active.last().map(|c| (*c).clone()))
    }

    async fn contract_by_version(
        &mut self,
        asset_id: AssetId,
        version: &str,
    ) -> StoreResult<Option<Contract>> {
        Ok(self
            .working
            .contracts
            .values()
            .find(|c| c.asset_id == asset_id && c.version == version)
            .cloned())
    }

    async fn contract_list_for_asset(
        &mut self,
        asset_id: AssetId,
        page: Page,
    ) -> StoreResult<Vec<Contract>> {
        let mut contracts: Vec<Contract> = self
            .working
            .contracts
            .values()
            .filter(|c| c.asset_id == asset_id)
            .cloned()
            .collect();
        contracts.sort_by(|a, b| {
            (b.published_at, b.contract_id).cmp(&(a.published_at, a.contract_id))
        });
        Ok(page_slice(contracts, page))
    }

    // === Registrations ===

    async fn registration_insert(&mut self, registration: &Registration) -> StoreResult<()> {
        self.working
            .registrations
            .insert(registration.registration_id.as_uuid(), registration.clone());
        Ok(())
    }

    async fn registration_get(&mut self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        Ok(self.working.registrations.get(&id.as_uuid()).cloned())
    }

    async fn registration_update(&mut self, registration: &Registration) -> StoreResult<()> {
        let key = registration.registration_id.as_uuid();
        if !self.working.registrations.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Registration,
                id: key,
            });
        }
        self.working.registrations.insert(key, registration.clone());
        Ok(())
    }

    async fn registration_list(
        &mut self,
        filter: &RegistrationFilter,
        page: Page,
    ) -> StoreResult<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .working
            .registrations
            .values()
            .filter(|r| filter.asset_id.map_or(true, |a| r.asset_id == a))
            .filter(|r| {
                filter
                    .consumer_team_id
                    .map_or(true, |t| r.consumer_team_id == t)
            })
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        registrations.sort_by(|a, b| {
            (a.registered_at, a.registration_id).cmp(&(b.registered_at, b.registration_id))
        });
        Ok(page_slice(registrations, page))
    }

    async fn registrations_active_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<Registration>> {
        let live_team = |team_id: TeamId| {
            self.working
                .teams
                .get(&team_id.as_uuid())
                .map_or(false, |t| t.deleted_at.is_none())
        };
        let mut registrations: Vec<Registration> = self
            .working
            .registrations
            .values()
            .filter(|r| {
                r.asset_id == asset_id
                    && r.status == RegistrationStatus::Active
                    && live_team(r.consumer_team_id)
            })
            .cloned()
            .collect();
        registrations.sort_by(|a, b| {
            (a.registered_at, a.registration_id).cmp(&(b.registered_at, b.registration_id))
        });
        Ok(registrations)
    }

    // === Proposals ===

    async fn proposal_insert(&mut self, proposal: &Proposal) -> StoreResult<()> {
        if proposal.status == ProposalStatus::Pending {
            let pending_exists = self.working.proposals.values().any(|p| {
                p.asset_id == proposal.asset_id && p.status == ProposalStatus::Pending
            });
            if pending_exists {
                return Err(StoreError::PendingProposalExists {
                    asset_id: proposal.asset_id.as_uuid(),
                });
            }
        }
        self.working
            .proposals
            .insert(proposal.proposal_id.as_uuid(), proposal.clone());
        Ok(())
    }

    async fn proposal_get(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        Ok(self.working.proposals.get(&id.as_uuid()).cloned())
    }

    async fn proposal_update(&mut self, proposal: &Proposal) -> StoreResult<()> {
        let key = proposal.proposal_id.as_uuid();
        if !self.working.proposals.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Proposal,
                id: key,
            });
        }
        self.working.proposals.insert(key, proposal.clone());
        Ok(())
    }

    async fn proposal_list(
        &mut self,
        filter: &ProposalFilter,
        page: Page,
    ) -> StoreResult<Vec<Proposal>> {
        let mut proposals: Vec<Proposal> = self
            .working
            .proposals
            .values()
            .filter(|p| filter.asset_id.map_or(true, |a| p.asset_id == a))
            .filter(|p| filter.status.map_or(true, |s| p.status == s))
            .filter(|p| filter.proposed_by.map_or(true, |t| p.proposed_by == t))
            .cloned()
            .collect();
        proposals.sort_by(|a, b| (b.proposed_at, b.proposal_id).cmp(&(a.proposed_at, a.proposal_id)));
        Ok(page_slice(proposals, page))
    }

    async fn proposal_pending_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Option<Proposal>> {
        Ok(self
            .working
            .proposals
            .values()
            .find(|p| p.asset_id == asset_id && p.status == ProposalStatus::Pending)
            .cloned())
    }

    // === Acknowledgments ===

    async fn ack_upsert(&mut self, ack: &Acknowledgment) -> StoreResult<()> {
        let replaced: Option<Uuid> = self
            .working
            .acknowledgments
            .values()
            .find(|a| {
                a.proposal_id == ack.proposal_id && a.consumer_team_id == ack.consumer_team_id
            })
            .map(|a| a.ack_id.as_uuid());
        if let Some(key) = replaced {
            self.working.acknowledgments.remove(&key);
        }
        self.working
            .acknowledgments
            .insert(ack.ack_id.as_uuid(), ack.clone());
        Ok(())
    }

    async fn ack_get(&mut self, id: AcknowledgmentId) -> StoreResult<Option<Acknowledgment>> {
        Ok(self.working.acknowledgments.get(&id.as_uuid()).cloned())
    }

    async fn acks_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Vec<Acknowledgment>> {
        let mut acks: Vec<Acknowledgment> = self
            .working
            .acknowledgments
            .values()
            .filter(|a| a.proposal_id == proposal_id)
            .cloned()
            .collect();
        acks.sort_by(|a, b| (a.responded_at, a.ack_id).cmp(&(b.responded_at, b.ack_id)));
        Ok(acks)
    }

    // === Dependencies ===

    async fn dependency_insert(&mut self, dependency: &AssetDependency) -> StoreResult<()> {
        self.working
            .dependencies
            .insert(dependency.dependency_id.as_uuid(), dependency.clone());
        Ok(())
    }

    async fn dependency_get(&mut self, id: DependencyId) -> StoreResult<Option<AssetDependency>> {
        Ok(self
            .working
            .dependencies
            .get(&id.as_uuid())
            .filter(|d| d.deleted_at.is_none())
            .cloned())
    }

    async fn dependency_update(&mut self, dependency: &AssetDependency) -> StoreResult<()> {
        let key = dependency.dependency_id.as_uuid();
        if !self.working.dependencies.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Dependency,
                id: key,
            });
        }
        self.working.dependencies.insert(key, dependency.clone());
        Ok(())
    }

    async fn dependencies_downstream_of(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<AssetDependency>> {
        let mut edges: Vec<AssetDependency> = self
            .working
            .dependencies
            .values()
            .filter(|d| d.upstream_asset_id == asset_id && d.deleted_at.is_none())
            .cloned()
            .collect();
        edges.sort_by(|a, b| (a.created_at, a.dependency_id).cmp(&(b.created_at, b.dependency_id)));
        Ok(edges)
    }

    // === API keys ===

    async fn api_key_insert(&mut self, key: &ApiKey) -> StoreResult<()> {
        self.working
            .api_keys
            .insert(key.api_key_id.as_uuid(), key.clone());
        Ok(())
    }

    async fn api_key_get(&mut self, id: ApiKeyId) -> StoreResult<Option<ApiKey>> {
        Ok(self.working.api_keys.get(&id.as_uuid()).cloned())
    }

    async fn api_key_find_by_hash(&mut self, hash: &KeyHash) -> StoreResult<Option<ApiKey>> {
        Ok(self
            .working
            .api_keys
            .values()
            .find(|k| &k.key_hash == hash && k.revoked_at.is_none())
            .cloned())
    }

    async fn api_key_update(&mut self, key: &ApiKey) -> StoreResult<()> {
        let id = key.api_key_id.as_uuid();
        if !self.working.api_keys.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity_type: EntityType::ApiKey,
                id,
            });
        }
        self.working.api_keys.insert(id, key.clone());
        Ok(())
    }

    async fn api_key_list_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .working
            .api_keys
            .values()
            .filter(|k| k.team_id == team_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| (a.created_at, a.api_key_id).cmp(&(b.created_at, b.api_key_id)));
        Ok(keys)
    }

    // === Audit ===

    async fn append_audit(&mut self, event: &AuditEvent) -> StoreResult<()> {
        self.working.audit_events.push(event.clone());
        Ok(())
    }

    async fn audit_query(
        &mut self,
        filter: &AuditFilter,
        cursor: Option<AuditCursor>,
        limit: i64,
    ) -> StoreResult<Vec<AuditEvent>> {
        let mut events: Vec<AuditEvent> = self
            .working
            .audit_events
            .iter()
            .filter(|e| filter.entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| filter.entity_id.map_or(true, |id| e.entity_id == id))
            .filter(|e| filter.actor_id.map_or(true, |id| e.actor_id == Some(id)))
            .filter(|e| filter.action.map_or(true, |a| e.action == a))
            .filter(|e| filter.since.map_or(true, |t| e.occurred_at >= t))
            .filter(|e| filter.until.map_or(true, |t| e.occurred_at <= t))
            .cloned()
            .collect();
        // Newest first; the cursor points at the last row already seen.
        events.sort_by(|a, b| (b.occurred_at, b.event_id).cmp(&(a.occurred_at, a.event_id)));
        if let Some(cursor) = cursor {
            events.retain(|e| (e.occurred_at, e.event_id) < (cursor.occurred_at, cursor.event_id));
        }
        events.truncate(limit.clamp(1, 100) as usize);
        Ok(events)
    }

    // === Transaction control ===

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Dropping the guard discards the working copy.
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use covenant_core::{AuditAction, ResourceType};

    fn team(name: &str) -> Team {
        Team {
            team_id: TeamId::now_v7(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn asset(fqn: &str, owner: TeamId) -> Asset {
        Asset {
            asset_id: AssetId::now_v7(),
            fqn: fqn.to_string(),
            owner_team_id: owner,
            resource_type: ResourceType::Table,
            current_contract_id: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryStore::new();
        let t = team("Analytics");

        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&t).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let loaded = tx.team_get(t.team_id).await.unwrap();
        assert_eq!(loaded.unwrap().name, "Analytics");
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let t = team("Analytics");

        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&t).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.team_get(t.team_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_writes() {
        let store = MemoryStore::new();
        let t = team("Analytics");
        {
            let mut tx = store.begin().await.unwrap();
            tx.team_insert(&t).await.unwrap();
            // dropped here
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.team_get(t.team_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_team_name_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&team("Analytics")).await.unwrap();
        let err = tx.team_insert(&team("Analytics")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { field: "name", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_fqn_rejected_only_among_live() {
        let store = MemoryStore::new();
        let owner = team("Analytics");
        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&owner).await.unwrap();

        let mut first = asset("warehouse.orders", owner.team_id);
        tx.asset_insert(&first).await.unwrap();

        let second = asset("warehouse.orders", owner.team_id);
        assert!(matches!(
            tx.asset_insert(&second).await.unwrap_err(),
            StoreError::Duplicate { field: "fqn", .. }
        ));

        // Soft-deleting the first frees the name.
        first.deleted_at = Some(Utc::now());
        tx.asset_update(&first).await.unwrap();
        tx.asset_insert(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_deleted_asset_is_hidden() {
        let store = MemoryStore::new();
        let owner = team("Analytics");
        let mut a = asset("warehouse.orders", owner.team_id);

        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&owner).await.unwrap();
        tx.asset_insert(&a).await.unwrap();
        a.deleted_at = Some(Utc::now());
        tx.asset_update(&a).await.unwrap();

        assert!(tx.asset_get(a.asset_id).await.unwrap().is_none());
        assert!(tx.asset_get_by_fqn("warehouse.orders").await.unwrap().is_none());
        assert!(tx.lock_asset(a.asset_id).await.is_err());
        assert!(tx
            .asset_list(&AssetFilter::default(), Page::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_single_pending_proposal_per_asset() {
        let store = MemoryStore::new();
        let owner = team("Analytics");
        let a = asset("warehouse.orders", owner.team_id);

        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&owner).await.unwrap();
        tx.asset_insert(&a).await.unwrap();

        let proposal = |id: ProposalId| Proposal {
            proposal_id: id,
            asset_id: a.asset_id,
            base_contract_id: ContractId::now_v7(),
            proposed_schema: serde_json::json!({"type": "object"}),
            proposed_version: "2.0.0".into(),
            proposed_compatibility_mode: Default::default(),
            proposed_guarantees: None,
            breaking_changes: vec![],
            change_type: covenant_core::ChangeType::Major,
            status: ProposalStatus::Pending,
            pending_consumers: vec![],
            proposed_by: owner.team_id,
            proposed_at: Utc::now(),
            resolved_at: None,
        };

        tx.proposal_insert(&proposal(ProposalId::now_v7())).await.unwrap();
        let err = tx
            .proposal_insert(&proposal(ProposalId::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PendingProposalExists { .. }));
    }

    #[tokio::test]
    async fn test_ack_upsert_replaces_by_proposal_and_team() {
        let store = MemoryStore::new();
        let proposal_id = ProposalId::now_v7();
        let consumer = TeamId::now_v7();

        let ack = |response| Acknowledgment {
            ack_id: AcknowledgmentId::now_v7(),
            proposal_id,
            consumer_team_id: consumer,
            response,
            migration_deadline: None,
            notes: None,
            responded_at: Utc::now(),
        };

        let mut tx = store.begin().await.unwrap();
        tx.ack_upsert(&ack(covenant_core::AckResponse::Blocked)).await.unwrap();
        tx.ack_upsert(&ack(covenant_core::AckResponse::Approved)).await.unwrap();

        let acks = tx.acks_for_proposal(proposal_id).await.unwrap();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].response, covenant_core::AckResponse::Approved);
    }

    #[tokio::test]
    async fn test_audit_keyset_pagination() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        for i in 0..5 {
            let event = AuditEvent {
                event_id: covenant_core::AuditEventId::now_v7(),
                entity_type: EntityType::Contract,
                entity_id: Uuid::nil(),
                action: AuditAction::ContractPublished,
                actor_id: None,
                payload: serde_json::json!({"seq": i}),
                occurred_at: Utc::now(),
            };
            tx.append_audit(&event).await.unwrap();
        }

        let first_page = tx
            .audit_query(&AuditFilter::default(), None, 2)
            .await
            .unwrap();
        assert_eq!(first_page.len(), 2);
        // Newest first.
        assert!(first_page[0].occurred_at >= first_page[1].occurred_at);

        let cursor = AuditCursor {
            occurred_at: first_page[1].occurred_at,
            event_id: first_page[1].event_id,
        };
        let second_page = tx
            .audit_query(&AuditFilter::default(), Some(cursor), 10)
            .await
            .unwrap();
        assert_eq!(second_page.len(), 3);
        for event in &second_page {
            assert!(
                (event.occurred_at, event.event_id) < (cursor.occurred_at, cursor.event_id)
            );
        }
    }

    #[tokio::test]
    async fn test_registrations_exclude_deleted_consumers() {
        let store = MemoryStore::new();
        let owner = team("Producers");
        let mut consumer = team("Consumers");
        let a = asset("warehouse.orders", owner.team_id);

        let mut tx = store.begin().await.unwrap();
        tx.team_insert(&owner).await.unwrap();
        tx.team_insert(&consumer).await.unwrap();
        tx.asset_insert(&a).await.unwrap();
        tx.registration_insert(&Registration {
            registration_id: RegistrationId::now_v7(),
            asset_id: a.asset_id,
            consumer_team_id: consumer.team_id,
            pinned_version: None,
            status: RegistrationStatus::Active,
            registered_at: Utc::now(),
        })
        .await
        .unwrap();

        assert_eq!(
            tx.registrations_active_for_asset(a.asset_id).await.unwrap().len(),
            1
        );

        consumer.deleted_at = Some(Utc::now());
        tx.team_update(&consumer).await.unwrap();
        assert!(tx
            .registrations_active_for_asset(a.asset_id)
            .await
            .unwrap()
            .is_empty());
    }
}
