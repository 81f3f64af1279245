//! Covenant Storage - Store Trait and In-Memory Implementation
//!
//! Defines the transactional storage abstraction the coordination core is
//! written against. The PostgreSQL implementation lives in `covenant-pg`;
//! the in-memory backend here backs tests and single-node deployments.
//!
//! Contract highlights:
//! - `begin()` opens a serializable transaction; nothing is visible to
//!   other transactions until `commit()`.
//! - `lock_asset()` is the sole linearisation point: two writers on the
//!   same asset serialise, writers on different assets are independent.
//! - The store enforces uniqueness (live `asset.fqn`, live `team.name` and
//!   slug, one pending proposal per asset, one acknowledgment per
//!   (proposal, team)) and hides soft-deleted rows by default.
//! - `append_audit` participates in the surrounding transaction; an
//!   aborted transaction leaves no audit trace.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use covenant_core::{
    Acknowledgment, AcknowledgmentId, ApiKey, ApiKeyId, Asset, AssetDependency, AssetFilter,
    AssetId, AuditCursor, AuditEvent, AuditFilter, Contract, ContractId, DependencyId, KeyHash,
    Page, Proposal, ProposalFilter, ProposalId, Registration, RegistrationFilter, RegistrationId,
    StoreError, Team, TeamId,
};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A transactional store. `begin` is the only entry point; all reads and
/// writes happen inside a [`StoreTx`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// One serializable transaction.
///
/// Dropping a transaction without calling [`StoreTx::commit`] rolls it
/// back; no partial state and no audit events survive.
#[async_trait]
pub trait StoreTx: Send {
    // === Teams ===

    async fn team_insert(&mut self, team: &Team) -> StoreResult<()>;
    async fn team_get(&mut self, id: TeamId) -> StoreResult<Option<Team>>;
    async fn team_get_by_slug(&mut self, slug: &str) -> StoreResult<Option<Team>>;
    async fn team_update(&mut self, team: &Team) -> StoreResult<()>;
    async fn team_list(&mut self, page: Page) -> StoreResult<Vec<Team>>;

    // === Assets ===

    async fn asset_insert(&mut self, asset: &Asset) -> StoreResult<()>;
    async fn asset_get(&mut self, id: AssetId) -> StoreResult<Option<Asset>>;
    async fn asset_get_by_fqn(&mut self, fqn: &str) -> StoreResult<Option<Asset>>;
    async fn asset_update(&mut self, asset: &Asset) -> StoreResult<()>;
    async fn asset_list(&mut self, filter: &AssetFilter, page: Page) -> StoreResult<Vec<Asset>>;

    /// Serialise concurrent writers on one asset. Fails with `NotFound`
    /// for missing or soft-deleted assets.
    async fn lock_asset(&mut self, id: AssetId) -> StoreResult<()>;

    // === Contracts ===

    async fn contract_insert(&mut self, contract: &Contract) -> StoreResult<()>;
    async fn contract_get(&mut self, id: ContractId) -> StoreResult<Option<Contract>>;
    async fn contract_update(&mut self, contract: &Contract) -> StoreResult<()>;
    /// The unique active contract for an asset, if any.
    async fn contract_active_for_asset(&mut self, asset_id: AssetId)
        -> StoreResult<Option<Contract>>;
    async fn contract_by_version(
        &mut self,
        asset_id: AssetId,
        version: &str,
    ) -> StoreResult<Option<Contract>>;
    async fn contract_list_for_asset(
        &mut self,
        asset_id: AssetId,
        page: Page,
    ) -> StoreResult<Vec<Contract>>;

    // === Registrations ===

    async fn registration_insert(&mut self, registration: &Registration) -> StoreResult<()>;
    async fn registration_get(&mut self, id: RegistrationId) -> StoreResult<Option<Registration>>;
    async fn registration_update(&mut self, registration: &Registration) -> StoreResult<()>;
    async fn registration_list(
        &mut self,
        filter: &RegistrationFilter,
        page: Page,
    ) -> StoreResult<Vec<Registration>>;
    /// Active registrations on an asset whose consumer team is live.
    async fn registrations_active_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<Registration>>;

    // === Proposals ===

    async fn proposal_insert(&mut self, proposal: &Proposal) -> StoreResult<()>;
    async fn proposal_get(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>>;
    async fn proposal_update(&mut self, proposal: &Proposal) -> StoreResult<()>;
    async fn proposal_list(
        &mut self,
        filter: &ProposalFilter,
        page: Page,
    ) -> StoreResult<Vec<Proposal>>;
    async fn proposal_pending_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Option<Proposal>>;

    // === Acknowledgments ===

    /// Insert or replace by the unique (proposal, consumer team) pair.
    async fn ack_upsert(&mut self, ack: &Acknowledgment) -> StoreResult<()>;
    async fn ack_get(&mut self, id: AcknowledgmentId) -> StoreResult<Option<Acknowledgment>>;
    async fn acks_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Vec<Acknowledgment>>;

    // === Dependencies ===

    async fn dependency_insert(&mut self, dependency: &AssetDependency) -> StoreResult<()>;
    async fn dependency_get(&mut self, id: DependencyId) -> StoreResult<Option<AssetDependency>>;
    async fn dependency_update(&mut self, dependency: &AssetDependency) -> StoreResult<()>;
    /// Live edges whose upstream side is the given asset.
    async fn dependencies_downstream_of(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<AssetDependency>>;

    // === API keys ===

    async fn api_key_insert(&mut self, key: &ApiKey) -> StoreResult<()>;
    async fn api_key_get(&mut self, id: ApiKeyId) -> StoreResult<Option<ApiKey>>;
    async fn api_key_find_by_hash(&mut self, hash: &KeyHash) -> StoreResult<Option<ApiKey>>;
    async fn api_key_update(&mut self, key: &ApiKey) -> StoreResult<()>;
    async fn api_key_list_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<ApiKey>>;

    // === Audit ===

    /// Append-only; updates and deletes do not exist.
    async fn append_audit(&mut self, event: &AuditEvent) -> StoreResult<()>;
    /// Keyset query, newest first, strictly after the cursor when given.
    async fn audit_query(
        &mut self,
        filter: &AuditFilter,
        cursor: Option<AuditCursor>,
        limit: i64,
    ) -> StoreResult<Vec<AuditEvent>>;

    // === Transaction control ===

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
