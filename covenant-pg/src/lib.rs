//! Covenant PG - PostgreSQL Store Backend
//!
//! Implements the `covenant-storage` traits over a deadpool-managed
//! connection pool. Each [`StoreTx`] owns a pooled client with an explicit
//! `BEGIN ISOLATION LEVEL SERIALIZABLE`; `lock_asset` maps to
//! `SELECT ... FOR UPDATE` on the asset row, which is the only
//! linearisation point the coordination core relies on.
//!
//! Dropping a transaction without committing returns the client to the
//! pool, where the `Clean` recycling method discards the open transaction.

mod row;
mod schema;

pub use schema::SCHEMA;

use async_trait::async_trait;
use covenant_core::{
    Acknowledgment, AcknowledgmentId, ApiKey, ApiKeyId, Asset, AssetDependency, AssetFilter,
    AssetId, AuditCursor, AuditEvent, AuditFilter, Contract, ContractId, DependencyId,
    EntityIdType, EntityType, KeyHash, Page, Proposal, ProposalFilter, ProposalId, Registration,
    RegistrationFilter, RegistrationId, RegistrationStatus, StoreError, Team, TeamId,
};
use covenant_storage::{Store, StoreResult, StoreTx};
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use serde_json::Value;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use uuid::Uuid;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// PostgreSQL connection pool configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "covenant".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl PgConfig {
    /// Read configuration from `COVENANT_DB_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("COVENANT_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("COVENANT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("COVENANT_DB_NAME").unwrap_or_else(|_| "covenant".to_string()),
            user: std::env::var("COVENANT_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("COVENANT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("COVENANT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("COVENANT_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        // Clean recycling rolls back transactions abandoned by dropped
        // StoreTx values before the connection is reused.
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Clean,
        });
        let mut pool_config = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_config.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_config);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Backend {
                reason: format!("failed to create pool: {e}"),
            })
    }
}

// ============================================================================
// STORE
// ============================================================================

/// PostgreSQL [`Store`] implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &PgConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Apply the embedded DDL. Idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA).await.map_err(db_err)?;
        tracing::info!("database schema applied");
        Ok(())
    }

    async fn client(&self) -> StoreResult<Object> {
        self.pool.get().await.map_err(|e| StoreError::Backend {
            reason: format!("failed to acquire connection: {e}"),
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let client = self.client().await?;
        client
            .batch_execute("BEGIN ISOLATION LEVEL SERIALIZABLE")
            .await
            .map_err(db_err)?;
        Ok(Box::new(PgTx { client, open: true }))
    }
}

fn db_err(e: tokio_postgres::Error) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

/// Map unique-constraint violations on insert to the typed duplicate error.
fn insert_err(
    e: tokio_postgres::Error,
    entity_type: EntityType,
    field: &'static str,
    value: &str,
) -> StoreError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        StoreError::Duplicate {
            entity_type,
            field,
            value: value.to_string(),
        }
    } else {
        db_err(e)
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

struct PgTx {
    client: Object,
    open: bool,
}

impl PgTx {
    fn check_open(&self) -> StoreResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed)
        }
    }
}

const TEAM_COLS: &str = "id, name, slug, metadata, created_at, deleted_at";
const ASSET_COLS: &str =
    "id, fqn, owner_team_id, resource_type, current_contract_id, metadata, created_at, deleted_at";
const CONTRACT_COLS: &str =
    "id, asset_id, version, schema, compatibility_mode, guarantees, status, published_at, published_by";
const REGISTRATION_COLS: &str =
    "id, asset_id, consumer_team_id, pinned_version, status, registered_at";
const PROPOSAL_COLS: &str = "id, asset_id, base_contract_id, proposed_schema, proposed_version, \
     proposed_compatibility_mode, proposed_guarantees, breaking_changes, change_type, status, \
     pending_consumers, proposed_by, proposed_at, resolved_at";
const ACK_COLS: &str =
    "id, proposal_id, consumer_team_id, response, migration_deadline, notes, responded_at";
const DEPENDENCY_COLS: &str =
    "id, upstream_asset_id, downstream_asset_id, kind, created_at, deleted_at";
const API_KEY_COLS: &str =
    "id, team_id, name, key_hash, scopes, created_at, last_used_at, revoked_at";
const AUDIT_COLS: &str = "id, entity_type, entity_id, action, actor_id, payload, occurred_at";

fn guarantees_value(
    guarantees: &Option<covenant_core::Guarantees>,
) -> StoreResult<Option<Value>> {
    guarantees
        .as_ref()
        .map(|g| {
            serde_json::to_value(g).map_err(|e| StoreError::Serialization {
                reason: e.to_string(),
            })
        })
        .transpose()
}

#[async_trait]
impl StoreTx for PgTx {
    // === Teams ===

    async fn team_insert(&mut self, team: &Team) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO core.teams (id, name, slug, metadata, created_at, deleted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &team.team_id.as_uuid(),
                    &team.name,
                    &team.slug,
                    &team.metadata,
                    &team.created_at,
                    &team.deleted_at,
                ],
            )
            .await
            .map_err(|e| insert_err(e, EntityType::Team, "name", &team.name))?;
        Ok(())
    }

    async fn team_get(&mut self, id: TeamId) -> StoreResult<Option<Team>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {TEAM_COLS} FROM core.teams WHERE id = $1 AND deleted_at IS NULL"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::team_from_row(&r)).transpose()
    }

    async fn team_get_by_slug(&mut self, slug: &str) -> StoreResult<Option<Team>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {TEAM_COLS} FROM core.teams WHERE slug = $1 AND deleted_at IS NULL"
                ),
                &[&slug],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::team_from_row(&r)).transpose()
    }

    async fn team_update(&mut self, team: &Team) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE core.teams SET name = $2, slug = $3, metadata = $4, deleted_at = $5 \
                 WHERE id = $1",
                &[
                    &team.team_id.as_uuid(),
                    &team.name,
                    &team.slug,
                    &team.metadata,
                    &team.deleted_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Team,
                id: team.team_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn team_list(&mut self, page: Page) -> StoreResult<Vec<Team>> {
        self.check_open()?;
        let page = page.clamped();
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT {TEAM_COLS} FROM core.teams WHERE deleted_at IS NULL \
                     ORDER BY created_at, id LIMIT $1 OFFSET $2"
                ),
                &[&page.limit, &page.offset],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::team_from_row).collect()
    }

    // === Assets ===

    async fn asset_insert(&mut self, asset: &Asset) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO core.assets \
                 (id, fqn, owner_team_id, resource_type, current_contract_id, metadata, created_at, deleted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &asset.asset_id.as_uuid(),
                    &asset.fqn,
                    &asset.owner_team_id.as_uuid(),
                    &asset.resource_type.as_str(),
                    &asset.current_contract_id.map(|c| c.as_uuid()),
                    &asset.metadata,
                    &asset.created_at,
                    &asset.deleted_at,
                ],
            )
            .await
            .map_err(|e| insert_err(e, EntityType::Asset, "fqn", &asset.fqn))?;
        Ok(())
    }

    async fn asset_get(&mut self, id: AssetId) -> StoreResult<Option<Asset>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {ASSET_COLS} FROM core.assets WHERE id = $1 AND deleted_at IS NULL"
                ),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::asset_from_row(&r)).transpose()
    }

    async fn asset_get_by_fqn(&mut self, fqn: &str) -> StoreResult<Option<Asset>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {ASSET_COLS} FROM core.assets WHERE fqn = $1 AND deleted_at IS NULL"
                ),
                &[&fqn],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::asset_from_row(&r)).transpose()
    }

    async fn asset_update(&mut self, asset: &Asset) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE core.assets SET fqn = $2, owner_team_id = $3, resource_type = $4, \
                 current_contract_id = $5, metadata = $6, deleted_at = $7 WHERE id = $1",
                &[
                    &asset.asset_id.as_uuid(),
                    &asset.fqn,
                    &asset.owner_team_id.as_uuid(),
                    &asset.resource_type.as_str(),
                    &asset.current_contract_id.map(|c| c.as_uuid()),
                    &asset.metadata,
                    &asset.deleted_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Asset,
                id: asset.asset_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn asset_list(&mut self, filter: &AssetFilter, page: Page) -> StoreResult<Vec<Asset>> {
        self.check_open()?;
        let page = page.clamped();
        let owner = filter.owner_team_id.map(|t| t.as_uuid());
        let resource_type = filter.resource_type.map(|r| r.as_str().to_string());
        let fqn_like = filter.fqn_contains.as_ref().map(|f| format!("%{f}%"));

        let mut sql = format!("SELECT {ASSET_COLS} FROM core.assets WHERE deleted_at IS NULL");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(owner) = &owner {
            params.push(owner);
            sql.push_str(&*format!(" AND owner_team_id = ${}", params.len()));
        }
        if let Some(resource_type) = &resource_type {
            params.push(resource_type);
            sql.push_str(&*format!(" AND resource_type = ${}", params.len()));
        }
        if let Some(fqn_like) = &fqn_like {
            params.push(fqn_like);
            sql.push_str(&*format!(" AND fqn LIKE ${}", params.len()));
        }
        params.push(&page.limit);
        sql.push_str(&*format!(" ORDER BY created_at, id LIMIT ${}", params.len()));
        params.push(&page.offset);
        sql.push_str(&*format!(" OFFSET ${}", params.len()));

        let rows = self.client.query(sql.as_str(), &params).await.map_err(db_err)?;
        rows.iter().map(row::asset_from_row).collect()
    }

    async fn lock_asset(&mut self, id: AssetId) -> StoreResult<()> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                "SELECT id FROM core.assets WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        if row.is_none() {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Asset,
                id: id.as_uuid(),
            });
        }
        Ok(())
    }

    // === Contracts ===

    async fn contract_insert(&mut self, contract: &Contract) -> StoreResult<()> {
        self.check_open()?;
        let guarantees = guarantees_value(&contract.guarantees)?;
        self.client
            .execute(
                "INSERT INTO core.contracts \
                 (id, asset_id, version, schema, compatibility_mode, guarantees, status, published_at, published_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &contract.contract_id.as_uuid(),
                    &contract.asset_id.as_uuid(),
                    &contract.version,
                    &contract.schema,
                    &contract.compatibility_mode.as_str(),
                    &guarantees,
                    &contract.status.as_str(),
                    &contract.published_at,
                    &contract.published_by.as_uuid(),
                ],
            )
            .await
            .map_err(|e| insert_err(e, EntityType::Contract, "version", &contract.version))?;
        Ok(())
    }

    async fn contract_get(&mut self, id: ContractId) -> StoreResult<Option<Contract>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {CONTRACT_COLS} FROM core.contracts WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::contract_from_row(&r)).transpose()
    }

    async fn contract_update(&mut self, contract: &Contract) -> StoreResult<()> {
        self.check_open()?;
        let guarantees = guarantees_value(&contract.guarantees)?;
        let updated = self
            .client
            .execute(
                "UPDATE core.contracts SET schema = $2, compatibility_mode = $3, guarantees = $4, \
                 status = $5 WHERE id = $1",
                &[
                    &contract.contract_id.as_uuid(),
                    &contract.schema,
                    &contract.compatibility_mode.as_str(),
                    &guarantees,
                    &contract.status.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Contract,
                id: contract.contract_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn contract_active_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Option<Contract>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {CONTRACT_COLS} FROM core.contracts \
                     WHERE asset_id = $1 AND status = 'active' \
                     ORDER BY published_at DESC LIMIT 1"
                ),
                &[&asset_id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::contract_from_row(&r)).transpose()
    }

    async fn contract_by_version(
        &mut self,
        asset_id: AssetId,
        version: &str,
    ) -> StoreResult<Option<Contract>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {CONTRACT_COLS} FROM core.contracts \
                     WHERE asset_id = $1 AND version = $2"
                ),
                &[&asset_id.as_uuid(), &version],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::contract_from_row(&r)).transpose()
    }

    async fn contract_list_for_asset(
        &mut self,
        asset_id: AssetId,
        page: Page,
    ) -> StoreResult<Vec<Contract>> {
        self.check_open()?;
        let page = page.clamped();
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT {CONTRACT_COLS} FROM core.contracts WHERE asset_id = $1 \
                     ORDER BY published_at DESC, id DESC LIMIT $2 OFFSET $3"
                ),
                &[&asset_id.as_uuid(), &page.limit, &page.offset],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::contract_from_row).collect()
    }

    // === Registrations ===

    async fn registration_insert(&mut self, registration: &Registration) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO core.registrations \
                 (id, asset_id, consumer_team_id, pinned_version, status, registered_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &registration.registration_id.as_uuid(),
                    &registration.asset_id.as_uuid(),
                    &registration.consumer_team_id.as_uuid(),
                    &registration.pinned_version,
                    &registration.status.as_str(),
                    &registration.registered_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn registration_get(&mut self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {REGISTRATION_COLS} FROM core.registrations WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::registration_from_row(&r)).transpose()
    }

    async fn registration_update(&mut self, registration: &Registration) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE core.registrations SET pinned_version = $2, status = $3 WHERE id = $1",
                &[
                    &registration.registration_id.as_uuid(),
                    &registration.pinned_version,
                    &registration.status.as_str(),
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Registration,
                id: registration.registration_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn registration_list(
        &mut self,
        filter: &RegistrationFilter,
        page: Page,
    ) -> StoreResult<Vec<Registration>> {
        self.check_open()?;
        let page = page.clamped();
        let asset_id = filter.asset_id.map(|a| a.as_uuid());
        let consumer = filter.consumer_team_id.map(|t| t.as_uuid());
        let status = filter.status.map(|s| s.as_str().to_string());

        let mut sql = format!("SELECT {REGISTRATION_COLS} FROM core.registrations WHERE TRUE");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(asset_id) = &asset_id {
            params.push(asset_id);
            sql.push_str(&*format!(" AND asset_id = ${}", params.len()));
        }
        if let Some(consumer) = &consumer {
            params.push(consumer);
            sql.push_str(&*format!(" AND consumer_team_id = ${}", params.len()));
        }
        if let Some(status) = &status {
            params.push(status);
            sql.push_str(&*format!(" AND status = ${}", params.len()));
        }
        params.push(&page.limit);
        sql.push_str(&*format!(" ORDER BY registered_at, id LIMIT ${}", params.len()));
        params.push(&page.offset);
        sql.push_str(&*format!(" OFFSET ${}", params.len()));

        let rows = self.client.query(sql.as_str(), &params).await.map_err(db_err)?;
        rows.iter().map(row::registration_from_row).collect()
    }

    async fn registrations_active_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<Registration>> {
        self.check_open()?;
        let active = RegistrationStatus::Active.as_str();
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT r.id, r.asset_id, r.consumer_team_id, r.pinned_version, r.status, \
                     r.registered_at \
                     FROM core.registrations r \
                     JOIN core.teams t ON t.id = r.consumer_team_id \
                     WHERE r.asset_id = $1 AND r.status = $2 AND t.deleted_at IS NULL \
                     ORDER BY r.registered_at, r.id"
                ),
                &[&asset_id.as_uuid(), &active],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::registration_from_row).collect()
    }

    // === Proposals ===

    async fn proposal_insert(&mut self, proposal: &Proposal) -> StoreResult<()> {
        self.check_open()?;
        let guarantees = guarantees_value(&proposal.proposed_guarantees)?;
        let breaking = Value::Array(proposal.breaking_changes.clone());
        let pending: Vec<Uuid> = proposal
            .pending_consumers
            .iter()
            .map(|t| t.as_uuid())
            .collect();
        self.client
            .execute(
                "INSERT INTO workflow.proposals \
                 (id, asset_id, base_contract_id, proposed_schema, proposed_version, \
                  proposed_compatibility_mode, proposed_guarantees, breaking_changes, change_type, \
                  status, pending_consumers, proposed_by, proposed_at, resolved_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                &[
                    &proposal.proposal_id.as_uuid(),
                    &proposal.asset_id.as_uuid(),
                    &proposal.base_contract_id.as_uuid(),
                    &proposal.proposed_schema,
                    &proposal.proposed_version,
                    &proposal.proposed_compatibility_mode.as_str(),
                    &guarantees,
                    &breaking,
                    &proposal.change_type.as_str(),
                    &proposal.status.as_str(),
                    &pending,
                    &proposal.proposed_by.as_uuid(),
                    &proposal.proposed_at,
                    &proposal.resolved_at,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    StoreError::PendingProposalExists {
                        asset_id: proposal.asset_id.as_uuid(),
                    }
                } else {
                    db_err(e)
                }
            })?;
        Ok(())
    }

    async fn proposal_get(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {PROPOSAL_COLS} FROM workflow.proposals WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::proposal_from_row(&r)).transpose()
    }

    async fn proposal_update(&mut self, proposal: &Proposal) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE workflow.proposals SET status = $2, resolved_at = $3 WHERE id = $1",
                &[
                    &proposal.proposal_id.as_uuid(),
                    &proposal.status.as_str(),
                    &proposal.resolved_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Proposal,
                id: proposal.proposal_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn proposal_list(
        &mut self,
        filter: &ProposalFilter,
        page: Page,
    ) -> StoreResult<Vec<Proposal>> {
        self.check_open()?;
        let page = page.clamped();
        let asset_id = filter.asset_id.map(|a| a.as_uuid());
        let status = filter.status.map(|s| s.as_str().to_string());
        let proposed_by = filter.proposed_by.map(|t| t.as_uuid());

        let mut sql = format!("SELECT {PROPOSAL_COLS} FROM workflow.proposals WHERE TRUE");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(asset_id) = &asset_id {
            params.push(asset_id);
            sql.push_str(&*format!(" AND asset_id = ${}", params.len()));
        }
        if let Some(status) = &status {
            params.push(status);
            sql.push_str(&*format!(" AND status = ${}", params.len()));
        }
        if let Some(proposed_by) = &proposed_by {
            params.push(proposed_by);
            sql.push_str(&*format!(" AND proposed_by = ${}", params.len()));
        }
        params.push(&page.limit);
        sql.push_str(&*format!(
            " ORDER BY proposed_at DESC, id DESC LIMIT ${}",
            params.len()
        ));
        params.push(&page.offset);
        sql.push_str(&*format!(" OFFSET ${}", params.len()));

        let rows = self.client.query(sql.as_str(), &params).await.map_err(db_err)?;
        rows.iter().map(row::proposal_from_row).collect()
    }

    async fn proposal_pending_for_asset(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Option<Proposal>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {PROPOSAL_COLS} FROM workflow.proposals \
                     WHERE asset_id = $1 AND status = 'pending'"
                ),
                &[&asset_id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::proposal_from_row(&r)).transpose()
    }

    // === Acknowledgments ===

    async fn ack_upsert(&mut self, ack: &Acknowledgment) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO workflow.acknowledgments \
                 (id, proposal_id, consumer_team_id, response, migration_deadline, notes, responded_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (proposal_id, consumer_team_id) DO UPDATE SET \
                 response = EXCLUDED.response, migration_deadline = EXCLUDED.migration_deadline, \
                 notes = EXCLUDED.notes, responded_at = EXCLUDED.responded_at",
                &[
                    &ack.ack_id.as_uuid(),
                    &ack.proposal_id.as_uuid(),
                    &ack.consumer_team_id.as_uuid(),
                    &ack.response.as_str(),
                    &ack.migration_deadline,
                    &ack.notes,
                    &ack.responded_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn ack_get(&mut self, id: AcknowledgmentId) -> StoreResult<Option<Acknowledgment>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {ACK_COLS} FROM workflow.acknowledgments WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::ack_from_row(&r)).transpose()
    }

    async fn acks_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Vec<Acknowledgment>> {
        self.check_open()?;
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT {ACK_COLS} FROM workflow.acknowledgments \
                     WHERE proposal_id = $1 ORDER BY responded_at, id"
                ),
                &[&proposal_id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::ack_from_row).collect()
    }

    // === Dependencies ===

    async fn dependency_insert(&mut self, dependency: &AssetDependency) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO core.dependencies \
                 (id, upstream_asset_id, downstream_asset_id, kind, created_at, deleted_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &dependency.dependency_id.as_uuid(),
                    &dependency.upstream_asset_id.as_uuid(),
                    &dependency.downstream_asset_id.as_uuid(),
                    &dependency.kind.as_str(),
                    &dependency.created_at,
                    &dependency.deleted_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn dependency_get(&mut self, id: DependencyId) -> StoreResult<Option<AssetDependency>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {DEPENDENCY_COLS} FROM core.dependencies \
                     WHERE id = $1 AND deleted_at IS NULL"
                ),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::dependency_from_row(&r)).transpose()
    }

    async fn dependency_update(&mut self, dependency: &AssetDependency) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE core.dependencies SET kind = $2, deleted_at = $3 WHERE id = $1",
                &[
                    &dependency.dependency_id.as_uuid(),
                    &dependency.kind.as_str(),
                    &dependency.deleted_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::Dependency,
                id: dependency.dependency_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn dependencies_downstream_of(
        &mut self,
        asset_id: AssetId,
    ) -> StoreResult<Vec<AssetDependency>> {
        self.check_open()?;
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT {DEPENDENCY_COLS} FROM core.dependencies \
                     WHERE upstream_asset_id = $1 AND deleted_at IS NULL \
                     ORDER BY created_at, id"
                ),
                &[&asset_id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::dependency_from_row).collect()
    }

    // === API keys ===

    async fn api_key_insert(&mut self, key: &ApiKey) -> StoreResult<()> {
        self.check_open()?;
        let hash: &[u8] = &key.key_hash;
        let scopes: Vec<String> = key.scopes.iter().map(|s| s.as_str().to_string()).collect();
        self.client
            .execute(
                "INSERT INTO core.api_keys \
                 (id, team_id, name, key_hash, scopes, created_at, last_used_at, revoked_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &key.api_key_id.as_uuid(),
                    &key.team_id.as_uuid(),
                    &key.name,
                    &hash,
                    &scopes,
                    &key.created_at,
                    &key.last_used_at,
                    &key.revoked_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn api_key_get(&mut self, id: ApiKeyId) -> StoreResult<Option<ApiKey>> {
        self.check_open()?;
        let row = self
            .client
            .query_opt(
                &*format!("SELECT {API_KEY_COLS} FROM core.api_keys WHERE id = $1"),
                &[&id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::api_key_from_row(&r)).transpose()
    }

    async fn api_key_find_by_hash(&mut self, hash: &KeyHash) -> StoreResult<Option<ApiKey>> {
        self.check_open()?;
        let bytes: &[u8] = hash;
        let row = self
            .client
            .query_opt(
                &*format!(
                    "SELECT {API_KEY_COLS} FROM core.api_keys \
                     WHERE key_hash = $1 AND revoked_at IS NULL"
                ),
                &[&bytes],
            )
            .await
            .map_err(db_err)?;
        row.map(|r| row::api_key_from_row(&r)).transpose()
    }

    async fn api_key_update(&mut self, key: &ApiKey) -> StoreResult<()> {
        self.check_open()?;
        let updated = self
            .client
            .execute(
                "UPDATE core.api_keys SET name = $2, last_used_at = $3, revoked_at = $4 \
                 WHERE id = $1",
                &[
                    &key.api_key_id.as_uuid(),
                    &key.name,
                    &key.last_used_at,
                    &key.revoked_at,
                ],
            )
            .await
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity_type: EntityType::ApiKey,
                id: key.api_key_id.as_uuid(),
            });
        }
        Ok(())
    }

    async fn api_key_list_for_team(&mut self, team_id: TeamId) -> StoreResult<Vec<ApiKey>> {
        self.check_open()?;
        let rows = self
            .client
            .query(
                &*format!(
                    "SELECT {API_KEY_COLS} FROM core.api_keys WHERE team_id = $1 \
                     ORDER BY created_at, id"
                ),
                &[&team_id.as_uuid()],
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(row::api_key_from_row).collect()
    }

    // === Audit ===

    async fn append_audit(&mut self, event: &AuditEvent) -> StoreResult<()> {
        self.check_open()?;
        self.client
            .execute(
                "INSERT INTO audit.events \
                 (id, entity_type, entity_id, action, actor_id, payload, occurred_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &event.event_id.as_uuid(),
                    &event.entity_type.as_str(),
                    &event.entity_id,
                    &event.action.as_str(),
                    &event.actor_id,
                    &event.payload,
                    &event.occurred_at,
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn audit_query(
        &mut self,
        filter: &AuditFilter,
        cursor: Option<AuditCursor>,
        limit: i64,
    ) -> StoreResult<Vec<AuditEvent>> {
        self.check_open()?;
        let entity_type = filter.entity_type.map(|t| t.as_str().to_string());
        let action = filter.action.map(|a| a.as_str().to_string());
        let cursor_ts = cursor.map(|c| c.occurred_at);
        let cursor_id = cursor.map(|c| c.event_id.as_uuid());
        let limit = limit.clamp(1, 100);

        let mut sql = format!("SELECT {AUDIT_COLS} FROM audit.events WHERE TRUE");
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
        if let Some(entity_type) = &entity_type {
            params.push(entity_type);
            sql.push_str(&*format!(" AND entity_type = ${}", params.len()));
        }
        if let Some(entity_id) = &filter.entity_id {
            params.push(entity_id);
            sql.push_str(&*format!(" AND entity_id = ${}", params.len()));
        }
        if let Some(actor_id) = &filter.actor_id {
            params.push(actor_id);
            sql.push_str(&*format!(" AND actor_id = ${}", params.len()));
        }
        if let Some(action) = &action {
            params.push(action);
            sql.push_str(&*format!(" AND action = ${}", params.len()));
        }
        if let Some(since) = &filter.since {
            params.push(since);
            sql.push_str(&*format!(" AND occurred_at >= ${}", params.len()));
        }
        if let Some(until) = &filter.until {
            params.push(until);
            sql.push_str(&*format!(" AND occurred_at <= ${}", params.len()));
        }
        if let (Some(ts), Some(id)) = (&cursor_ts, &cursor_id) {
            params.push(ts);
            let ts_idx = params.len();
            params.push(id);
            sql.push_str(&*format!(
                " AND (occurred_at, id) < (${}, ${})",
                ts_idx,
                params.len()
            ));
        }
        params.push(&limit);
        sql.push_str(&*format!(
            " ORDER BY occurred_at DESC, id DESC LIMIT ${}",
            params.len()
        ));

        let rows = self.client.query(sql.as_str(), &params).await.map_err(db_err)?;
        rows.iter().map(row::audit_event_from_row).collect()
    }

    // === Transaction control ===

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.check_open()?;
        self.open = false;
        self.client.batch_execute("COMMIT").await.map_err(db_err)
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.check_open()?;
        self.open = false;
        self.client.batch_execute("ROLLBACK").await.map_err(db_err)
    }
}
