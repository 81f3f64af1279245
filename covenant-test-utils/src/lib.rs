//! Covenant Test Utilities
//!
//! Centralized test infrastructure for the workspace: entity fixtures,
//! sample schemas, and deterministic clock/ID wiring. Tests that combine
//! these with [`MemoryStore`] are fully reproducible.

pub use covenant_storage::MemoryStore;

pub use covenant_core::{
    Acknowledgment, AcknowledgmentId, ApiKey, ApiKeyId, ApiKeyScope, Asset, AssetDependency,
    AssetId, Clock, CompatibilityMode, Contract, ContractId, ContractStatus, DependencyId,
    DependencyKind, EntityIdType, FixedClock, Guarantees, IdGen, Proposal, ProposalId,
    Registration, RegistrationId, RegistrationStatus, ResourceType, SequentialIdGen,
    SteppingClock, Team, TeamId, Timestamp,
};

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

/// The fixed instant all deterministic tests start from.
pub fn test_epoch() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A stepping clock seeded at the test epoch, so successive events get
/// strictly increasing timestamps.
pub fn test_clock() -> SteppingClock {
    SteppingClock::new(test_epoch())
}

// ============================================================================
// ENTITY FIXTURES
// ============================================================================

pub fn team(ids: &dyn IdGen, name: &str) -> Team {
    Team {
        team_id: TeamId::new(ids.new_id()),
        name: name.to_string(),
        slug: name.to_lowercase().replace(' ', "-"),
        metadata: json!({}),
        created_at: test_epoch(),
        deleted_at: None,
    }
}

pub fn asset(ids: &dyn IdGen, fqn: &str, owner: TeamId) -> Asset {
    Asset {
        asset_id: AssetId::new(ids.new_id()),
        fqn: fqn.to_string(),
        owner_team_id: owner,
        resource_type: ResourceType::Table,
        current_contract_id: None,
        metadata: json!({}),
        created_at: test_epoch(),
        deleted_at: None,
    }
}

pub fn registration(ids: &dyn IdGen, asset_id: AssetId, consumer: TeamId) -> Registration {
    Registration {
        registration_id: RegistrationId::new(ids.new_id()),
        asset_id,
        consumer_team_id: consumer,
        pinned_version: None,
        status: RegistrationStatus::Active,
        registered_at: test_epoch(),
    }
}

pub fn dependency(
    ids: &dyn IdGen,
    upstream: AssetId,
    downstream: AssetId,
) -> AssetDependency {
    AssetDependency {
        dependency_id: DependencyId::new(ids.new_id()),
        upstream_asset_id: upstream,
        downstream_asset_id: downstream,
        kind: DependencyKind::Consumes,
        created_at: test_epoch(),
        deleted_at: None,
    }
}

// ============================================================================
// SCHEMA FIXTURES
// ============================================================================

/// `{id: integer}` with `id` required - the canonical first contract.
pub fn schema_v1() -> Value {
    json!({
        "type": "object",
        "properties": {"id": {"type": "integer"}},
        "required": ["id"]
    })
}

/// `schema_v1` plus an optional `name: string` - a compatible addition
/// under backward mode.
pub fn schema_with_optional_name() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"}
        },
        "required": ["id"]
    })
}

/// `id` flipped to string - a breaking type change under backward mode.
pub fn schema_breaking_id_string() -> Value {
    json!({
        "type": "object",
        "properties": {"id": {"type": "string"}},
        "required": ["id"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_are_deterministic() {
        let ids = SequentialIdGen::new();
        let owner = team(&ids, "Producers");
        let a = asset(&ids, "warehouse.orders", owner.team_id);
        assert_eq!(a.owner_team_id, owner.team_id);
        assert_eq!(a.fqn, "warehouse.orders");
    }

    #[test]
    fn test_clock_steps() {
        let clock = test_clock();
        assert!(clock.now() < clock.now());
    }
}
