//! Core entity structures

use crate::{
    AckResponse, AcknowledgmentId, ApiKeyId, ApiKeyScope, AssetId, AuditAction, AuditEventId,
    ChangeType, CompatibilityMode, ContractId, ContractStatus, DependencyId, DependencyKind,
    EntityType, KeyHash, ProposalId, ProposalStatus, RegistrationId, RegistrationStatus,
    ResourceType, TeamId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Team - identity for asset ownership and for acknowledgments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Team {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub team_id: TeamId,
    pub name: String,
    /// URL-safe short name, unique among live teams.
    pub slug: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    /// Soft-delete marker. Deleted teams are never listed by default and
    /// never considered in impact analysis.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deleted_at: Option<Timestamp>,
}

impl Team {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Asset - a data object (table, view, derived model, API endpoint) owned
/// by a producer team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Asset {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub asset_id: AssetId,
    /// Dotted fully-qualified name, unique among live assets.
    pub fqn: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner_team_id: TeamId,
    pub resource_type: ResourceType,
    /// Denormalised pointer to the single active contract. Maintained only
    /// by the publish path, inside the same transaction that flips contract
    /// statuses.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub current_contract_id: Option<ContractId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deleted_at: Option<Timestamp>,
}

impl Asset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Declarative data-quality guarantees attached to a contract.
///
/// These are metadata only: recorded, diffed and reported, never executed
/// against warehouse data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Guarantees {
    /// Freshness expectations, e.g. `{"warn_after": {"hours": 24}}` or
    /// `{"max_staleness_minutes": 30}`. Free-form by design.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub freshness: Option<serde_json::Value>,
    /// Row-count expectations, e.g. `{"min_rows": 100, "max_rows": 10000}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub volume: Option<serde_json::Value>,
    /// Column name -> not-null promise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullability: Option<BTreeMap<String, bool>>,
    /// Column name -> uniqueness promise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uniqueness: Option<BTreeMap<String, bool>>,
    /// Column name -> closed set of accepted values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub accepted_values: Option<BTreeMap<String, Vec<serde_json::Value>>>,
    /// Column name -> referenced `table.column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub relationships: Option<BTreeMap<String, serde_json::Value>>,
}

impl Guarantees {
    pub fn is_empty(&self) -> bool {
        self.freshness.is_none()
            && self.volume.is_none()
            && self.nullability.is_none()
            && self.uniqueness.is_none()
            && self.accepted_values.is_none()
            && self.relationships.is_none()
    }
}

/// Contract - a versioned schema plus declarative guarantees published for
/// an asset. At most one contract per asset is `active` at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Contract {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub contract_id: ContractId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub asset_id: AssetId,
    /// Semantic version string, strictly increasing within an asset.
    pub version: String,
    /// Canonical JSON-Schema document.
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub schema: serde_json::Value,
    pub compatibility_mode: CompatibilityMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantees: Option<Guarantees>,
    pub status: ContractStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub published_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub published_by: TeamId,
}

/// Registration - a consumer team's declared dependency on an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Registration {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub registration_id: RegistrationId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub asset_id: AssetId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub consumer_team_id: TeamId,
    /// None means "track the latest compatible version".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_version: Option<String>,
    pub status: RegistrationStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub registered_at: Timestamp,
}

/// Proposal - a producer's request to publish a breaking change, suspended
/// until every snapshotted consumer signs off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Proposal {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub proposal_id: ProposalId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub asset_id: AssetId,
    /// The active contract this proposal intends to replace. Re-verified at
    /// publish time; if the asset advanced meanwhile the proposal is stale.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub base_contract_id: ContractId,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub proposed_schema: serde_json::Value,
    pub proposed_version: String,
    pub proposed_compatibility_mode: CompatibilityMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_guarantees: Option<Guarantees>,
    /// Breaking changes as reported by the differ, serialized verbatim.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub breaking_changes: Vec<serde_json::Value>,
    pub change_type: ChangeType,
    pub status: ProposalStatus,
    /// Snapshot of the active consumer teams captured when the proposal was
    /// opened. Exactly these teams must acknowledge; registrations made
    /// after opening do not join the set.
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub pending_consumers: Vec<TeamId>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub proposed_by: TeamId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub proposed_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub resolved_at: Option<Timestamp>,
}

/// Acknowledgment - a consumer's response to a proposal.
/// Unique per (proposal, consumer); may be re-submitted while pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Acknowledgment {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub ack_id: AcknowledgmentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub proposal_id: ProposalId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub consumer_team_id: TeamId,
    pub response: AckResponse,
    /// Informational only; the state machine records but never enforces it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub migration_deadline: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub responded_at: Timestamp,
}

/// Directed lineage edge between assets. Cycles are not rejected on write;
/// traversals carry a visited set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AssetDependency {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub dependency_id: DependencyId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub upstream_asset_id: AssetId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub downstream_asset_id: AssetId,
    pub kind: DependencyKind,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deleted_at: Option<Timestamp>,
}

/// AuditEvent - append-only history record. Never updated, never deleted;
/// survives the deletion of the entities it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEvent {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub event_id: AuditEventId,
    pub entity_type: EntityType,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub entity_id: Uuid,
    pub action: AuditAction,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub actor_id: Option<Uuid>,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub occurred_at: Timestamp,
}

/// ApiKey - scoped credential for a team. Only the SHA-256 digest of the
/// secret is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiKey {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub api_key_id: ApiKeyId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub team_id: TeamId,
    pub name: String,
    #[serde(with = "serde_key_hash")]
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub key_hash: KeyHash,
    pub scopes: Vec<ApiKeyScope>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_used_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub revoked_at: Option<Timestamp>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn has_scope(&self, scope: ApiKeyScope) -> bool {
        // Admin implies everything.
        self.scopes.contains(&scope) || self.scopes.contains(&ApiKeyScope::Admin)
    }
}

/// Hex serialization for key digests so entities stay JSON-friendly.
mod serde_key_hash {
    use super::KeyHash;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &KeyHash, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(64);
        for b in hash {
            out.push_str(&format!("{b:02x}"));
        }
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<KeyHash, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() != 64 {
            return Err(serde::de::Error::custom("key hash must be 64 hex chars"));
        }
        let mut hash = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(serde::de::Error::custom)?;
            hash[i] = u8::from_str_radix(hex, 16).map_err(serde::de::Error::custom)?;
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_api_key;
    use crate::identity::EntityIdType;
    use chrono::Utc;

    #[test]
    fn test_api_key_scope_implication() {
        let key = ApiKey {
            api_key_id: ApiKeyId::now_v7(),
            team_id: TeamId::now_v7(),
            name: "ci".into(),
            key_hash: hash_api_key("secret"),
            scopes: vec![ApiKeyScope::Admin],
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        assert!(key.has_scope(ApiKeyScope::Read));
        assert!(key.has_scope(ApiKeyScope::Write));
        assert!(key.has_scope(ApiKeyScope::Admin));

        let read_only = ApiKey {
            scopes: vec![ApiKeyScope::Read],
            ..key
        };
        assert!(read_only.has_scope(ApiKeyScope::Read));
        assert!(!read_only.has_scope(ApiKeyScope::Write));
    }

    #[test]
    fn test_key_hash_serde_round_trip() {
        let key = ApiKey {
            api_key_id: ApiKeyId::now_v7(),
            team_id: TeamId::now_v7(),
            name: "ci".into(),
            key_hash: hash_api_key("secret"),
            scopes: vec![ApiKeyScope::Read, ApiKeyScope::Write],
            created_at: Utc::now(),
            last_used_at: None,
            revoked_at: None,
        };
        let json = serde_json::to_string(&key).unwrap();
        let parsed: ApiKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.key_hash, key.key_hash);
    }

    #[test]
    fn test_guarantees_is_empty() {
        assert!(Guarantees::default().is_empty());
        let g = Guarantees {
            volume: Some(serde_json::json!({"min_rows": 1})),
            ..Default::default()
        };
        assert!(!g.is_empty());
    }
}
