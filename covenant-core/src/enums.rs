//! Enum types for Covenant entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COMPATIBILITY & CHANGE CLASSIFICATION
// ============================================================================

/// Schema compatibility modes, borrowed from Kafka-style schema registries.
///
/// The mode on the current contract decides which schema diffs count as
/// breaking when a new version is proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
    /// New schema can read old data (safe for producers).
    #[default]
    Backward,
    /// Old schema can read new data (safe for consumers).
    Forward,
    /// Both directions (strictest).
    Full,
    /// No compatibility checks, changes only notify.
    None,
}

impl CompatibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Backward => "backward",
            CompatibilityMode::Forward => "forward",
            CompatibilityMode::Full => "full",
            CompatibilityMode::None => "none",
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backward" => Ok(CompatibilityMode::Backward),
            "forward" => Ok(CompatibilityMode::Forward),
            "full" => Ok(CompatibilityMode::Full),
            "none" => Ok(CompatibilityMode::None),
            other => Err(format!("unknown compatibility mode: {other}")),
        }
    }
}

/// Semantic versioning change classification.
///
/// Ordered so that `Patch < Minor < Major`, which lets callers fold a set
/// of changes with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    #[default]
    Patch,
    Minor,
    Major,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Patch => "patch",
            ChangeType::Minor => "minor",
            ChangeType::Major => "major",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How guarantee (data quality metadata) changes are treated on publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeMode {
    /// Guarantee changes are not examined at all.
    Ignore,
    /// Changes are reported but never block.
    #[default]
    Notify,
    /// Warning-level changes are treated as breaking.
    Strict,
}

// ============================================================================
// ENTITY LIFECYCLE ENUMS
// ============================================================================

/// Lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Active,
    Deprecated,
    Retired,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Deprecated => "deprecated",
            ContractStatus::Retired => "retired",
        }
    }
}

/// Status of a consumer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Active,
    Migrating,
    Inactive,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Active => "active",
            RegistrationStatus::Migrating => "migrating",
            RegistrationStatus::Inactive => "inactive",
        }
    }
}

/// Status of a breaking change proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Withdrawn,
    Published,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Withdrawn => "withdrawn",
            ProposalStatus::Published => "published",
        }
    }

    /// Whether the proposal has reached a terminal state.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer response to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum AckResponse {
    Approved,
    Blocked,
    Migrating,
}

impl AckResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckResponse::Approved => "approved",
            AckResponse::Blocked => "blocked",
            AckResponse::Migrating => "migrating",
        }
    }

    /// Whether this response counts toward approval of the proposal.
    pub fn is_assenting(&self) -> bool {
        matches!(self, AckResponse::Approved | AckResponse::Migrating)
    }
}

// ============================================================================
// ASSET & DEPENDENCY ENUMS
// ============================================================================

/// Kind of data asset a contract is published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    #[default]
    Table,
    View,
    Model,
    ApiEndpoint,
    GraphqlQuery,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Table => "table",
            ResourceType::View => "view",
            ResourceType::Model => "model",
            ResourceType::ApiEndpoint => "api_endpoint",
            ResourceType::GraphqlQuery => "graphql_query",
        }
    }
}

/// Type of asset-to-asset dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Direct data consumption (SELECT FROM).
    #[default]
    Consumes,
    /// Foreign key or reference.
    References,
    /// Data transformation (derived model).
    Transforms,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Consumes => "consumes",
            DependencyKind::References => "references",
            DependencyKind::Transforms => "transforms",
        }
    }
}

// ============================================================================
// AUTH & AUDIT ENUMS
// ============================================================================

/// API key permission scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyScope {
    /// GET endpoints, list/view operations.
    Read,
    /// POST/PUT/PATCH, create/update operations.
    Write,
    /// Force paths, deletes, key and team management.
    Admin,
}

impl ApiKeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKeyScope::Read => "read",
            ApiKeyScope::Write => "write",
            ApiKeyScope::Admin => "admin",
        }
    }
}

impl FromStr for ApiKeyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(ApiKeyScope::Read),
            "write" => Ok(ApiKeyScope::Write),
            "admin" => Ok(ApiKeyScope::Admin),
            other => Err(format!("unknown api key scope: {other}")),
        }
    }
}

/// Entity type discriminator for audit events and polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Team,
    Asset,
    Contract,
    Registration,
    Proposal,
    Acknowledgment,
    Dependency,
    ApiKey,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Team => "team",
            EntityType::Asset => "asset",
            EntityType::Contract => "contract",
            EntityType::Registration => "registration",
            EntityType::Proposal => "proposal",
            EntityType::Acknowledgment => "acknowledgment",
            EntityType::Dependency => "dependency",
            EntityType::ApiKey => "api_key",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team" => Ok(EntityType::Team),
            "asset" => Ok(EntityType::Asset),
            "contract" => Ok(EntityType::Contract),
            "registration" => Ok(EntityType::Registration),
            "proposal" => Ok(EntityType::Proposal),
            "acknowledgment" => Ok(EntityType::Acknowledgment),
            "dependency" => Ok(EntityType::Dependency),
            "api_key" => Ok(EntityType::ApiKey),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action recorded in the audit log.
///
/// The wire form is dotted (`contract.published`); the audit log is
/// append-only so the set only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AuditAction {
    #[serde(rename = "team.created")]
    TeamCreated,
    #[serde(rename = "team.deleted")]
    TeamDeleted,
    #[serde(rename = "asset.created")]
    AssetCreated,
    #[serde(rename = "asset.updated")]
    AssetUpdated,
    #[serde(rename = "asset.deleted")]
    AssetDeleted,
    #[serde(rename = "contract.published")]
    ContractPublished,
    #[serde(rename = "contract.force_published")]
    ContractForcePublished,
    #[serde(rename = "contract.deprecated")]
    ContractDeprecated,
    #[serde(rename = "contract.guarantees_updated")]
    GuaranteesUpdated,
    #[serde(rename = "registration.created")]
    RegistrationCreated,
    #[serde(rename = "registration.updated")]
    RegistrationUpdated,
    #[serde(rename = "registration.deleted")]
    RegistrationDeleted,
    #[serde(rename = "proposal.opened")]
    ProposalOpened,
    #[serde(rename = "proposal.acknowledged")]
    ProposalAcknowledged,
    #[serde(rename = "proposal.approved")]
    ProposalApproved,
    #[serde(rename = "proposal.rejected")]
    ProposalRejected,
    #[serde(rename = "proposal.withdrawn")]
    ProposalWithdrawn,
    #[serde(rename = "proposal.force_approved")]
    ProposalForceApproved,
    #[serde(rename = "proposal.published")]
    ProposalPublished,
    #[serde(rename = "dependency.added")]
    DependencyAdded,
    #[serde(rename = "dependency.removed")]
    DependencyRemoved,
    #[serde(rename = "api_key.created")]
    ApiKeyCreated,
    #[serde(rename = "api_key.revoked")]
    ApiKeyRevoked,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::TeamCreated => "team.created",
            AuditAction::TeamDeleted => "team.deleted",
            AuditAction::AssetCreated => "asset.created",
            AuditAction::AssetUpdated => "asset.updated",
            AuditAction::AssetDeleted => "asset.deleted",
            AuditAction::ContractPublished => "contract.published",
            AuditAction::ContractForcePublished => "contract.force_published",
            AuditAction::ContractDeprecated => "contract.deprecated",
            AuditAction::GuaranteesUpdated => "contract.guarantees_updated",
            AuditAction::RegistrationCreated => "registration.created",
            AuditAction::RegistrationUpdated => "registration.updated",
            AuditAction::RegistrationDeleted => "registration.deleted",
            AuditAction::ProposalOpened => "proposal.opened",
            AuditAction::ProposalAcknowledged => "proposal.acknowledged",
            AuditAction::ProposalApproved => "proposal.approved",
            AuditAction::ProposalRejected => "proposal.rejected",
            AuditAction::ProposalWithdrawn => "proposal.withdrawn",
            AuditAction::ProposalForceApproved => "proposal.force_approved",
            AuditAction::ProposalPublished => "proposal.published",
            AuditAction::DependencyAdded => "dependency.added",
            AuditAction::DependencyRemoved => "dependency.removed",
            AuditAction::ApiKeyCreated => "api_key.created",
            AuditAction::ApiKeyRevoked => "api_key.revoked",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team.created" => Ok(AuditAction::TeamCreated),
            "team.deleted" => Ok(AuditAction::TeamDeleted),
            "asset.created" => Ok(AuditAction::AssetCreated),
            "asset.updated" => Ok(AuditAction::AssetUpdated),
            "asset.deleted" => Ok(AuditAction::AssetDeleted),
            "contract.published" => Ok(AuditAction::ContractPublished),
            "contract.force_published" => Ok(AuditAction::ContractForcePublished),
            "contract.deprecated" => Ok(AuditAction::ContractDeprecated),
            "contract.guarantees_updated" => Ok(AuditAction::GuaranteesUpdated),
            "registration.created" => Ok(AuditAction::RegistrationCreated),
            "registration.updated" => Ok(AuditAction::RegistrationUpdated),
            "registration.deleted" => Ok(AuditAction::RegistrationDeleted),
            "proposal.opened" => Ok(AuditAction::ProposalOpened),
            "proposal.acknowledged" => Ok(AuditAction::ProposalAcknowledged),
            "proposal.approved" => Ok(AuditAction::ProposalApproved),
            "proposal.rejected" => Ok(AuditAction::ProposalRejected),
            "proposal.withdrawn" => Ok(AuditAction::ProposalWithdrawn),
            "proposal.force_approved" => Ok(AuditAction::ProposalForceApproved),
            "proposal.published" => Ok(AuditAction::ProposalPublished),
            "dependency.added" => Ok(AuditAction::DependencyAdded),
            "dependency.removed" => Ok(AuditAction::DependencyRemoved),
            "api_key.created" => Ok(AuditAction::ApiKeyCreated),
            "api_key.revoked" => Ok(AuditAction::ApiKeyRevoked),
            other => Err(format!("unknown audit action: {other}")),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_ordering() {
        assert!(ChangeType::Patch < ChangeType::Minor);
        assert!(ChangeType::Minor < ChangeType::Major);
        assert_eq!(
            [ChangeType::Minor, ChangeType::Major, ChangeType::Patch]
                .into_iter()
                .max(),
            Some(ChangeType::Major)
        );
    }

    #[test]
    fn test_compatibility_mode_round_trip() {
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let parsed: CompatibilityMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn test_audit_action_wire_form() {
        let json = serde_json::to_string(&AuditAction::ContractPublished).unwrap();
        assert_eq!(json, "\"contract.published\"");
        let parsed: AuditAction = "proposal.force_approved".parse().unwrap();
        assert_eq!(parsed, AuditAction::ProposalForceApproved);
    }

    #[test]
    fn test_ack_response_assenting() {
        assert!(AckResponse::Approved.is_assenting());
        assert!(AckResponse::Migrating.is_assenting());
        assert!(!AckResponse::Blocked.is_assenting());
    }
}
