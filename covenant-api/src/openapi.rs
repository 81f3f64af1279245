//! OpenAPI document for the Covenant API.

use crate::routes;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Registers the `X-API-Key` security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Covenant API",
        description = "Data contract coordination: publish versioned schema \
                       contracts, register consumers, analyse compatibility and \
                       gate breaking changes behind acknowledgment proposals.",
    ),
    paths(
        routes::health::health,
        routes::teams::create_team,
        routes::teams::list_teams,
        routes::teams::get_team,
        routes::teams::delete_team,
        routes::assets::create_asset,
        routes::assets::list_assets,
        routes::assets::get_asset,
        routes::assets::delete_asset,
        routes::assets::add_dependency,
        routes::assets::list_dependencies,
        routes::assets::asset_impact,
        routes::contracts::publish,
        routes::contracts::list_contracts,
        routes::contracts::get_contract,
        routes::contracts::diff_contracts_route,
        routes::contracts::compare,
        routes::registrations::create_registration,
        routes::registrations::list_registrations,
        routes::registrations::update_registration,
        routes::registrations::delete_registration,
        routes::proposals::list_proposals,
        routes::proposals::get_proposal,
        routes::proposals::proposal_status,
        routes::proposals::acknowledge_proposal,
        routes::proposals::withdraw_proposal,
        routes::proposals::force_proposal,
        routes::proposals::publish_proposal_route,
        routes::api_keys::create_api_key,
        routes::api_keys::list_api_keys,
        routes::api_keys::revoke_api_key,
        routes::audit::query_audit,
        routes::sync::sync_publish,
    ),
    components(schemas(
        covenant_core::Team,
        covenant_core::Asset,
        covenant_core::Contract,
        covenant_core::Registration,
        covenant_core::Proposal,
        covenant_core::Acknowledgment,
        covenant_core::AssetDependency,
        covenant_core::AuditEvent,
        covenant_core::ApiKey,
        covenant_core::Guarantees,
        covenant_core::CompatibilityMode,
        covenant_core::ChangeType,
        covenant_core::ContractStatus,
        covenant_core::RegistrationStatus,
        covenant_core::ProposalStatus,
        covenant_core::AckResponse,
        covenant_core::ResourceType,
        covenant_core::DependencyKind,
        covenant_core::ApiKeyScope,
        covenant_core::EntityType,
        covenant_core::AuditAction,
        crate::error::ErrorCode,
        crate::error::ErrorBody,
        crate::error::ApiError,
        crate::services::publish::PublishAction,
        crate::services::publish::PublishOutcome,
        crate::services::impact::ImpactReport,
        crate::services::impact::ImpactedConsumer,
        crate::services::impact::ImpactedAsset,
        crate::services::sync::BulkContractItem,
        crate::services::sync::BulkItemResult,
        crate::services::sync::BulkPublishResult,
        routes::health::HealthResponse,
        routes::teams::CreateTeamRequest,
        routes::assets::CreateAssetRequest,
        routes::assets::AddDependencyRequest,
        routes::assets::ImpactRequest,
        routes::contracts::PublishBody,
        routes::contracts::CompareRequest,
        routes::contracts::DiffResponse,
        routes::registrations::CreateRegistrationRequest,
        routes::registrations::UpdateRegistrationRequest,
        routes::proposals::AcknowledgeRequest,
        routes::proposals::ProposalPublishRequest,
        routes::proposals::AcknowledgeResponse,
        routes::proposals::ProposalPublishResponse,
        routes::api_keys::CreateApiKeyRequest,
        routes::api_keys::CreatedApiKeyResponse,
        routes::audit::AuditPage,
        routes::sync::SyncPublishRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health"),
        (name = "Teams"),
        (name = "Assets"),
        (name = "Contracts"),
        (name = "Registrations"),
        (name = "Proposals"),
        (name = "ApiKeys"),
        (name = "Audit"),
        (name = "Sync"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("document serializes");
        assert!(json.contains("/api/v1/assets/{asset_id}/contracts"));
        assert!(json.contains("X-API-Key"));
    }
}
