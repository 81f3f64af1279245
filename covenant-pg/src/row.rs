//! Row-to-entity conversion.

use covenant_core::{
    Acknowledgment, ApiKey, Asset, AssetDependency, AuditEvent, Contract, Guarantees, KeyHash,
    Proposal, Registration, StoreError, Team,
};
use serde_json::Value;
use tokio_postgres::Row;

type RowResult<T> = Result<T, StoreError>;

fn conversion(reason: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        reason: reason.to_string(),
    }
}

fn get<'a, T: tokio_postgres::types::FromSql<'a>>(row: &'a Row, column: &str) -> RowResult<T> {
    row.try_get(column).map_err(conversion)
}

/// Parse a TEXT column into one of the string-form enums.
fn parse_enum<T: serde::de::DeserializeOwned>(row: &Row, column: &str) -> RowResult<T> {
    let raw: String = get(row, column)?;
    serde_json::from_value(Value::String(raw)).map_err(conversion)
}

fn parse_guarantees(row: &Row, column: &str) -> RowResult<Option<Guarantees>> {
    let raw: Option<Value> = get(row, column)?;
    match raw {
        None => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(conversion),
    }
}

pub(crate) fn team_from_row(row: &Row) -> RowResult<Team> {
    Ok(Team {
        team_id: get::<uuid::Uuid>(row, "id")?.into(),
        name: get(row, "name")?,
        slug: get(row, "slug")?,
        metadata: get(row, "metadata")?,
        created_at: get(row, "created_at")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

pub(crate) fn asset_from_row(row: &Row) -> RowResult<Asset> {
    Ok(Asset {
        asset_id: get::<uuid::Uuid>(row, "id")?.into(),
        fqn: get(row, "fqn")?,
        owner_team_id: get::<uuid::Uuid>(row, "owner_team_id")?.into(),
        resource_type: parse_enum(row, "resource_type")?,
        current_contract_id: get::<Option<uuid::Uuid>>(row, "current_contract_id")?.map(Into::into),
        metadata: get(row, "metadata")?,
        created_at: get(row, "created_at")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

pub(crate) fn contract_from_row(row: &Row) -> RowResult<Contract> {
    Ok(Contract {
        contract_id: get::<uuid::Uuid>(row, "id")?.into(),
        asset_id: get::<uuid::Uuid>(row, "asset_id")?.into(),
        version: get(row, "version")?,
        schema: get(row, "schema")?,
        compatibility_mode: parse_enum(row, "compatibility_mode")?,
        guarantees: parse_guarantees(row, "guarantees")?,
        status: parse_enum(row, "status")?,
        published_at: get(row, "published_at")?,
        published_by: get::<uuid::Uuid>(row, "published_by")?.into(),
    })
}

pub(crate) fn registration_from_row(row: &Row) -> RowResult<Registration> {
    Ok(Registration {
        registration_id: get::<uuid::Uuid>(row, "id")?.into(),
        asset_id: get::<uuid::Uuid>(row, "asset_id")?.into(),
        consumer_team_id: get::<uuid::Uuid>(row, "consumer_team_id")?.into(),
        pinned_version: get(row, "pinned_version")?,
        status: parse_enum(row, "status")?,
        registered_at: get(row, "registered_at")?,
    })
}

pub(crate) fn proposal_from_row(row: &Row) -> RowResult<Proposal> {
    let breaking: Value = get(row, "breaking_changes")?;
    let breaking_changes = match breaking {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    Ok(Proposal {
        proposal_id: get::<uuid::Uuid>(row, "id")?.into(),
        asset_id: get::<uuid::Uuid>(row, "asset_id")?.into(),
        base_contract_id: get::<uuid::Uuid>(row, "base_contract_id")?.into(),
        proposed_schema: get(row, "proposed_schema")?,
        proposed_version: get(row, "proposed_version")?,
        proposed_compatibility_mode: parse_enum(row, "proposed_compatibility_mode")?,
        proposed_guarantees: parse_guarantees(row, "proposed_guarantees")?,
        breaking_changes,
        change_type: parse_enum(row, "change_type")?,
        status: parse_enum(row, "status")?,
        pending_consumers: get::<Vec<uuid::Uuid>>(row, "pending_consumers")?
            .into_iter()
            .map(Into::into)
            .collect(),
        proposed_by: get::<uuid::Uuid>(row, "proposed_by")?.into(),
        proposed_at: get(row, "proposed_at")?,
        resolved_at: get(row, "resolved_at")?,
    })
}

pub(crate) fn ack_from_row(row: &Row) -> RowResult<Acknowledgment> {
    Ok(Acknowledgment {
        ack_id: get::<uuid::Uuid>(row, "id")?.into(),
        proposal_id: get::<uuid::Uuid>(row, "proposal_id")?.into(),
        consumer_team_id: get::<uuid::Uuid>(row, "consumer_team_id")?.into(),
        response: parse_enum(row, "response")?,
        migration_deadline: get(row, "migration_deadline")?,
        notes: get(row, "notes")?,
        responded_at: get(row, "responded_at")?,
    })
}

pub(crate) fn dependency_from_row(row: &Row) -> RowResult<AssetDependency> {
    Ok(AssetDependency {
        dependency_id: get::<uuid::Uuid>(row, "id")?.into(),
        upstream_asset_id: get::<uuid::Uuid>(row, "upstream_asset_id")?.into(),
        downstream_asset_id: get::<uuid::Uuid>(row, "downstream_asset_id")?.into(),
        kind: parse_enum(row, "kind")?,
        created_at: get(row, "created_at")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

pub(crate) fn api_key_from_row(row: &Row) -> RowResult<ApiKey> {
    let hash_bytes: Vec<u8> = get(row, "key_hash")?;
    let key_hash: KeyHash = hash_bytes
        .try_into()
        .map_err(|_| conversion("key_hash must be exactly 32 bytes"))?;
    let scopes: Vec<String> = get(row, "scopes")?;
    let scopes = scopes
        .into_iter()
        .map(|s| s.parse().map_err(conversion))
        .collect::<RowResult<Vec<_>>>()?;
    Ok(ApiKey {
        api_key_id: get::<uuid::Uuid>(row, "id")?.into(),
        team_id: get::<uuid::Uuid>(row, "team_id")?.into(),
        name: get(row, "name")?,
        key_hash,
        scopes,
        created_at: get(row, "created_at")?,
        last_used_at: get(row, "last_used_at")?,
        revoked_at: get(row, "revoked_at")?,
    })
}

pub(crate) fn audit_event_from_row(row: &Row) -> RowResult<AuditEvent> {
    Ok(AuditEvent {
        event_id: get::<uuid::Uuid>(row, "id")?.into(),
        entity_type: parse_enum(row, "entity_type")?,
        entity_id: get(row, "entity_id")?,
        action: parse_enum(row, "action")?,
        actor_id: get(row, "actor_id")?,
        payload: get(row, "payload")?,
        occurred_at: get(row, "occurred_at")?,
    })
}
