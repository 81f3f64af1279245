//! Embedded DDL for the three logical namespaces.
//!
//! Schema version: 3

/// DDL for all Covenant tables. Idempotent; applied by [`crate::PgStore::migrate`].
pub const SCHEMA: &str = r#"
CREATE SCHEMA IF NOT EXISTS core;
CREATE SCHEMA IF NOT EXISTS workflow;
CREATE SCHEMA IF NOT EXISTS audit;

-- Teams own assets and respond to proposals.
CREATE TABLE IF NOT EXISTS core.teams (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL,
    metadata    JSONB NOT NULL DEFAULT '{}',
    created_at  TIMESTAMPTZ NOT NULL,
    deleted_at  TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_teams_live_name
    ON core.teams (name) WHERE deleted_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_teams_live_slug
    ON core.teams (slug) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS core.assets (
    id                   UUID PRIMARY KEY,
    fqn                  TEXT NOT NULL,
    owner_team_id        UUID NOT NULL REFERENCES core.teams(id),
    resource_type        TEXT NOT NULL,
    current_contract_id  UUID,
    metadata             JSONB NOT NULL DEFAULT '{}',
    created_at           TIMESTAMPTZ NOT NULL,
    deleted_at           TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_assets_live_fqn
    ON core.assets (fqn) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_assets_owner
    ON core.assets (owner_team_id);

CREATE TABLE IF NOT EXISTS core.contracts (
    id                  UUID PRIMARY KEY,
    asset_id            UUID NOT NULL REFERENCES core.assets(id),
    version             TEXT NOT NULL,
    schema              JSONB NOT NULL,
    compatibility_mode  TEXT NOT NULL,
    guarantees          JSONB,
    status              TEXT NOT NULL,
    published_at        TIMESTAMPTZ NOT NULL,
    published_by        UUID NOT NULL,
    UNIQUE (asset_id, version)
);
CREATE INDEX IF NOT EXISTS idx_contracts_asset_status
    ON core.contracts (asset_id, status);

CREATE TABLE IF NOT EXISTS core.registrations (
    id                UUID PRIMARY KEY,
    asset_id          UUID NOT NULL REFERENCES core.assets(id),
    consumer_team_id  UUID NOT NULL REFERENCES core.teams(id),
    pinned_version    TEXT,
    status            TEXT NOT NULL,
    registered_at     TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_registrations_asset
    ON core.registrations (asset_id, status);

CREATE TABLE IF NOT EXISTS core.dependencies (
    id                   UUID PRIMARY KEY,
    upstream_asset_id    UUID NOT NULL REFERENCES core.assets(id),
    downstream_asset_id  UUID NOT NULL REFERENCES core.assets(id),
    kind                 TEXT NOT NULL,
    created_at           TIMESTAMPTZ NOT NULL,
    deleted_at           TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_dependencies_upstream
    ON core.dependencies (upstream_asset_id) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS core.api_keys (
    id            UUID PRIMARY KEY,
    team_id       UUID NOT NULL REFERENCES core.teams(id),
    name          TEXT NOT NULL,
    key_hash      BYTEA NOT NULL,
    scopes        TEXT[] NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    last_used_at  TIMESTAMPTZ,
    revoked_at    TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_api_keys_hash
    ON core.api_keys (key_hash) WHERE revoked_at IS NULL;

CREATE TABLE IF NOT EXISTS workflow.proposals (
    id                           UUID PRIMARY KEY,
    asset_id                     UUID NOT NULL REFERENCES core.assets(id),
    base_contract_id             UUID NOT NULL,
    proposed_schema              JSONB NOT NULL,
    proposed_version             TEXT NOT NULL,
    proposed_compatibility_mode  TEXT NOT NULL,
    proposed_guarantees          JSONB,
    breaking_changes             JSONB NOT NULL DEFAULT '[]',
    change_type                  TEXT NOT NULL,
    status                       TEXT NOT NULL,
    pending_consumers            UUID[] NOT NULL DEFAULT '{}',
    proposed_by                  UUID NOT NULL,
    proposed_at                  TIMESTAMPTZ NOT NULL,
    resolved_at                  TIMESTAMPTZ
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_proposals_one_pending_per_asset
    ON workflow.proposals (asset_id) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS workflow.acknowledgments (
    id                  UUID PRIMARY KEY,
    proposal_id         UUID NOT NULL REFERENCES workflow.proposals(id),
    consumer_team_id    UUID NOT NULL,
    response            TEXT NOT NULL,
    migration_deadline  TIMESTAMPTZ,
    notes               TEXT,
    responded_at        TIMESTAMPTZ NOT NULL,
    UNIQUE (proposal_id, consumer_team_id)
);

-- Append-only; no UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit.events (
    id           UUID PRIMARY KEY,
    entity_type  TEXT NOT NULL,
    entity_id    UUID NOT NULL,
    action       TEXT NOT NULL,
    actor_id     UUID,
    payload      JSONB NOT NULL DEFAULT '{}',
    occurred_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_keyset
    ON audit.events (occurred_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_audit_entity
    ON audit.events (entity_type, entity_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_creates_three_namespaces() {
        for schema in ["CREATE SCHEMA IF NOT EXISTS core",
                       "CREATE SCHEMA IF NOT EXISTS workflow",
                       "CREATE SCHEMA IF NOT EXISTS audit"] {
            assert!(SCHEMA.contains(schema));
        }
    }

    #[test]
    fn test_schema_enforces_core_uniqueness() {
        assert!(SCHEMA.contains("idx_assets_live_fqn"));
        assert!(SCHEMA.contains("idx_proposals_one_pending_per_asset"));
        assert!(SCHEMA.contains("UNIQUE (proposal_id, consumer_team_id)"));
        assert!(SCHEMA.contains("UNIQUE (asset_id, version)"));
    }
}
