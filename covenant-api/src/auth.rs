//! Authentication and authorization.
//!
//! Requests authenticate with an API key in the `X-API-Key` header. Only
//! the SHA-256 digest of a key is ever stored; lookup hashes the
//! presented secret and compares digests. Scopes are `read`, `write`,
//! `admin`; admin implies the others.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use covenant_core::{hash_api_key, ApiKeyId, ApiKeyScope, EntityIdType, TeamId};
use covenant_storage::StoreTx;
use uuid::Uuid;

/// Header carrying the API key secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Prefix for generated key secrets, so they are recognisable in config
/// files and never mistaken for other credentials.
pub const KEY_PREFIX: &str = "cov_";

/// The authenticated caller, attached to request extensions by the auth
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub api_key_id: Option<ApiKeyId>,
    pub team_id: TeamId,
    pub scopes: Vec<ApiKeyScope>,
}

impl AuthContext {
    /// A root context from a statically configured bootstrap key.
    pub fn root() -> Self {
        Self {
            api_key_id: None,
            team_id: TeamId::nil(),
            scopes: vec![ApiKeyScope::Admin],
        }
    }

    pub fn has_scope(&self, scope: ApiKeyScope) -> bool {
        self.scopes.contains(&scope) || self.scopes.contains(&ApiKeyScope::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.scopes.contains(&ApiKeyScope::Admin)
    }

    /// Enforce a scope, mirroring the HTTP layer's 403 contract.
    pub fn require_scope(&self, scope: ApiKeyScope) -> ApiResult<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "API key lacks required scope '{}'",
                scope.as_str()
            )))
        }
    }

    /// Actors act as their own team unless they hold admin scope.
    pub fn require_team(&self, team_id: TeamId) -> ApiResult<()> {
        if self.team_id == team_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "Operation not permitted for this team's API key",
            ))
        }
    }
}

/// Generate a fresh API key secret. Returned to the caller exactly once;
/// only the digest is persisted.
pub fn generate_key_secret(ids: &dyn covenant_core::IdGen) -> String {
    let a = ids.new_id().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{KEY_PREFIX}{a}{b}")
}

/// Resolve a presented secret to an [`AuthContext`].
pub async fn authenticate(state: &AppState, presented: &str) -> ApiResult<AuthContext> {
    if state.config.root_api_keys.contains(presented) {
        return Ok(AuthContext::root());
    }

    let hash = hash_api_key(presented);
    let mut tx = state.store.begin().await?;
    let key = tx.api_key_find_by_hash(&hash).await?;
    tx.rollback().await?;

    let key = key.ok_or_else(|| ApiError::unauthorized("Invalid API key"))?;
    Ok(AuthContext {
        api_key_id: Some(key.api_key_id),
        team_id: key.team_id,
        scopes: key.scopes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_context_is_admin() {
        let ctx = AuthContext::root();
        assert!(ctx.is_admin());
        assert!(ctx.has_scope(ApiKeyScope::Read));
        assert!(ctx.has_scope(ApiKeyScope::Write));
    }

    #[test]
    fn test_scope_enforcement() {
        let ctx = AuthContext {
            api_key_id: None,
            team_id: TeamId::now_v7(),
            scopes: vec![ApiKeyScope::Read],
        };
        assert!(ctx.require_scope(ApiKeyScope::Read).is_ok());
        assert!(ctx.require_scope(ApiKeyScope::Write).is_err());
        assert!(ctx.require_scope(ApiKeyScope::Admin).is_err());
    }

    #[test]
    fn test_team_enforcement() {
        let own = TeamId::now_v7();
        let other = TeamId::now_v7();
        let ctx = AuthContext {
            api_key_id: None,
            team_id: own,
            scopes: vec![ApiKeyScope::Write],
        };
        assert!(ctx.require_team(own).is_ok());
        assert!(ctx.require_team(other).is_err());

        let admin = AuthContext {
            scopes: vec![ApiKeyScope::Admin],
            ..ctx
        };
        assert!(admin.require_team(other).is_ok());
    }

    #[test]
    fn test_generated_secrets_are_unique_and_prefixed() {
        let ids = covenant_core::SequentialIdGen::new();
        let a = generate_key_secret(&ids);
        let b = generate_key_secret(&ids);
        assert!(a.starts_with(KEY_PREFIX));
        assert_ne!(a, b);
    }
}
