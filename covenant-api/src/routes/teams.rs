//! Team routes.

use crate::audit::{log_entity_event, Effects};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use covenant_core::{
    ApiKeyScope, AuditAction, EntityIdType, EntityType, Page, Team, TeamId,
};
use covenant_storage::StoreTx;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct CreateTeamRequest {
    pub name: String,
    /// Defaults to a slugified form of the name.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[derive(utoipa::IntoParams)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit.unwrap_or(50),
            offset: self.offset.unwrap_or(0),
        }
        .clamped()
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if (c == ' ' || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// POST /api/v1/teams
#[utoipa::path(
    post,
    path = "/api/v1/teams",
    tag = "Teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = Team),
        (status = 409, description = "Name or slug already taken", body = ApiError),
    )
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CreateTeamRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<Team>)> {
    auth.require_scope(ApiKeyScope::Write)?;
    if body.name.trim().is_empty() {
        return Err(ApiError::validation("Team name must not be empty"));
    }

    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());
    let team = Team {
        team_id: TeamId::new(state.ids.new_id()),
        name: body.name.trim().to_string(),
        slug: body
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| slugify(&body.name)),
        metadata: body.metadata.unwrap_or_else(|| json!({})),
        created_at: state.clock.now(),
        deleted_at: None,
    };

    let mut tx = state.store.begin().await?;
    tx.team_insert(&team).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Team,
        team.team_id.as_uuid(),
        AuditAction::TeamCreated,
        auth.team_id,
        json!({ "name": team.name, "slug": team.slug }),
    )
    .await?;
    tx.commit().await?;

    Ok((axum::http::StatusCode::CREATED, Json(team)))
}

/// GET /api/v1/teams
#[utoipa::path(
    get,
    path = "/api/v1/teams",
    tag = "Teams",
    params(ListQuery),
    responses((status = 200, description = "Live teams", body = Vec<Team>))
)]
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Team>>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    let teams = tx.team_list(query.page()).await?;
    tx.rollback().await?;
    Ok(Json(teams))
}

/// GET /api/v1/teams/{id}
#[utoipa::path(
    get,
    path = "/api/v1/teams/{id}",
    tag = "Teams",
    params(("id" = String, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team", body = Team),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<TeamId>,
) -> ApiResult<Json<Team>> {
    auth.require_scope(ApiKeyScope::Read)?;
    let mut tx = state.store.begin().await?;
    let team = tx.team_get(id).await?;
    tx.rollback().await?;
    team.map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Team {id} not found")))
}

/// DELETE /api/v1/teams/{id} - soft delete.
#[utoipa::path(
    delete,
    path = "/api/v1/teams/{id}",
    tag = "Teams",
    params(("id" = String, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team soft-deleted", body = Team),
        (status = 404, description = "Not found", body = ApiError),
    )
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<TeamId>,
) -> ApiResult<Json<Team>> {
    auth.require_scope(ApiKeyScope::Admin)?;
    let effects = Effects::new(state.clock.as_ref(), state.ids.as_ref());

    let mut tx = state.store.begin().await?;
    let mut team = tx
        .team_get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Team {id} not found")))?;
    team.deleted_at = Some(state.clock.now());
    tx.team_update(&team).await?;
    log_entity_event(
        &mut *tx,
        &effects,
        EntityType::Team,
        team.team_id.as_uuid(),
        AuditAction::TeamDeleted,
        auth.team_id,
        json!({ "name": team.name }),
    )
    .await?;
    tx.commit().await?;
    Ok(Json(team))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_team).get(list_teams))
        .route("/:id", get(get_team).delete(delete_team))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Data Platform"), "data-platform");
        assert_eq!(slugify("  Analytics__Core "), "analytics-core");
        assert_eq!(slugify("ml/ops"), "mlops");
    }
}
