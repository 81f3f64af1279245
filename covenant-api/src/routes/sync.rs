//! Bulk publish (sync) routes, used by CI pipelines pushing a whole
//! warehouse manifest at once.

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::services::{bulk_publish, BulkContractItem, BulkPublishResult};
use crate::state::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use covenant_core::{ApiKeyScope, EntityIdType, TeamId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct SyncPublishRequest {
    pub contracts: Vec<BulkContractItem>,
    /// Preview outcomes without writing anything. Defaults to true: a
    /// sync must opt in to mutating the registry.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub create_proposals_for_breaking: bool,
    /// Admins may publish on behalf of another team.
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub publisher_team_id: Option<TeamId>,
}

fn default_true() -> bool {
    true
}

/// POST /api/v1/sync/publish
#[utoipa::path(
    post,
    path = "/api/v1/sync/publish",
    tag = "Sync",
    request_body = SyncPublishRequest,
    responses((status = 200, description = "Per-item outcomes", body = BulkPublishResult))
)]
pub async fn sync_publish(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<SyncPublishRequest>,
) -> ApiResult<Json<BulkPublishResult>> {
    auth.require_scope(ApiKeyScope::Write)?;
    let publisher = body.publisher_team_id.unwrap_or(auth.team_id);
    auth.require_team(publisher)?;
    if publisher.as_uuid().is_nil() {
        return Err(ApiError::validation(
            "publisher_team_id is required when using a root API key",
        ));
    }

    let result = bulk_publish(
        &state,
        body.contracts,
        publisher,
        body.dry_run,
        body.create_proposals_for_breaking,
    )
    .await?;
    Ok(Json(result))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/publish", post(sync_publish))
}
