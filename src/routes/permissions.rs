use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::{Capability, PermissionGrant};
use crate::db::CareRelationshipRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::permissions::PermissionService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:user_id", get(list_grants)).route(
        "/:user_id/:caregiver_id/:capability",
        axum::routing::put(set_grant).delete(revoke_grant),
    )
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetGrantRequest {
    pub is_granted: bool,
    #[serde(default)]
    pub is_locked: bool,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub user_id: String,
    pub caregiver_id: String,
    pub capability: Capability,
    pub is_granted: bool,
    pub is_locked: bool,
    pub granted_by: String,
    pub updated_at: NaiveDateTime,
}

impl From<PermissionGrant> for GrantResponse {
    fn from(g: PermissionGrant) -> Self {
        Self {
            user_id: g.user_id,
            caregiver_id: g.caregiver_id,
            capability: g.capability,
            is_granted: g.is_granted,
            is_locked: g.is_locked,
            granted_by: g.granted_by,
            updated_at: g.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_capability(raw: &str) -> AppResult<Capability> {
    raw.parse::<Capability>().map_err(AppError::Validation)
}

/// Is the actor the user themself, or an active caregiver of the user?
async fn ensure_participant(state: &AppState, actor_id: &str, user_id: &str) -> AppResult<()> {
    if actor_id == user_id {
        return Ok(());
    }
    let related =
        CareRelationshipRepository::find_active_pair(&state.db, actor_id, user_id).await?;
    if related.is_none() {
        return Err(AppError::PermissionDenied(
            "No active care relationship with this user".to_string(),
        ));
    }
    Ok(())
}

/// List all grants configured for a user.
async fn list_grants(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<GrantResponse>>> {
    ensure_participant(&state, &actor.id, &user_id).await?;

    let grants = PermissionService::list_for_user(&state.db, &user_id).await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

/// Upsert a grant. The caregiver configures their own grants; an active
/// primary caregiver may also configure grants for other caregivers.
async fn set_grant(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, caregiver_id, capability)): Path<(String, String, String)>,
    Json(request): Json<SetGrantRequest>,
) -> AppResult<Json<GrantResponse>> {
    let capability = parse_capability(&capability)?;

    if actor.id != caregiver_id {
        let actor_rel =
            CareRelationshipRepository::find_active_pair(&state.db, &actor.id, &user_id).await?;
        let is_primary = actor_rel.map(|r| r.is_primary).unwrap_or(false);
        if !is_primary {
            return Err(AppError::PermissionDenied(
                "Only the caregiver or a primary caregiver can configure this grant".to_string(),
            ));
        }
    }

    let grant = PermissionService::set_grant(
        &state.db,
        &user_id,
        &caregiver_id,
        capability,
        request.is_granted,
        request.is_locked,
        &actor.id,
    )
    .await?;

    Ok(Json(grant.into()))
}

/// Remove a grant row. 404 when there is nothing to remove.
async fn revoke_grant(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, caregiver_id, capability)): Path<(String, String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let capability = parse_capability(&capability)?;

    let removed =
        PermissionService::revoke(&state.db, &user_id, &caregiver_id, capability, &actor.id)
            .await?;
    if !removed {
        return Err(AppError::NotFound("Permission grant not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
