use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::{CareRelationship, EstablishedVia, RelationshipKind};
use crate::db::CareRelationshipRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/caregivers", get(list_caregivers))
        .route("/caregiving", get(list_caregiving))
        .route("/:id", delete(deactivate))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// One side of a relationship plus the other party's display name.
#[derive(Debug, Serialize)]
pub struct RelationshipEntryResponse {
    pub id: String,
    pub caregiver_id: String,
    pub user_id: String,
    pub display_name: String,
    pub relationship: RelationshipKind,
    pub is_primary: bool,
    pub established_via: EstablishedVia,
    pub established_at: NaiveDateTime,
}

impl RelationshipEntryResponse {
    fn from_pair((r, display_name): (CareRelationship, String)) -> Self {
        Self {
            id: r.id,
            caregiver_id: r.caregiver_id,
            user_id: r.user_id,
            display_name,
            relationship: r.relationship,
            is_primary: r.is_primary,
            established_via: r.established_via,
            established_at: r.established_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// The caller's active caregivers (caller as the supported user).
async fn list_caregivers(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<RelationshipEntryResponse>>> {
    let rows = CareRelationshipRepository::list_by_user_with_caregiver_info(&state.db, &user.id)
        .await?;
    Ok(Json(rows.into_iter().map(RelationshipEntryResponse::from_pair).collect()))
}

/// The people the caller actively cares for (caller as caregiver).
async fn list_caregiving(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<RelationshipEntryResponse>>> {
    let rows =
        CareRelationshipRepository::list_by_caregiver_with_user_info(&state.db, &user.id).await?;
    Ok(Json(rows.into_iter().map(RelationshipEntryResponse::from_pair).collect()))
}

/// Soft-delete a relationship. Either participant may end it. Grants and locks
/// for the pair stay in the tables but stop having any effect.
async fn deactivate(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let relationship = CareRelationshipRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Care relationship not found".to_string()))?;

    if relationship.caregiver_id != user.id && relationship.user_id != user.id {
        return Err(AppError::PermissionDenied(
            "Only a participant can end a care relationship".to_string(),
        ));
    }

    let changed = CareRelationshipRepository::deactivate(&state.db, &id).await?;
    if !changed {
        return Err(AppError::InvalidState(
            "Care relationship is already inactive".to_string(),
        ));
    }

    tracing::info!("User {} deactivated care relationship {}", user.id, id);

    Ok(Json(serde_json::json!({ "ok": true })))
}
