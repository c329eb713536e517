use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::SettingLock;
use crate::db::CareRelationshipRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::settings_locks::SettingsLockService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:user_id", get(list_locks))
        .route(
            "/:user_id/:setting_key",
            get(get_lock).put(lock).delete(unlock),
        )
        .route("/:user_id/:setting_key/can-modify", get(can_modify))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub value: String,
    pub reason: Option<String>,
    #[serde(default = "default_can_user_view")]
    pub can_user_view: bool,
}

fn default_can_user_view() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct LockResponse {
    pub user_id: String,
    pub setting_key: String,
    /// Hidden from the supported user when `can_user_view` is false.
    pub setting_value: Option<String>,
    pub is_locked: bool,
    pub locked_by: String,
    pub lock_reason: Option<String>,
    pub can_user_view: bool,
    pub updated_at: NaiveDateTime,
}

impl LockResponse {
    /// Redact the locked value for the supported user when the lock says so.
    /// Caregivers always see the value; the user still sees THAT the setting
    /// is locked, just not what it is pinned to.
    fn for_viewer(lock: SettingLock, viewer_id: &str) -> Self {
        let redact = viewer_id == lock.user_id && !lock.can_user_view;
        Self {
            user_id: lock.user_id,
            setting_key: lock.setting_key,
            setting_value: if redact { None } else { Some(lock.setting_value) },
            is_locked: true,
            locked_by: lock.locked_by,
            lock_reason: lock.lock_reason,
            can_user_view: lock.can_user_view,
            updated_at: lock.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

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

async fn list_locks(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<LockResponse>>> {
    ensure_participant(&state, &actor.id, &user_id).await?;

    let locks = SettingsLockService::list_for_user(&state.db, &user_id).await?;
    Ok(Json(
        locks
            .into_iter()
            .map(|l| LockResponse::for_viewer(l, &actor.id))
            .collect(),
    ))
}

async fn get_lock(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, setting_key)): Path<(String, String)>,
) -> AppResult<Json<LockResponse>> {
    ensure_participant(&state, &actor.id, &user_id).await?;

    let lock = SettingsLockService::get(&state.db, &user_id, &setting_key)
        .await?
        .ok_or_else(|| AppError::NotFound("Setting lock not found".to_string()))?;

    Ok(Json(LockResponse::for_viewer(lock, &actor.id)))
}

/// Lock a setting, making the caller's value authoritative over the user's own.
async fn lock(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, setting_key)): Path<(String, String)>,
    Json(request): Json<LockRequest>,
) -> AppResult<Json<LockResponse>> {
    let lock = SettingsLockService::lock(
        &state.db,
        &user_id,
        &setting_key,
        &request.value,
        &actor.id,
        request.reason.as_deref(),
        request.can_user_view,
    )
    .await?;

    Ok(Json(LockResponse::for_viewer(lock, &actor.id)))
}

/// Unlock a setting. Only the locking caregiver or an active primary caregiver
/// succeeds; everyone else gets a 403 and the lock is untouched.
async fn unlock(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, setting_key)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    let unlocked =
        SettingsLockService::unlock(&state.db, &user_id, &setting_key, &actor.id).await?;
    if !unlocked {
        return Err(AppError::PermissionDenied(
            "Only the locking caregiver or a primary caregiver can unlock this setting"
                .to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// The predicate feature code consults before applying a user-initiated
/// settings change. The answer is binary on purpose: the supported user is
/// not told who locked the setting or why.
async fn can_modify(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, setting_key)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    ensure_participant(&state, &actor.id, &user_id).await?;

    let can_modify = SettingsLockService::can_modify(&state.db, &user_id, &setting_key).await?;
    Ok(Json(serde_json::json!({
        "setting_key": setting_key,
        "can_modify": can_modify,
    })))
}
