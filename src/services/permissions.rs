use sqlx::SqlitePool;

use crate::db::models::{Capability, PermissionGrant};
use crate::db::repository::{CareRelationshipRepository, PermissionGrantRepository};
use crate::error::{AppError, AppResult};

/// Per-capability grant ledger. Grants only mean anything while the caregiver
/// holds an active relationship to the user; `check` enforces that, so stale
/// rows left behind by a deactivated relationship are inert rather than
/// dangerous.
pub struct PermissionService;

impl PermissionService {
    /// Idempotent upsert of a grant. Repeated identical calls leave one row.
    pub async fn set_grant(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
        is_granted: bool,
        is_locked: bool,
        granted_by: &str,
    ) -> AppResult<PermissionGrant> {
        let relationship =
            CareRelationshipRepository::find_active_pair(pool, caregiver_id, user_id).await?;
        if relationship.is_none() {
            return Err(AppError::Validation(format!(
                "Caregiver {} has no active care relationship with user {}",
                caregiver_id, user_id
            )));
        }

        let grant = PermissionGrantRepository::upsert(
            pool,
            user_id,
            caregiver_id,
            capability,
            is_granted,
            is_locked,
            granted_by,
        )
        .await?;

        tracing::info!(
            "Grant {} for caregiver {} on user {} set to granted={} locked={}",
            capability,
            caregiver_id,
            user_id,
            is_granted,
            is_locked
        );

        Ok(grant)
    }

    /// Remove a grant row. Returns false when no row existed.
    ///
    /// The caregiver side can always remove its own grant. The supported user
    /// can remove it too, unless the grant is locked against self-revocation.
    pub async fn revoke(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
        actor_id: &str,
    ) -> AppResult<bool> {
        if actor_id != caregiver_id {
            if actor_id != user_id {
                return Err(AppError::PermissionDenied(
                    "Only the caregiver or the supported user can revoke a grant".to_string(),
                ));
            }

            let grant =
                PermissionGrantRepository::find(pool, user_id, caregiver_id, capability).await?;
            match grant {
                None => return Ok(false),
                Some(g) if g.is_locked => {
                    return Err(AppError::PermissionDenied(
                        "This grant is locked and cannot be self-revoked".to_string(),
                    ))
                }
                Some(_) => {}
            }
        }

        PermissionGrantRepository::delete(pool, user_id, caregiver_id, capability).await
    }

    /// Does this caregiver currently hold this capability over this user?
    ///
    /// False without an active relationship, false without a grant row,
    /// otherwise the row's `is_granted`. Recomputed on every call.
    pub async fn check(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
    ) -> AppResult<bool> {
        let relationship =
            CareRelationshipRepository::find_active_pair(pool, caregiver_id, user_id).await?;
        if relationship.is_none() {
            return Ok(false);
        }

        let grant =
            PermissionGrantRepository::find(pool, user_id, caregiver_id, capability).await?;
        Ok(grant.map(|g| g.is_granted).unwrap_or(false))
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<PermissionGrant>> {
        PermissionGrantRepository::list_by_user(pool, user_id).await
    }
}
