use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Capability, PermissionGrant};
use crate::error::{AppError, AppResult};

// ============================================================================
// Permission Grant Repository
// ============================================================================

pub struct PermissionGrantRepository;

impl PermissionGrantRepository {
    /// Idempotent upsert keyed by the (user, caregiver, capability) UNIQUE
    /// constraint. Repeated identical calls leave exactly one row with a fresh
    /// `updated_at`; concurrent calls resolve by commit order.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
        is_granted: bool,
        is_locked: bool,
        granted_by: &str,
    ) -> AppResult<PermissionGrant> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, PermissionGrant>(
            r#"
            INSERT INTO permission_grants (
                id, user_id, caregiver_id, capability,
                is_granted, is_locked, granted_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, caregiver_id, capability) DO UPDATE SET
                is_granted = excluded.is_granted,
                is_locked = excluded.is_locked,
                granted_by = excluded.granted_by,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(caregiver_id)
        .bind(capability)
        .bind(is_granted)
        .bind(is_locked)
        .bind(granted_by)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
    ) -> AppResult<Option<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            r#"
            SELECT * FROM permission_grants
            WHERE user_id = ? AND caregiver_id = ? AND capability = ?
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(caregiver_id)
        .bind(capability)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<PermissionGrant>> {
        sqlx::query_as::<_, PermissionGrant>(
            "SELECT * FROM permission_grants WHERE user_id = ? ORDER BY capability, caregiver_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn delete(
        pool: &SqlitePool,
        user_id: &str,
        caregiver_id: &str,
        capability: Capability,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM permission_grants WHERE user_id = ? AND caregiver_id = ? AND capability = ?",
        )
        .bind(user_id)
        .bind(caregiver_id)
        .bind(capability)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
