use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::SettingLock;
use crate::error::{AppError, AppResult};

// ============================================================================
// Setting Lock Repository
// ============================================================================

pub struct SettingLockRepository;

impl SettingLockRepository {
    /// Idempotent upsert keyed by the (user, setting_key) UNIQUE constraint.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: &str,
        setting_key: &str,
        setting_value: &str,
        locked_by: &str,
        lock_reason: Option<&str>,
        can_user_view: bool,
    ) -> AppResult<SettingLock> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, SettingLock>(
            r#"
            INSERT INTO setting_locks (
                id, user_id, setting_key, setting_value,
                locked_by, lock_reason, can_user_view, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                locked_by = excluded.locked_by,
                lock_reason = excluded.lock_reason,
                can_user_view = excluded.can_user_view,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(setting_key)
        .bind(setting_value)
        .bind(locked_by)
        .bind(lock_reason)
        .bind(can_user_view)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find(
        pool: &SqlitePool,
        user_id: &str,
        setting_key: &str,
    ) -> AppResult<Option<SettingLock>> {
        sqlx::query_as::<_, SettingLock>(
            "SELECT * FROM setting_locks WHERE user_id = ? AND setting_key = ? LIMIT 1",
        )
        .bind(user_id)
        .bind(setting_key)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<SettingLock>> {
        sqlx::query_as::<_, SettingLock>(
            "SELECT * FROM setting_locks WHERE user_id = ? ORDER BY setting_key",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Remove a lock row entirely. Absence of the row is the unlocked state.
    pub async fn delete(pool: &SqlitePool, user_id: &str, setting_key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM setting_locks WHERE user_id = ? AND setting_key = ?")
            .bind(user_id)
            .bind(setting_key)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
