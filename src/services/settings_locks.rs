use sqlx::SqlitePool;

use crate::db::models::SettingLock;
use crate::db::repository::{CareRelationshipRepository, SettingLockRepository};
use crate::error::{AppError, AppResult};

/// Caregiver overrides for individual user settings.
///
/// A lock row existing IS the locked state. `can_modify` is the single
/// predicate every user-initiated settings write in the application must
/// consult before applying a change.
pub struct SettingsLockService;

impl SettingsLockService {
    /// Create or update a lock. Requires the locking caregiver to hold an
    /// active relationship with the user.
    pub async fn lock(
        pool: &SqlitePool,
        user_id: &str,
        setting_key: &str,
        setting_value: &str,
        locked_by: &str,
        lock_reason: Option<&str>,
        can_user_view: bool,
    ) -> AppResult<SettingLock> {
        let setting_key = setting_key.trim();
        if setting_key.is_empty() {
            return Err(AppError::Validation("setting key must not be empty".to_string()));
        }

        let relationship =
            CareRelationshipRepository::find_active_pair(pool, locked_by, user_id).await?;
        if relationship.is_none() {
            return Err(AppError::Validation(format!(
                "Caregiver {} has no active care relationship with user {}",
                locked_by, user_id
            )));
        }

        let lock = SettingLockRepository::upsert(
            pool,
            user_id,
            setting_key,
            setting_value,
            locked_by,
            lock_reason,
            can_user_view,
        )
        .await?;

        tracing::info!(
            "Caregiver {} locked setting '{}' for user {}",
            locked_by,
            setting_key,
            user_id
        );

        Ok(lock)
    }

    /// Remove a lock. Returns true when the lock was removed, false when the
    /// requesting caregiver is neither the locker nor an active primary
    /// caregiver of the user; denial makes no change.
    pub async fn unlock(
        pool: &SqlitePool,
        user_id: &str,
        setting_key: &str,
        requesting_caregiver_id: &str,
    ) -> AppResult<bool> {
        let lock = SettingLockRepository::find(pool, user_id, setting_key)
            .await?
            .ok_or_else(|| AppError::NotFound("Setting lock not found".to_string()))?;

        let authorized = if lock.locked_by == requesting_caregiver_id {
            true
        } else {
            // Primary caregivers may override locks they did not create.
            CareRelationshipRepository::find_active_pair(pool, requesting_caregiver_id, user_id)
                .await?
                .map(|r| r.is_primary)
                .unwrap_or(false)
        };

        if !authorized {
            tracing::warn!(
                "Caregiver {} denied unlock of '{}' for user {}",
                requesting_caregiver_id,
                setting_key,
                user_id
            );
            return Ok(false);
        }

        SettingLockRepository::delete(pool, user_id, setting_key).await?;
        Ok(true)
    }

    pub async fn is_locked(pool: &SqlitePool, user_id: &str, setting_key: &str) -> AppResult<bool> {
        Ok(SettingLockRepository::find(pool, user_id, setting_key).await?.is_some())
    }

    /// Whether a user-initiated change to this setting may proceed.
    pub async fn can_modify(pool: &SqlitePool, user_id: &str, setting_key: &str) -> AppResult<bool> {
        Ok(!Self::is_locked(pool, user_id, setting_key).await?)
    }

    pub async fn get(
        pool: &SqlitePool,
        user_id: &str,
        setting_key: &str,
    ) -> AppResult<Option<SettingLock>> {
        SettingLockRepository::find(pool, user_id, setting_key).await
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<SettingLock>> {
        SettingLockRepository::list_by_user(pool, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::{create_relationship, create_user, test_pool};

    #[tokio::test]
    async fn lock_requires_active_relationship_and_nonempty_key() {
        let pool = test_pool().await;
        let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;

        let err = SettingsLockService::lock(
            &pool, &user.id, "geofencing", "enabled", &caregiver.id, None, true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        create_relationship(&pool, &caregiver.id, &user.id, false).await;
        let err = SettingsLockService::lock(
            &pool, &user.id, "   ", "enabled", &caregiver.id, None, true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn lock_then_unlock_by_locker_round_trips() {
        let pool = test_pool().await;
        let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;
        create_relationship(&pool, &caregiver.id, &user.id, false).await;

        SettingsLockService::lock(
            &pool,
            &user.id,
            "geofencing",
            "enabled",
            &caregiver.id,
            Some("wandering risk"),
            true,
        )
        .await
        .unwrap();

        // While locked, a user-initiated change must be rejected by callers.
        assert!(SettingsLockService::is_locked(&pool, &user.id, "geofencing").await.unwrap());
        assert!(!SettingsLockService::can_modify(&pool, &user.id, "geofencing").await.unwrap());

        assert!(SettingsLockService::unlock(&pool, &user.id, "geofencing", &caregiver.id)
            .await
            .unwrap());
        assert!(!SettingsLockService::is_locked(&pool, &user.id, "geofencing").await.unwrap());
        assert!(SettingsLockService::can_modify(&pool, &user.id, "geofencing").await.unwrap());
    }

    #[tokio::test]
    async fn lock_is_an_idempotent_upsert() {
        let pool = test_pool().await;
        let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;
        create_relationship(&pool, &caregiver.id, &user.id, false).await;

        let first = SettingsLockService::lock(
            &pool, &user.id, "bedtime", "21:00", &caregiver.id, None, true,
        )
        .await
        .unwrap();
        let second = SettingsLockService::lock(
            &pool, &user.id, "bedtime", "22:00", &caregiver.id, None, false,
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.setting_value, "22:00");
        assert!(!second.can_user_view);
        assert_eq!(
            SettingsLockService::list_for_user(&pool, &user.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn unlock_authority_chain() {
        let pool = test_pool().await;
        let primary = create_user(&pool, "c1@example.com", "C1").await;
        let locker = create_user(&pool, "c2@example.com", "C2").await;
        let bystander = create_user(&pool, "c3@example.com", "C3").await;
        let user = create_user(&pool, "u@example.com", "U").await;

        create_relationship(&pool, &primary.id, &user.id, true).await;
        create_relationship(&pool, &locker.id, &user.id, false).await;
        create_relationship(&pool, &bystander.id, &user.id, false).await;

        // The locker can remove their own lock.
        SettingsLockService::lock(
            &pool, &user.id, "bedtime_reminder", "on", &locker.id, None, true,
        )
        .await
        .unwrap();
        assert!(SettingsLockService::unlock(&pool, &user.id, "bedtime_reminder", &locker.id)
            .await
            .unwrap());

        // Re-lock; the primary caregiver can override a lock they did not create.
        SettingsLockService::lock(
            &pool, &user.id, "bedtime_reminder", "on", &locker.id, None, true,
        )
        .await
        .unwrap();
        assert!(SettingsLockService::unlock(&pool, &user.id, "bedtime_reminder", &primary.id)
            .await
            .unwrap());

        // A non-primary, non-locking caregiver is denied, and denial changes nothing.
        SettingsLockService::lock(
            &pool, &user.id, "bedtime_reminder", "on", &locker.id, None, true,
        )
        .await
        .unwrap();
        assert!(!SettingsLockService::unlock(&pool, &user.id, "bedtime_reminder", &bystander.id)
            .await
            .unwrap());
        assert!(SettingsLockService::is_locked(&pool, &user.id, "bedtime_reminder")
            .await
            .unwrap());

        // Denial is idempotent: repeating it still changes nothing.
        assert!(!SettingsLockService::unlock(&pool, &user.id, "bedtime_reminder", &bystander.id)
            .await
            .unwrap());
        assert!(SettingsLockService::is_locked(&pool, &user.id, "bedtime_reminder")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn inactive_primary_cannot_override() {
        let pool = test_pool().await;
        let primary = create_user(&pool, "c1@example.com", "C1").await;
        let locker = create_user(&pool, "c2@example.com", "C2").await;
        let user = create_user(&pool, "u@example.com", "U").await;

        let primary_rel = create_relationship(&pool, &primary.id, &user.id, true).await;
        create_relationship(&pool, &locker.id, &user.id, false).await;

        SettingsLockService::lock(&pool, &user.id, "geofencing", "enabled", &locker.id, None, true)
            .await
            .unwrap();

        CareRelationshipRepository::deactivate(&pool, &primary_rel.id)
            .await
            .unwrap();

        assert!(!SettingsLockService::unlock(&pool, &user.id, "geofencing", &primary.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unlock_of_absent_lock_is_not_found() {
        let pool = test_pool().await;
        let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;

        let err = SettingsLockService::unlock(&pool, &user.id, "geofencing", &caregiver.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
