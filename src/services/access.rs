use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::models::Capability;
use crate::error::AppResult;
use crate::services::permissions::PermissionService;

/// Outcome of an authorization check. The supported user only ever sees this
/// binary; the reasons behind a Deny stay server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// The guard predicate every feature module consults before honoring a
/// caregiver-initiated read or write.
pub struct AccessGuard;

impl AccessGuard {
    /// May `actor_id` exercise `capability` against `target_user_id`?
    ///
    /// Self-access is always allowed here; setting-shaped self-writes are
    /// additionally subject to `SettingsLockService::can_modify`, which the
    /// settings write path consults separately. Caregiver access requires an
    /// active relationship AND a granted capability. Stateless and recomputed
    /// on every call: grants can flip between calls within one session, so no
    /// caching is permitted.
    pub async fn authorize(
        pool: &SqlitePool,
        actor_id: &str,
        target_user_id: &str,
        capability: Capability,
    ) -> AppResult<Decision> {
        if actor_id == target_user_id {
            return Ok(Decision::Allow);
        }

        let granted = PermissionService::check(pool, target_user_id, actor_id, capability).await?;
        if granted {
            Ok(Decision::Allow)
        } else {
            tracing::debug!(
                "Denied {} for actor {} on user {}",
                capability,
                actor_id,
                target_user_id
            );
            Ok(Decision::Deny)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::CareRelationshipRepository;
    use crate::db::test_util::{create_relationship, create_user, test_pool};
    use crate::services::permissions::PermissionService;

    #[tokio::test]
    async fn self_access_is_allowed() {
        let pool = test_pool().await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;

        let decision =
            AccessGuard::authorize(&pool, &user.id, &user.id, Capability::MoodTracking)
                .await
                .unwrap();
        assert!(decision.is_allowed());
    }

    /// Allow iff active relationship AND granted: all four combinations.
    #[tokio::test]
    async fn caregiver_access_requires_relationship_and_grant() {
        for (has_relationship, is_granted) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            let pool = test_pool().await;
            let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
            let user = create_user(&pool, "jamie@example.com", "Jamie").await;

            // Build the grant row first where needed: a relationship is a
            // precondition for writing a grant, so for the relationship-less
            // cases we create one, write the grant, then deactivate it.
            let relationship = create_relationship(&pool, &caregiver.id, &user.id, false).await;
            PermissionService::set_grant(
                &pool,
                &user.id,
                &caregiver.id,
                Capability::Messaging,
                is_granted,
                false,
                &caregiver.id,
            )
            .await
            .unwrap();
            if !has_relationship {
                CareRelationshipRepository::deactivate(&pool, &relationship.id)
                    .await
                    .unwrap();
            }

            let decision =
                AccessGuard::authorize(&pool, &caregiver.id, &user.id, Capability::Messaging)
                    .await
                    .unwrap();
            assert_eq!(
                decision.is_allowed(),
                has_relationship && is_granted,
                "relationship={} granted={}",
                has_relationship,
                is_granted
            );
        }
    }

    #[tokio::test]
    async fn decision_is_recomputed_not_cached() {
        let pool = test_pool().await;
        let caregiver = create_user(&pool, "carol@example.com", "Carol").await;
        let user = create_user(&pool, "jamie@example.com", "Jamie").await;
        create_relationship(&pool, &caregiver.id, &user.id, false).await;

        PermissionService::set_grant(
            &pool,
            &user.id,
            &caregiver.id,
            Capability::TaskManagement,
            true,
            false,
            &caregiver.id,
        )
        .await
        .unwrap();
        assert!(AccessGuard::authorize(&pool, &caregiver.id, &user.id, Capability::TaskManagement)
            .await
            .unwrap()
            .is_allowed());

        // Flip the grant mid-session; the very next check must see it.
        PermissionService::set_grant(
            &pool,
            &user.id,
            &caregiver.id,
            Capability::TaskManagement,
            false,
            false,
            &caregiver.id,
        )
        .await
        .unwrap();
        assert!(!AccessGuard::authorize(&pool, &caregiver.id, &user.id, Capability::TaskManagement)
            .await
            .unwrap()
            .is_allowed());
    }
}
