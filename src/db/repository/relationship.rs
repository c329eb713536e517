use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::{CareRelationship, EstablishedVia, RelationshipKind};
use crate::error::{AppError, AppResult};

// ============================================================================
// Care Relationship Repository
// ============================================================================

pub struct CareRelationshipRepository;

impl CareRelationshipRepository {
    pub async fn create(
        pool: &SqlitePool,
        caregiver_id: &str,
        user_id: &str,
        relationship: RelationshipKind,
        is_primary: bool,
        established_via: EstablishedVia,
    ) -> AppResult<CareRelationship> {
        let mut conn = pool.acquire().await.map_err(AppError::Database)?;
        Self::create_with(
            &mut conn,
            caregiver_id,
            user_id,
            relationship,
            is_primary,
            established_via,
        )
        .await
    }

    /// Insert variant usable inside a caller-owned transaction (the accept
    /// flow pairs this with the invitation status update).
    pub async fn create_with(
        conn: &mut SqliteConnection,
        caregiver_id: &str,
        user_id: &str,
        relationship: RelationshipKind,
        is_primary: bool,
        established_via: EstablishedVia,
    ) -> AppResult<CareRelationship> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, CareRelationship>(
            r#"
            INSERT INTO care_relationships (
                id, caregiver_id, user_id, relationship,
                is_primary, is_active, established_via, established_at
            ) VALUES (?, ?, ?, ?, ?, TRUE, ?, ?)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(caregiver_id)
        .bind(user_id)
        .bind(relationship)
        .bind(is_primary)
        .bind(established_via)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<CareRelationship>> {
        sqlx::query_as::<_, CareRelationship>(
            "SELECT * FROM care_relationships WHERE id = ? LIMIT 1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Find the active relationship between a caregiver and a user, if any.
    pub async fn find_active_pair(
        pool: &SqlitePool,
        caregiver_id: &str,
        user_id: &str,
    ) -> AppResult<Option<CareRelationship>> {
        sqlx::query_as::<_, CareRelationship>(
            r#"
            SELECT * FROM care_relationships
            WHERE caregiver_id = ? AND user_id = ? AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(caregiver_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Active caregivers of a user, with caregiver display names for the API.
    pub async fn list_by_user_with_caregiver_info(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<(CareRelationship, String)>> {
        let rows = sqlx::query_as::<_, RelationshipWithName>(
            r#"
            SELECT r.*, u.display_name AS other_display_name
            FROM care_relationships r
            JOIN users u ON u.id = r.caregiver_id
            WHERE r.user_id = ? AND r.is_active = TRUE
            ORDER BY r.established_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let name = r.other_display_name.clone();
                (r.into_relationship(), name)
            })
            .collect())
    }

    /// Active relationships where the given account is the caregiver, with the
    /// supported users' display names.
    pub async fn list_by_caregiver_with_user_info(
        pool: &SqlitePool,
        caregiver_id: &str,
    ) -> AppResult<Vec<(CareRelationship, String)>> {
        let rows = sqlx::query_as::<_, RelationshipWithName>(
            r#"
            SELECT r.*, u.display_name AS other_display_name
            FROM care_relationships r
            JOIN users u ON u.id = r.user_id
            WHERE r.caregiver_id = ? AND r.is_active = TRUE
            ORDER BY r.established_at DESC
            "#,
        )
        .bind(caregiver_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let name = r.other_display_name.clone();
                (r.into_relationship(), name)
            })
            .collect())
    }

    /// Soft delete. Grants and locks referencing the pair stay in place but
    /// become inert because every authorization check requires an active row.
    pub async fn deactivate(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE care_relationships SET is_active = FALSE WHERE id = ? AND is_active = TRUE",
        )
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

/// Join row for the `list_*_with_*_info` queries.
#[derive(sqlx::FromRow)]
struct RelationshipWithName {
    id: String,
    caregiver_id: String,
    user_id: String,
    relationship: RelationshipKind,
    is_primary: bool,
    is_active: bool,
    established_via: EstablishedVia,
    established_at: chrono::NaiveDateTime,
    other_display_name: String,
}

impl RelationshipWithName {
    fn into_relationship(self) -> CareRelationship {
        CareRelationship {
            id: self.id,
            caregiver_id: self.caregiver_id,
            user_id: self.user_id,
            relationship: self.relationship,
            is_primary: self.is_primary,
            is_active: self.is_active,
            established_via: self.established_via,
            established_at: self.established_at,
        }
    }
}
