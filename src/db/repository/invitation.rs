use chrono::NaiveDateTime;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Invitation, RelationshipKind};
use crate::error::{AppError, AppResult};

// ============================================================================
// Invitation Repository
// ============================================================================

pub struct InvitationRepository;

impl InvitationRepository {
    /// Insert a pending invitation with the given code.
    ///
    /// Returns `Ok(None)` when the code already exists (UNIQUE violation), so
    /// the caller can regenerate and retry. Any other database error is
    /// propagated.
    pub async fn create(
        pool: &SqlitePool,
        code: &str,
        caregiver_id: &str,
        target_name: &str,
        target_email: Option<&str>,
        relationship: RelationshipKind,
        expires_at: NaiveDateTime,
    ) -> AppResult<Option<Invitation>> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        let result = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (
                id, code, caregiver_id, target_name, target_email,
                relationship, status, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(caregiver_id)
        .bind(target_name)
        .bind(target_email)
        .bind(relationship)
        .bind(now)
        .bind(expires_at)
        .fetch_one(pool)
        .await;

        match result {
            Ok(invitation) => Ok(Some(invitation)),
            Err(e) => {
                let is_collision = e
                    .as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false);
                if is_collision {
                    Ok(None)
                } else {
                    Err(AppError::Database(e))
                }
            }
        }
    }

    pub async fn find_by_code(pool: &SqlitePool, code: &str) -> AppResult<Option<Invitation>> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE code = ? LIMIT 1")
            .bind(code)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Lazily transition a pending invitation to `expired`.
    ///
    /// Guarded on `status = 'pending'` so a concurrent accept/cancel that
    /// already reached a terminal state is never overwritten.
    pub async fn mark_expired(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE invitations SET status = 'expired' WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending invitation to `accepted` inside the caller's
    /// transaction. The `status = 'pending'` guard makes the losing side of a
    /// double-accept race observe zero affected rows.
    pub async fn mark_accepted(
        conn: &mut SqliteConnection,
        code: &str,
        accepted_by: &str,
        accepted_at: NaiveDateTime,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'accepted', accepted_at = ?, accepted_by = ?
            WHERE code = ? AND status = 'pending'
            "#,
        )
        .bind(accepted_at)
        .bind(accepted_by)
        .bind(code)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending invitation to `cancelled`, but only for its issuer.
    pub async fn mark_cancelled(
        pool: &SqlitePool,
        code: &str,
        caregiver_id: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invitations
            SET status = 'cancelled'
            WHERE code = ? AND caregiver_id = ? AND status = 'pending'
            "#,
        )
        .bind(code)
        .bind(caregiver_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_caregiver(
        pool: &SqlitePool,
        caregiver_id: &str,
    ) -> AppResult<Vec<Invitation>> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE caregiver_id = ? ORDER BY created_at DESC",
        )
        .bind(caregiver_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
