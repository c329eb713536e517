use chrono::Duration;
use rand::Rng;

use crate::db::models::{CareRelationship, EstablishedVia, Invitation, InvitationStatus, RelationshipKind};
use crate::db::repository::{CareRelationshipRepository, InvitationRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// How many code collisions we tolerate before giving up. With a 31-character
/// alphabet and 6-character codes the space is ~887M, so hitting this limit
/// means something is wrong with the RNG or the table.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Charset for invitation codes. Uppercase alphanumerics minus the lookalikes
/// (O/0, I/1/L) since codes are relayed over the phone or on paper.
const CODE_CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub struct InvitationService;

impl InvitationService {
    /// Issue a new invitation code for a target person described by name and
    /// optional email. The code is the only thing the target needs to accept.
    pub async fn issue(
        state: &AppState,
        caregiver_id: &str,
        target_name: &str,
        target_email: Option<&str>,
        relationship: RelationshipKind,
    ) -> AppResult<Invitation> {
        let target_name = target_name.trim();
        if target_name.is_empty() {
            return Err(AppError::Validation("target name must not be empty".to_string()));
        }

        let expires_at = chrono::Utc::now().naive_utc()
            + Duration::days(state.config.invitation.expiry_days);

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(state.config.invitation.code_length);

            // The UNIQUE constraint on `code` is the collision check; a losing
            // insert comes back as None and we roll a new code.
            if let Some(invitation) = InvitationRepository::create(
                &state.db,
                &code,
                caregiver_id,
                target_name,
                target_email,
                relationship,
                expires_at,
            )
            .await?
            {
                tracing::info!(
                    "Caregiver {} issued invitation {} for '{}'",
                    caregiver_id,
                    invitation.code,
                    target_name
                );
                return Ok(invitation);
            }

            tracing::warn!("Invitation code collision, regenerating");
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "could not generate a unique invitation code after {} attempts",
            MAX_CODE_ATTEMPTS
        )))
    }

    /// Look up an invitation by code, lazily expiring it when the expiry time
    /// has passed. Every read path goes through here so a stale `pending`
    /// status is never observable.
    pub async fn lookup(state: &AppState, code: &str) -> AppResult<Invitation> {
        let invitation = InvitationRepository::find_by_code(&state.db, code)
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        if invitation.status == InvitationStatus::Pending
            && chrono::Utc::now().naive_utc() > invitation.expires_at
        {
            InvitationRepository::mark_expired(&state.db, &invitation.id).await?;
            // Re-read: a concurrent accept may have won the guarded update.
            return InvitationRepository::find_by_code(&state.db, code)
                .await?
                .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()));
        }

        Ok(invitation)
    }

    /// Accept a pending invitation, atomically consuming it and establishing
    /// the care relationship. The status update and the relationship insert
    /// commit together or not at all.
    pub async fn accept(
        state: &AppState,
        code: &str,
        accepting_user_id: &str,
    ) -> AppResult<CareRelationship> {
        let invitation = Self::lookup(state, code).await?;

        match invitation.status {
            InvitationStatus::Pending => {}
            InvitationStatus::Expired => {
                return Err(AppError::Expired("Invitation has expired".to_string()))
            }
            status => {
                return Err(AppError::InvalidState(format!(
                    "Invitation is {}, not pending",
                    status
                )))
            }
        }

        if invitation.caregiver_id == accepting_user_id {
            return Err(AppError::Validation(
                "Cannot accept your own invitation".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let mut tx = state.db.begin().await.map_err(AppError::Database)?;

        let consumed =
            InvitationRepository::mark_accepted(&mut tx, code, accepting_user_id, now).await?;
        if !consumed {
            // Lost a race: someone else accepted, cancelled or expired it
            // between our read and the guarded update.
            tx.rollback().await.map_err(AppError::Database)?;
            return Err(AppError::InvalidState(
                "Invitation is no longer pending".to_string(),
            ));
        }

        let relationship = CareRelationshipRepository::create_with(
            &mut tx,
            &invitation.caregiver_id,
            accepting_user_id,
            invitation.relationship,
            false,
            EstablishedVia::Invitation,
        )
        .await?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            "User {} accepted invitation {} from caregiver {}",
            accepting_user_id,
            code,
            invitation.caregiver_id
        );

        Ok(relationship)
    }

    /// Cancel a pending invitation. Only the issuing caregiver may cancel.
    pub async fn cancel(state: &AppState, code: &str, caregiver_id: &str) -> AppResult<bool> {
        let invitation = Self::lookup(state, code).await?;

        if invitation.caregiver_id != caregiver_id {
            return Err(AppError::InvalidState(
                "Only the issuing caregiver can cancel an invitation".to_string(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "Invitation is {}, not pending",
                invitation.status
            )));
        }

        let cancelled =
            InvitationRepository::mark_cancelled(&state.db, code, caregiver_id).await?;
        if !cancelled {
            return Err(AppError::InvalidState(
                "Invitation is no longer pending".to_string(),
            ));
        }

        Ok(true)
    }

    pub async fn list_issued(state: &AppState, caregiver_id: &str) -> AppResult<Vec<Invitation>> {
        InvitationRepository::list_by_caregiver(&state.db, caregiver_id).await
    }
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_CHARSET.len());
            CODE_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_util::{create_user, test_pool};

    async fn test_state() -> AppState {
        AppState {
            db: test_pool().await,
            config: Config::default(),
        }
    }

    /// Force an invitation's expiry into the past without touching its status.
    async fn backdate_expiry(state: &AppState, code: &str) {
        let past = chrono::Utc::now().naive_utc() - chrono::Duration::days(1);
        sqlx::query("UPDATE invitations SET expires_at = ? WHERE code = ?")
            .bind(past)
            .bind(code)
            .execute(&state.db)
            .await
            .unwrap();
    }

    #[test]
    fn generated_codes_use_unambiguous_charset() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)), "bad code {}", code);
        }
    }

    #[tokio::test]
    async fn issue_then_accept_establishes_relationship() {
        let state = test_state().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;
        let user = create_user(&state.db, "jamie@example.com", "Jamie").await;

        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Jamie",
            None,
            RelationshipKind::Parent,
        )
        .await
        .unwrap();
        assert_eq!(invitation.status, InvitationStatus::Pending);

        let relationship = InvitationService::accept(&state, &invitation.code, &user.id)
            .await
            .unwrap();
        assert_eq!(relationship.caregiver_id, caregiver.id);
        assert_eq!(relationship.user_id, user.id);
        assert!(!relationship.is_primary);
        assert_eq!(relationship.established_via, EstablishedVia::Invitation);

        let reread = InvitationService::lookup(&state, &invitation.code).await.unwrap();
        assert_eq!(reread.status, InvitationStatus::Accepted);
        assert_eq!(reread.accepted_by.as_deref(), Some(user.id.as_str()));

        // Re-accepting a consumed code is an invalid state, not a new relationship.
        let other = create_user(&state.db, "other@example.com", "Other").await;
        let err = InvitationService::accept(&state, &invitation.code, &other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn accept_after_expiry_fails_and_never_creates_relationship() {
        let state = test_state().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;
        let user = create_user(&state.db, "jamie@example.com", "Jamie").await;

        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Jamie",
            Some("jamie@example.com"),
            RelationshipKind::Guardian,
        )
        .await
        .unwrap();
        backdate_expiry(&state, &invitation.code).await;

        let err = InvitationService::accept(&state, &invitation.code, &user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));

        // The lazy transition happened and is terminal.
        let reread = InvitationService::lookup(&state, &invitation.code).await.unwrap();
        assert_eq!(reread.status, InvitationStatus::Expired);

        let relationships =
            crate::db::repository::CareRelationshipRepository::find_active_pair(
                &state.db,
                &caregiver.id,
                &user.id,
            )
            .await
            .unwrap();
        assert!(relationships.is_none());
    }

    #[tokio::test]
    async fn lookup_lazily_expires_pending_invitations() {
        let state = test_state().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;

        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Jamie",
            None,
            RelationshipKind::Friend,
        )
        .await
        .unwrap();
        backdate_expiry(&state, &invitation.code).await;

        let seen = InvitationService::lookup(&state, &invitation.code).await.unwrap();
        assert_eq!(seen.status, InvitationStatus::Expired);
    }

    #[tokio::test]
    async fn cancel_requires_pending_and_issuer() {
        let state = test_state().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;
        let stranger = create_user(&state.db, "sam@example.com", "Sam").await;

        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Jamie",
            None,
            RelationshipKind::Sibling,
        )
        .await
        .unwrap();

        // Not the issuer.
        let err = InvitationService::cancel(&state, &invitation.code, &stranger.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // The issuer can cancel, exactly once.
        assert!(InvitationService::cancel(&state, &invitation.code, &caregiver.id)
            .await
            .unwrap());
        let err = InvitationService::cancel(&state, &invitation.code, &caregiver.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let reread = InvitationService::lookup(&state, &invitation.code).await.unwrap();
        assert_eq!(reread.status, InvitationStatus::Cancelled);
    }

    #[tokio::test]
    async fn caregiver_cannot_accept_own_invitation() {
        let state = test_state().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;

        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Me",
            None,
            RelationshipKind::Other,
        )
        .await
        .unwrap();

        let err = InvitationService::accept(&state, &invitation.code, &caregiver.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let state = test_state().await;
        let err = InvitationService::lookup(&state, "NOPE42").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
