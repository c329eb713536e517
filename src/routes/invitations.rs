use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::{CareRelationship, EstablishedVia, Invitation, InvitationStatus, RelationshipKind};
use crate::db::UserRepository;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::invitations::InvitationService;
use crate::AppState;

/// Authenticated invitation endpoints.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_issued).post(issue))
        .route("/accept", post(accept))
        .route("/:code/cancel", post(cancel))
}

/// Public endpoints, rate-limited in `main` since codes can be probed.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new().route("/:code", get(lookup))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IssueInvitationRequest {
    pub target_name: String,
    pub target_email: Option<String>,
    pub relationship: RelationshipKind,
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation_code: String,
    pub target_name: String,
    pub target_email: Option<String>,
    pub relationship: RelationshipKind,
    pub status: InvitationStatus,
    pub expires_at: NaiveDateTime,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            invitation_code: i.code,
            target_name: i.target_name,
            target_email: i.target_email,
            relationship: i.relationship,
            status: i.status,
            expires_at: i.expires_at,
        }
    }
}

/// What an anonymous holder of a code gets to see: enough to decide whether to
/// accept, nothing about the caregiver's account beyond a display name.
#[derive(Debug, Serialize)]
pub struct InvitationSummaryResponse {
    pub invitation_code: String,
    pub caregiver_name: String,
    pub target_name: String,
    pub relationship: RelationshipKind,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    pub invitation_code: String,
}

#[derive(Debug, Serialize)]
pub struct RelationshipResponse {
    pub id: String,
    pub caregiver_id: String,
    pub user_id: String,
    pub relationship: RelationshipKind,
    pub is_primary: bool,
    pub established_via: EstablishedVia,
    pub established_at: NaiveDateTime,
}

impl From<CareRelationship> for RelationshipResponse {
    fn from(r: CareRelationship) -> Self {
        Self {
            id: r.id,
            caregiver_id: r.caregiver_id,
            user_id: r.user_id,
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

/// Issue an invitation code for someone to become this caregiver's supported user.
async fn issue(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<IssueInvitationRequest>,
) -> AppResult<Json<InvitationResponse>> {
    let invitation = InvitationService::issue(
        &state,
        &user.id,
        &request.target_name,
        request.target_email.as_deref(),
        request.relationship,
    )
    .await?;

    Ok(Json(invitation.into()))
}

/// List invitations the current caregiver has issued.
async fn list_issued(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<InvitationResponse>>> {
    let invitations = InvitationService::list_issued(&state, &user.id).await?;
    Ok(Json(invitations.into_iter().map(Into::into).collect()))
}

/// Public lookup by code. 404 unknown, 410 expired, 400 already consumed or
/// cancelled; only a pending invitation yields a summary.
async fn lookup(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<InvitationSummaryResponse>> {
    let invitation = InvitationService::lookup(&state, &code).await?;

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

    let caregiver = UserRepository::find_by_id(&state.db, &invitation.caregiver_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Caregiver not found".to_string()))?;

    Ok(Json(InvitationSummaryResponse {
        invitation_code: invitation.code,
        caregiver_name: caregiver.display_name,
        target_name: invitation.target_name,
        relationship: invitation.relationship,
        expires_at: invitation.expires_at,
    }))
}

/// Accept an invitation as the authenticated user, establishing the relationship.
async fn accept(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<AcceptInvitationRequest>,
) -> AppResult<Json<RelationshipResponse>> {
    let relationship =
        InvitationService::accept(&state, &request.invitation_code, &user.id).await?;
    Ok(Json(relationship.into()))
}

/// Cancel a pending invitation (issuer only).
async fn cancel(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(code): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    InvitationService::cancel(&state, &code, &user.id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::test_util::{create_user, test_pool};
    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState {
            db: test_pool().await,
            config: Config::default(),
        });
        let app = Router::new()
            .nest("/api/invitations", router().merge(public_router()))
            .with_state(state.clone());
        (app, state)
    }

    #[tokio::test]
    async fn public_lookup_maps_states_to_statuses() {
        let (app, state) = test_app().await;
        let caregiver = create_user(&state.db, "carol@example.com", "Carol").await;

        // Unknown code.
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/invitations/NOPE42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Pending code resolves to a summary carrying the caregiver's name.
        let invitation = InvitationService::issue(
            &state,
            &caregiver.id,
            "Jamie",
            None,
            RelationshipKind::Parent,
        )
        .await
        .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/invitations/{}", invitation.code))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary["caregiver_name"], "Carol");
        assert_eq!(summary["relationship"], "parent");

        // Past expiry the same request is 410.
        let past = chrono::Utc::now().naive_utc() - chrono::Duration::days(1);
        sqlx::query("UPDATE invitations SET expires_at = ? WHERE code = ?")
            .bind(past)
            .bind(&invitation.code)
            .execute(&state.db)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/invitations/{}", invitation.code))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let err: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(err["error"]["code"], "EXPIRED");
    }
}
