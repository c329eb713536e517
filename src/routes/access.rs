use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db::models::Capability;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::access::AccessGuard;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:user_id/:capability", get(check_access))
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub user_id: String,
    pub capability: Capability,
    pub allowed: bool,
}

/// Ask the guard whether the calling actor may exercise a capability against
/// a user. This is the same predicate feature modules call in-process; exposed
/// over HTTP so clients can grey out UI they cannot use. Deliberately binary.
async fn check_access(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    Path((user_id, capability)): Path<(String, String)>,
) -> AppResult<Json<AccessResponse>> {
    let capability = capability
        .parse::<Capability>()
        .map_err(AppError::Validation)?;

    let decision = AccessGuard::authorize(&state.db, &actor.id, &user_id, capability).await?;

    Ok(Json(AccessResponse {
        user_id,
        capability,
        allowed: decision.is_allowed(),
    }))
}
