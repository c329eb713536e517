use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::invitation::RelationshipKind;

// ============================================================================
// Care Relationship Models
// ============================================================================

/// Provenance of a care relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EstablishedVia {
    Invitation,
    Manual,
    Import,
}

/// Durable many-to-many link between a caregiver and a supported user.
///
/// `is_primary` marks caregivers with override authority over setting locks
/// they did not personally create. Rows are never hard-deleted; `is_active`
/// is flipped instead, and downstream checks treat inactive rows as absent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CareRelationship {
    pub id: String,
    pub caregiver_id: String,
    pub user_id: String,
    pub relationship: RelationshipKind,
    pub is_primary: bool,
    pub is_active: bool,
    pub established_via: EstablishedVia,
    pub established_at: NaiveDateTime,
}
