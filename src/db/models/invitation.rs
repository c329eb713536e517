use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Invitation Models
// ============================================================================

/// Lifecycle of an invitation code. `Pending` is the only state with outgoing
/// edges; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How the inviting caregiver describes their relationship to the supported
/// user. Closed set; free-text labels are rejected at the API edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RelationshipKind {
    Parent,
    Guardian,
    Spouse,
    Sibling,
    Grandparent,
    Friend,
    ProfessionalCaregiver,
    Other,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipKind::Parent => "parent",
            RelationshipKind::Guardian => "guardian",
            RelationshipKind::Spouse => "spouse",
            RelationshipKind::Sibling => "sibling",
            RelationshipKind::Grandparent => "grandparent",
            RelationshipKind::Friend => "friend",
            RelationshipKind::ProfessionalCaregiver => "professional_caregiver",
            RelationshipKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent" => Ok(RelationshipKind::Parent),
            "guardian" => Ok(RelationshipKind::Guardian),
            "spouse" => Ok(RelationshipKind::Spouse),
            "sibling" => Ok(RelationshipKind::Sibling),
            "grandparent" => Ok(RelationshipKind::Grandparent),
            "friend" => Ok(RelationshipKind::Friend),
            "professional_caregiver" => Ok(RelationshipKind::ProfessionalCaregiver),
            "other" => Ok(RelationshipKind::Other),
            other => Err(format!("unknown relationship label: {}", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    /// Short shared secret handed to the target user out of band.
    pub code: String,
    pub caregiver_id: String,
    pub target_name: String,
    pub target_email: Option<String>,
    pub relationship: RelationshipKind,
    pub status: InvitationStatus,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub accepted_at: Option<NaiveDateTime>,
    pub accepted_by: Option<String>,
}
