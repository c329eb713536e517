use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Permission Grant Models
// ============================================================================

/// Named categories of delegated access a caregiver can hold over a supported
/// user. Closed set; every other feature of the application checks against one
/// of these before honoring a caregiver-initiated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Capability {
    LocationTracking,
    MedicationManagement,
    FinancialView,
    EmergencyContacts,
    Messaging,
    TaskManagement,
    MoodTracking,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::LocationTracking => "location_tracking",
            Capability::MedicationManagement => "medication_management",
            Capability::FinancialView => "financial_view",
            Capability::EmergencyContacts => "emergency_contacts",
            Capability::Messaging => "messaging",
            Capability::TaskManagement => "task_management",
            Capability::MoodTracking => "mood_tracking",
        };
        f.write_str(s)
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location_tracking" => Ok(Capability::LocationTracking),
            "medication_management" => Ok(Capability::MedicationManagement),
            "financial_view" => Ok(Capability::FinancialView),
            "emergency_contacts" => Ok(Capability::EmergencyContacts),
            "messaging" => Ok(Capability::Messaging),
            "task_management" => Ok(Capability::TaskManagement),
            "mood_tracking" => Ok(Capability::MoodTracking),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// One grant record per (user, caregiver, capability) triple.
///
/// `is_locked` means the supported user cannot self-revoke the grant; only the
/// caregiver side can remove it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: String,
    pub user_id: String,
    pub caregiver_id: String,
    pub capability: Capability,
    pub is_granted: bool,
    pub is_locked: bool,
    pub granted_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_round_trips_through_str() {
        let all = [
            Capability::LocationTracking,
            Capability::MedicationManagement,
            Capability::FinancialView,
            Capability::EmergencyContacts,
            Capability::Messaging,
            Capability::TaskManagement,
            Capability::MoodTracking,
        ];
        for cap in all {
            assert_eq!(cap.to_string().parse::<Capability>(), Ok(cap));
        }
        assert!("telepathy".parse::<Capability>().is_err());
    }
}
