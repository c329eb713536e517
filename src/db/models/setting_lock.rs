use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Setting Lock Models
// ============================================================================

/// Caregiver override for a single user setting.
///
/// Row presence is the lock: there is no separate "unlocked" state to fall out
/// of sync. While the row exists, `setting_value` is authoritative and the
/// supported user's own writes to `setting_key` must be rejected.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SettingLock {
    pub id: String,
    pub user_id: String,
    pub setting_key: String,
    pub setting_value: String,
    pub locked_by: String,
    pub lock_reason: Option<String>,
    /// Whether the supported user may see the locked value at all.
    pub can_user_view: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
