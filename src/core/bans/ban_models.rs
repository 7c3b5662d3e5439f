// Ban domain models.
//
// One record per subject. No record means the subject is clean - a counter
// that drops to zero deletes the row instead of keeping it around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-subject ban state.
///
/// Invariants:
/// - `permanent == true` implies `ban_active == true`
/// - `counter == 0` only on warn-only records; a pardon that would drop the
///   counter to zero deletes the row instead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub subject_id: i64,
    /// Offense count. Drives escalation; pardons decrement it.
    pub counter: u32,
    pub ban_active: bool,
    /// When a temporary ban lapses. None for permanent bans and pardoned
    /// records.
    pub ban_expires_at: Option<DateTime<Utc>>,
    /// One-way transition at `counter >= 3`; only a pardon reverses it.
    pub permanent: bool,
    /// Reason of the latest offense.
    pub reason: String,
    /// Soft warnings issued before/alongside escalation.
    pub warning_count: u32,
}

impl BanRecord {
    /// Whether this record blocks the subject right now. Expired temporary
    /// bans read as unbanned even before housekeeping clears the flag.
    pub fn blocks_at(&self, now: DateTime<Utc>) -> bool {
        if self.permanent {
            return true;
        }
        self.ban_active && self.ban_expires_at.map(|t| t > now).unwrap_or(false)
    }
}
