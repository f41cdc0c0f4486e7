//! Presence Wire Types
//!
//! The online/offline status enum and the presence event published on the
//! presence channel whenever a user transitions (or re-announces) a state.

use serde::{Deserialize, Serialize};

/// Online/offline status of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A presence transition event.
///
/// `mark_online` is idempotent, so consumers that only care about edge
/// transitions must de-duplicate on `(user_id, status)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: PresenceStatus,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl PresenceUpdate {
    pub fn now(user_id: &str, status: PresenceStatus) -> Self {
        Self {
            user_id: user_id.to_string(),
            status,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
