//! Presence Tracker
//!
//! The sole writer of the `presence:` key namespace. Each online user has a
//! TTL-bound last-seen marker plus membership in a shared online set; the
//! marker is authoritative. If a process crashes without an explicit
//! offline, the marker expires within the TTL and membership reads repair
//! the set lazily, so set membership never outlives the TTL window.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::bus::EventBus;
use crate::backend::cache::{CacheError, SharedCache};
use crate::shared::messaging::{PresenceStatus, PresenceUpdate};

const ONLINE_SET: &str = "presence:online";

/// Tracks online users and publishes transitions on the presence channel.
pub struct PresenceTracker {
    cache: Arc<dyn SharedCache>,
    bus: Arc<EventBus>,
    ttl: Duration,
}

impl PresenceTracker {
    pub fn new(cache: Arc<dyn SharedCache>, bus: Arc<EventBus>, ttl: Duration) -> Self {
        Self { cache, bus, ttl }
    }

    /// The heartbeat refresh period: half the TTL window, so at most one
    /// missed tick is tolerated before the marker would expire.
    pub fn heartbeat_period(&self) -> Duration {
        self.ttl / 2
    }

    fn marker_key(user_id: &str) -> String {
        format!("presence:user:{}:lastSeen", user_id)
    }

    /// Mark a user online and publish an `online` event.
    ///
    /// Idempotent: calling it while already online refreshes the TTL and
    /// republishes. Consumers that only care about edge transitions must
    /// de-duplicate on `(user_id, status)`.
    pub async fn mark_online(&self, user_id: &str) -> Result<(), CacheError> {
        self.cache.set_add(ONLINE_SET, user_id).await?;
        self.cache
            .set_with_ttl(
                &Self::marker_key(user_id),
                &chrono::Utc::now().timestamp_millis().to_string(),
                self.ttl,
            )
            .await?;
        self.bus
            .publish_presence(PresenceUpdate::now(user_id, PresenceStatus::Online));
        tracing::debug!(user_id, "[Presence] User set online");
        Ok(())
    }

    /// Mark a user offline and publish an `offline` event.
    pub async fn mark_offline(&self, user_id: &str) -> Result<(), CacheError> {
        self.cache.set_remove(ONLINE_SET, user_id).await?;
        self.cache.delete(&Self::marker_key(user_id)).await?;
        self.bus
            .publish_presence(PresenceUpdate::now(user_id, PresenceStatus::Offline));
        tracing::debug!(user_id, "[Presence] User set offline");
        Ok(())
    }

    /// Refresh the last-seen marker without publishing an event.
    pub async fn heartbeat(&self, user_id: &str) -> Result<(), CacheError> {
        self.cache
            .set_with_ttl(
                &Self::marker_key(user_id),
                &chrono::Utc::now().timestamp_millis().to_string(),
                self.ttl,
            )
            .await
    }

    /// Whether a user is currently online.
    ///
    /// Reads the TTL-bound marker, so an expired entry reads as offline
    /// even if the set member was left behind by a crash; the stale member
    /// is removed on the way out.
    pub async fn is_online(&self, user_id: &str) -> Result<bool, CacheError> {
        if self.cache.get(&Self::marker_key(user_id)).await?.is_some() {
            return Ok(true);
        }
        if self.cache.set_contains(ONLINE_SET, user_id).await? {
            self.cache.set_remove(ONLINE_SET, user_id).await?;
        }
        Ok(false)
    }

    /// Filter a list of user ids down to those currently online.
    pub async fn bulk_is_online(&self, user_ids: &[String]) -> Result<Vec<String>, CacheError> {
        let mut online = Vec::new();
        for user_id in user_ids {
            if self.is_online(user_id).await? {
                online.push(user_id.clone());
            }
        }
        Ok(online)
    }
}
