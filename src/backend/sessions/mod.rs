//! Session Registry
//!
//! Maps a user to its currently-attached live connection and publishes the
//! mapping into the shared cache so other processes can route to it. A
//! binding left behind by a crashed process self-heals through the entry's
//! TTL, which matches the session's own expiry policy of one day.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::cache::{CacheError, SharedCache};

/// Maximum tolerated staleness of a binding (one day).
const SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Shared-cache backed user -> connection mapping.
///
/// The registry is the sole writer of the `session:` key namespace.
pub struct SessionRegistry {
    cache: Arc<dyn SharedCache>,
}

impl SessionRegistry {
    pub fn new(cache: Arc<dyn SharedCache>) -> Self {
        Self { cache }
    }

    fn key(user_id: &str) -> String {
        format!("session:user:{}:connection", user_id)
    }

    /// Bind a live connection to a user. A newer connection replaces the
    /// previous binding.
    pub async fn bind(&self, user_id: &str, connection_id: &str) -> Result<(), CacheError> {
        self.cache
            .set_with_ttl(&Self::key(user_id), connection_id, SESSION_TTL)
            .await?;
        tracing::debug!(user_id, connection_id, "[Sessions] Connection bound");
        Ok(())
    }

    /// Remove the user's binding on explicit disconnect.
    pub async fn unbind(&self, user_id: &str) -> Result<(), CacheError> {
        self.cache.delete(&Self::key(user_id)).await?;
        tracing::debug!(user_id, "[Sessions] Connection unbound");
        Ok(())
    }

    /// The connection currently bound to a user, if any.
    pub async fn lookup(&self, user_id: &str) -> Result<Option<String>, CacheError> {
        self.cache.get(&Self::key(user_id)).await
    }
}
