//! Shared Cache
//!
//! The shared key-value/set store behind the presence tracker and the
//! session registry. Entries carry a TTL so that state left behind by a
//! crashed process self-heals: a last-seen marker expires within the
//! presence TTL and a session binding within its own expiry window.
//!
//! Two implementations:
//!
//! - [`MemoryCache`] - in-process, used in single-node mode and tests
//! - [`RedisCache`] - Redis-backed, shared across backend instances
//!
//! The presence tracker and session registry are the sole writers of their
//! respective key namespaces; nothing else mutates these entries directly.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Shared-store failure.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key-value and set operations with TTL semantics.
///
/// An expired key behaves exactly like a deleted one: `get` returns `None`
/// and set members whose companion marker expired are treated as absent by
/// the readers that pair sets with markers.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Set a key with a time-to-live.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Get a key's value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Add a member to a set.
    async fn set_add(&self, set: &str, member: &str) -> Result<(), CacheError>;

    /// Remove a member from a set.
    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CacheError>;

    /// Whether a member is in a set.
    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, CacheError>;

    /// All members of a set.
    async fn set_members(&self, set: &str) -> Result<Vec<String>, CacheError>;
}
