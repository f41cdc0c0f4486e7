//! In-process cache with TTL expiry.
//!
//! Backs the presence tracker and session registry in single-node mode and
//! in tests. Expiry is checked lazily on read; an expired entry is removed
//! and reported as absent, which gives the same observable behavior as a
//! store-side TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheError, SharedCache};

#[derive(Default)]
struct MemoryCacheInner {
    values: HashMap<String, (String, Instant)>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-memory [`SharedCache`] implementation.
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner
            .values
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        match inner.values.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                inner.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.values.remove(key);
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner
            .sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(members) = inner.sets.get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, CacheError> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        Ok(inner
            .sets
            .get(set)
            .map(|members| members.contains(member))
            .unwrap_or(false))
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, CacheError> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        Ok(inner
            .sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_with_ttl_refreshes_deadline() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache
            .set_with_ttl("k", "v", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_set_membership() {
        let cache = MemoryCache::new();
        cache.set_add("online", "alice").await.unwrap();
        assert!(cache.set_contains("online", "alice").await.unwrap());
        assert!(!cache.set_contains("online", "bob").await.unwrap());

        cache.set_remove("online", "alice").await.unwrap();
        assert!(!cache.set_contains("online", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.delete("missing").await.unwrap();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
