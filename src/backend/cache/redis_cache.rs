//! Redis-backed shared cache.
//!
//! Used when `REDIS_URL` is configured, so presence and session state is
//! visible to every backend instance. TTLs are enforced server-side with
//! `SETEX`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CacheError, SharedCache};

/// Redis [`SharedCache`] implementation over a multiplexed connection.
pub struct RedisCache {
    connection: Arc<Mutex<redis::aio::MultiplexedConnection>>,
}

impl RedisCache {
    /// Connect to Redis and verify the connection with a `PING`.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        tracing::info!("[Cache] Redis connected");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

#[async_trait]
impl SharedCache for RedisCache {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.lock().await;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.lock().await;
        let _: () = redis::cmd("SADD")
            .arg(set)
            .arg(member)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.lock().await;
        let _: () = redis::cmd("SREM")
            .arg(set)
            .arg(member)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.lock().await;
        let is_member: i64 = redis::cmd("SISMEMBER")
            .arg(set)
            .arg(member)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(is_member == 1)
    }

    async fn set_members(&self, set: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.lock().await;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(set)
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(members)
    }
}
