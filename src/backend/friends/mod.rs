//! Friend Directory
//!
//! Collaborator interface consumed by the presence fanout: given a user,
//! which peers should learn about their presence transitions. Friendship
//! CRUD and the request workflow live outside this crate.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::backend::error::BackendError;

/// Read-only view of the friend relation.
#[async_trait]
pub trait FriendDirectory: Send + Sync {
    /// Ids of every friend of `user_id`, in stable order.
    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, BackendError>;
}

/// PostgreSQL-backed directory over the `friends` table. The relation is
/// stored one row per pair, so both directions are queried.
pub struct PgFriendDirectory {
    pool: PgPool,
}

impl PgFriendDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FriendDirectory for PgFriendDirectory {
    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        let rows = sqlx::query(
            r#"
            SELECT CASE WHEN user_id = $1 THEN friend_id ELSE user_id END AS other_id
            FROM friends
            WHERE user_id = $1 OR friend_id = $1
            ORDER BY other_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BackendError::transient(format!("friend lookup failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("other_id"))
            .collect())
    }
}

/// Fixed in-memory directory for single-process mode and tests.
#[derive(Default)]
pub struct StaticFriends {
    pairs: Vec<(String, String)>,
}

impl StaticFriends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a mutual friendship.
    pub fn add_pair(mut self, a: &str, b: &str) -> Self {
        self.pairs.push((a.to_string(), b.to_string()));
        self
    }
}

#[async_trait]
impl FriendDirectory for StaticFriends {
    async fn list_friend_ids(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        let mut ids: Vec<String> = self
            .pairs
            .iter()
            .filter_map(|(a, b)| {
                if a == user_id {
                    Some(b.clone())
                } else if b == user_id {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
