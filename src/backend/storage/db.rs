//! Database operations for message persistence
//!
//! PostgreSQL implementation of the message store. The `seq` column is a
//! serial assigned at insert; it breaks `created_at` ties so that pages are
//! stable when a batch commits several messages in the same millisecond.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{MessagePage, MessageStore, StoreError};
use crate::shared::messaging::{ChatMessage, ConversationKey};

/// Insert a batch of messages, skipping ids that already exist.
pub async fn insert_messages(pool: &PgPool, batch: &[ChatMessage]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for message in batch {
        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_key, sender_id, receiver_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_key.as_str())
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Fetch one history page for a conversation, most-recent-first.
pub async fn query_messages(
    pool: &PgPool,
    conversation_key: &ConversationKey,
    before: Option<DateTime<Utc>>,
    limit: usize,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    let rows = match before {
        Some(before) => {
            sqlx::query(
                r#"
                SELECT id, conversation_key, sender_id, receiver_id, body, created_at
                FROM messages
                WHERE conversation_key = $1 AND created_at < $2
                ORDER BY created_at DESC, seq DESC
                LIMIT $3
                "#,
            )
            .bind(conversation_key.as_str())
            .bind(before)
            .bind(limit as i64)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, conversation_key, sender_id, receiver_id, body, created_at
                FROM messages
                WHERE conversation_key = $1
                ORDER BY created_at DESC, seq DESC
                LIMIT $2
                "#,
            )
            .bind(conversation_key.as_str())
            .bind(limit as i64)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows
        .into_iter()
        .map(|row| ChatMessage {
            id: row.get::<Uuid, _>("id"),
            conversation_key: ConversationKey::from(row.get::<String, _>("conversation_key")),
            sender_id: row.get("sender_id"),
            receiver_id: row.get("receiver_id"),
            body: row.get("body"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// PostgreSQL-backed [`MessageStore`].
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert_messages(&self, batch: &[ChatMessage]) -> Result<(), StoreError> {
        insert_messages(&self.pool, batch)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn query_messages(
        &self,
        conversation_key: &ConversationKey,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let messages = query_messages(&self.pool, conversation_key, before, limit)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let has_more = messages.len() == limit;
        let cursor = messages.last().map(|m| m.created_at);
        Ok(MessagePage {
            messages,
            has_more,
            cursor,
        })
    }
}
