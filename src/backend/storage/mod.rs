//! Relational Message Store
//!
//! Exposes batch insertion (for the persistence consumer) and backward
//! timestamp pagination (for the history API) behind the [`MessageStore`]
//! trait. Insertion is idempotent on the message id, which is what lets
//! the consumer replay an uncommitted batch after a crash without
//! duplicating user-visible history.
//!
//! [`PgMessageStore`] is the production implementation;
//! [`MemoryMessageStore`] serves single-process mode and tests with the
//! same contract.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::messaging::{ChatMessage, ConversationKey, MessagePage};

pub mod db;

pub use db::PgMessageStore;

/// Default history page size.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Batch persistence and history queries.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert a batch atomically. Messages whose id is already present are
    /// skipped, so re-delivered batches are harmless.
    async fn insert_messages(&self, batch: &[ChatMessage]) -> Result<(), StoreError>;

    /// One page of a conversation's history, most-recent-first, optionally
    /// restricted to messages strictly older than `before`.
    async fn query_messages(
        &self,
        conversation_key: &ConversationKey,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<MessagePage, StoreError>;
}

#[derive(Default)]
struct MemoryStoreInner {
    messages: Vec<ChatMessage>,
    ids: HashSet<Uuid>,
}

/// In-memory [`MessageStore`] implementation.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages. Test introspection.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert_messages(&self, batch: &[ChatMessage]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        for message in batch {
            if inner.ids.insert(message.id) {
                inner.messages.push(message.clone());
            }
        }
        Ok(())
    }

    async fn query_messages(
        &self,
        conversation_key: &ConversationKey,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<MessagePage, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut matching: Vec<(usize, &ChatMessage)> = inner
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                m.conversation_key == *conversation_key
                    && before.map(|b| m.created_at < b).unwrap_or(true)
            })
            .collect();

        // most-recent-first; insertion order breaks created_at ties
        matching.sort_by(|(ia, a), (ib, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| ib.cmp(ia))
        });

        let messages: Vec<ChatMessage> = matching
            .into_iter()
            .take(limit)
            .map(|(_, m)| m.clone())
            .collect();

        let has_more = messages.len() == limit;
        let cursor = messages.last().map(|m| m.created_at);
        Ok(MessagePage {
            messages,
            has_more,
            cursor,
        })
    }
}
