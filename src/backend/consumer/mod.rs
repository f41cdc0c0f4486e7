//! Persistence Consumer
//!
//! Background loop that drains the durable log into the relational store.
//! Offsets are managed manually and committed per batch, only after the
//! batch write succeeds: a failed write leaves the offsets untouched, so
//! the same batch is redelivered after backoff. Combined with id-idempotent
//! insertion this yields at-least-once persistence with no visible
//! duplicates.
//!
//! Malformed records are logged and skipped; a parse failure never stalls
//! the batch. Storage failures are never surfaced to end users: the
//! consumer retries until the store recovers, while fanout keeps working
//! and history simply lags.
//!
//! Backpressure: the next batch is not fetched until the previous batch's
//! relational write has completed and committed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::backend::log::{LogConsumer, LogRecord};
use crate::backend::storage::MessageStore;
use crate::shared::messaging::{ChatMessage, PendingMessage};

/// Base retry backoff for failed batch writes; doubles up to [`MAX_BACKOFF`].
const BASE_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Drains log batches into the message store.
pub struct PersistenceConsumer {
    consumer: Box<dyn LogConsumer>,
    store: Arc<dyn MessageStore>,
    max_batch: usize,
    shutdown: watch::Receiver<bool>,
}

impl PersistenceConsumer {
    pub fn new(
        consumer: Box<dyn LogConsumer>,
        store: Arc<dyn MessageStore>,
        max_batch: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            consumer,
            store,
            max_batch,
            shutdown,
        }
    }

    /// Run until shutdown is signaled.
    ///
    /// A shutdown request observed while waiting for a batch stops the loop
    /// immediately; one observed mid-batch lets the in-flight batch finish
    /// and commit first. In-flight work is never abandoned mid-write.
    pub async fn run(mut self) {
        tracing::info!("[Consumer] Persistence consumer started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = self.shutdown.changed() => {
                    // a dropped sender also means the server is going away
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                fetched = self.consumer.fetch_batch(self.max_batch) => {
                    match fetched {
                        Ok(batch) => {
                            if !self.process_batch(batch).await {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!("[Consumer] Fetch failed: {}", e);
                            tokio::time::sleep(BASE_BACKOFF).await;
                        }
                    }
                }
            }
        }
        tracing::info!("[Consumer] Persistence consumer stopped");
    }

    /// Parse, write, and commit one batch. Returns `false` when a shutdown
    /// request interrupted the write retries; offsets stay uncommitted so
    /// the batch is redelivered on restart.
    pub async fn process_batch(&mut self, batch: Vec<LogRecord>) -> bool {
        let valid = parse_batch(&batch);

        if !valid.is_empty() {
            let mut backoff = BASE_BACKOFF;
            loop {
                match self.store.insert_messages(&valid).await {
                    Ok(()) => {
                        tracing::info!(count = valid.len(), "[Consumer] Messages saved to store");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(
                            "[Consumer] Batch write failed, retrying in {:?}: {}",
                            backoff,
                            e
                        );
                        if *self.shutdown.borrow() {
                            tracing::warn!(
                                "[Consumer] Shutdown during write retries, batch left uncommitted"
                            );
                            return false;
                        }
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            changed = self.shutdown.changed() => {
                                if changed.is_err() || *self.shutdown.borrow() {
                                    tracing::warn!(
                                        "[Consumer] Shutdown during write retries, batch left uncommitted"
                                    );
                                    return false;
                                }
                            }
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        }

        if let Err(e) = self.consumer.commit().await {
            tracing::error!("[Consumer] Offset commit failed: {}", e);
        }
        if let Err(e) = self.consumer.heartbeat().await {
            tracing::warn!("[Consumer] Heartbeat failed: {}", e);
        }
        true
    }
}

/// Decode a fetched batch, finalizing ids and timestamps.
///
/// Malformed entries are logged and dropped; partial success is the policy
/// for parse errors.
fn parse_batch(batch: &[LogRecord]) -> Vec<ChatMessage> {
    let mut valid = Vec::with_capacity(batch.len());
    for record in batch {
        match serde_json::from_slice::<PendingMessage>(&record.payload) {
            Ok(pending) => valid.push(pending.finalize(chrono::Utc::now())),
            Err(e) => {
                tracing::error!(
                    partition = record.partition,
                    offset = record.offset,
                    "[Consumer] Error parsing message, skipping: {}",
                    e
                );
            }
        }
    }
    valid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::log::{DurableLog, LogError, MemoryLog};
    use crate::backend::storage::{MemoryMessageStore, StoreError};
    use crate::shared::messaging::ConversationKey;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Store double that fails the first `failures` writes.
    struct FlakyStore {
        inner: MemoryMessageStore,
        failures: AtomicU32,
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        async fn insert_messages(&self, batch: &[ChatMessage]) -> Result<(), StoreError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| f.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Unavailable("simulated outage".to_string()));
            }
            self.inner.insert_messages(batch).await
        }

        async fn query_messages(
            &self,
            conversation_key: &ConversationKey,
            before: Option<DateTime<Utc>>,
            limit: usize,
        ) -> Result<crate::shared::messaging::MessagePage, StoreError> {
            self.inner.query_messages(conversation_key, before, limit).await
        }
    }

    async fn append_pending(log: &MemoryLog, sender: &str, receiver: &str, body: &str) {
        let pending = PendingMessage::new(sender, receiver, body);
        log.append(
            pending.conversation_key.as_str(),
            serde_json::to_vec(&pending).unwrap(),
        )
        .await
        .unwrap();
    }

    fn consumer_for(
        log: &MemoryLog,
        store: Arc<dyn MessageStore>,
    ) -> (PersistenceConsumer, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            PersistenceConsumer::new(Box::new(log.consumer()), store, 100, rx),
            tx,
        )
    }

    #[tokio::test]
    async fn test_batch_is_persisted_and_committed() {
        let log = MemoryLog::new(4);
        let store = Arc::new(MemoryMessageStore::new());
        let (mut consumer, _tx) = consumer_for(&log, store.clone());

        append_pending(&log, "alice", "bob", "one").await;
        append_pending(&log, "alice", "bob", "two").await;

        let batch = consumer.consumer.fetch_batch(100).await.unwrap();
        assert!(consumer.process_batch(batch).await);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped_not_poisonous() {
        let log = MemoryLog::new(1);
        let store = Arc::new(MemoryMessageStore::new());
        let (mut consumer, _tx) = consumer_for(&log, store.clone());

        append_pending(&log, "alice", "bob", "good").await;
        log.append("alice_bob", b"not json".to_vec()).await.unwrap();
        append_pending(&log, "alice", "bob", "also good").await;

        let batch = consumer.consumer.fetch_batch(100).await.unwrap();
        assert!(consumer.process_batch(batch).await);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_write_is_retried_until_store_recovers() {
        let log = MemoryLog::new(1);
        let store = Arc::new(FlakyStore {
            inner: MemoryMessageStore::new(),
            failures: AtomicU32::new(2),
        });
        let (mut consumer, _tx) = consumer_for(&log, store.clone());

        append_pending(&log, "alice", "bob", "hi").await;

        let batch = consumer.consumer.fetch_batch(100).await.unwrap();
        assert!(consumer.process_batch(batch).await);

        let page = store
            .query_messages(&ConversationKey::new("alice", "bob"), None, 10)
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_replayed_batch_does_not_duplicate_history() {
        let log = MemoryLog::new(1);
        let store = Arc::new(MemoryMessageStore::new());

        append_pending(&log, "alice", "bob", "hi").await;

        // first consumer processes but its offsets are lost (crash)
        let (mut first, _tx1) = consumer_for(&log, store.clone());
        let batch = first.consumer.fetch_batch(100).await.unwrap();
        assert!(first.process_batch(batch).await);

        // recovery replays from offset zero
        let (mut second, _tx2) = consumer_for(&log, store.clone());
        let batch = second.consumer.fetch_batch(100).await.unwrap();
        assert!(second.process_batch(batch).await);

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_per_conversation_order_is_preserved() {
        let log = MemoryLog::new(8);
        let store = Arc::new(MemoryMessageStore::new());
        let (mut consumer, _tx) = consumer_for(&log, store.clone());

        for i in 0..5 {
            append_pending(&log, "alice", "bob", &format!("m{}", i)).await;
        }

        let batch = consumer.consumer.fetch_batch(100).await.unwrap();
        assert!(consumer.process_batch(batch).await);

        let page = store
            .query_messages(&ConversationKey::new("alice", "bob"), None, 10)
            .await
            .unwrap();
        let bodies: Vec<&str> = page.messages.iter().map(|m| m.body.as_str()).collect();
        // most-recent-first: submission order reversed
        assert_eq!(bodies, vec!["m4", "m3", "m2", "m1", "m0"]);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let log = MemoryLog::new(1);
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, tx) = consumer_for(&log, store);

        let handle = tokio::spawn(consumer.run());
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop promptly")
            .unwrap();
    }

    /// Log consumer double whose fetch always fails.
    struct BrokenConsumer;

    #[async_trait]
    impl LogConsumer for BrokenConsumer {
        async fn fetch_batch(&mut self, _max: usize) -> Result<Vec<LogRecord>, LogError> {
            Err(LogError::Unavailable("down".to_string()))
        }
        async fn commit(&mut self) -> Result<(), LogError> {
            Ok(())
        }
        async fn heartbeat(&mut self) -> Result<(), LogError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fetch_errors_do_not_kill_the_loop() {
        let store = Arc::new(MemoryMessageStore::new());
        let (tx, rx) = watch::channel(false);
        let consumer = PersistenceConsumer::new(Box::new(BrokenConsumer), store, 10, rx);

        let handle = tokio::spawn(consumer.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer should stop on shutdown")
            .unwrap();
    }
}
