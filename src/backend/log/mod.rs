//! Durable Log
//!
//! The ordered, partitioned, append-only queue between the gateway and the
//! persistence consumer. Records appended under the same partition key land
//! on the same partition and are delivered to the consumer in submission
//! order; no ordering holds across partitions. The consumer manages its
//! offsets manually: a fetched batch is redelivered from the committed
//! offset until `commit` is called, which is what gives the pipeline its
//! at-least-once guarantee.
//!
//! [`MemoryLog`] is the in-process implementation used in single-node mode
//! and tests. A broker-backed log plugs in behind the same pair of traits;
//! they are the collaborator interface of this subsystem.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

/// Log failure.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Log unavailable: {0}")]
    Unavailable(String),
}

/// One record as seen by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub partition: usize,
    pub offset: u64,
    pub payload: Vec<u8>,
}

/// Producer side: append a payload under a partition key.
#[async_trait]
pub trait DurableLog: Send + Sync {
    async fn append(&self, partition_key: &str, payload: Vec<u8>) -> Result<(), LogError>;
}

/// Consumer side with manual offset management.
///
/// `fetch_batch` always resumes from the committed offsets, so a batch that
/// was fetched but never committed is redelivered in full. `heartbeat`
/// signals liveness to the log's group coordination during slow batch
/// writes.
#[async_trait]
pub trait LogConsumer: Send + Sync {
    /// Wait until at least one uncommitted record is available and return
    /// up to `max` records in partition offset order.
    async fn fetch_batch(&mut self, max: usize) -> Result<Vec<LogRecord>, LogError>;

    /// Advance the committed offsets past the last fetched batch.
    async fn commit(&mut self) -> Result<(), LogError>;

    /// Emit a liveness signal.
    async fn heartbeat(&mut self) -> Result<(), LogError>;
}

struct MemoryLogInner {
    partitions: Mutex<Vec<Vec<Arc<Vec<u8>>>>>,
    notify: Notify,
}

/// In-process partitioned log.
#[derive(Clone)]
pub struct MemoryLog {
    inner: Arc<MemoryLogInner>,
    partition_count: usize,
}

impl MemoryLog {
    pub fn new(partition_count: usize) -> Self {
        let partition_count = partition_count.max(1);
        Self {
            inner: Arc::new(MemoryLogInner {
                partitions: Mutex::new(vec![Vec::new(); partition_count]),
                notify: Notify::new(),
            }),
            partition_count,
        }
    }

    /// The partition a key hashes to.
    pub fn partition_for(&self, partition_key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        partition_key.hash(&mut hasher);
        (hasher.finish() % self.partition_count as u64) as usize
    }

    /// Create the consumer for this log, starting at offset zero on every
    /// partition. The log is single-consumer-per-partition by construction.
    pub fn consumer(&self) -> MemoryLogConsumer {
        MemoryLogConsumer {
            log: self.clone(),
            committed: vec![0; self.partition_count],
            fetched: vec![0; self.partition_count],
            last_heartbeat: Instant::now(),
        }
    }
}

#[async_trait]
impl DurableLog for MemoryLog {
    async fn append(&self, partition_key: &str, payload: Vec<u8>) -> Result<(), LogError> {
        let partition = self.partition_for(partition_key);
        {
            let mut partitions = self.inner.partitions.lock().expect("log lock poisoned");
            partitions[partition].push(Arc::new(payload));
        }
        self.inner.notify.notify_one();
        Ok(())
    }
}

/// Single consumer over a [`MemoryLog`].
pub struct MemoryLogConsumer {
    log: MemoryLog,
    committed: Vec<u64>,
    fetched: Vec<u64>,
    last_heartbeat: Instant,
}

impl MemoryLogConsumer {
    fn collect_batch(&mut self, max: usize) -> Vec<LogRecord> {
        let partitions = self.log.inner.partitions.lock().expect("log lock poisoned");
        let mut batch = Vec::new();
        self.fetched.copy_from_slice(&self.committed);
        for (partition, records) in partitions.iter().enumerate() {
            let start = self.committed[partition] as usize;
            for (i, payload) in records.iter().enumerate().skip(start) {
                if batch.len() >= max {
                    return batch;
                }
                batch.push(LogRecord {
                    partition,
                    offset: i as u64,
                    payload: payload.as_ref().clone(),
                });
                self.fetched[partition] = i as u64 + 1;
            }
        }
        batch
    }

    /// Time since the last liveness signal.
    pub fn since_last_heartbeat(&self) -> std::time::Duration {
        self.last_heartbeat.elapsed()
    }
}

#[async_trait]
impl LogConsumer for MemoryLogConsumer {
    async fn fetch_batch(&mut self, max: usize) -> Result<Vec<LogRecord>, LogError> {
        let inner = self.log.inner.clone();
        loop {
            // arm the notification before scanning so an append between the
            // scan and the await is not missed
            let notified = inner.notify.notified();
            tokio::pin!(notified);

            let batch = self.collect_batch(max);
            if !batch.is_empty() {
                return Ok(batch);
            }
            notified.await;
        }
    }

    async fn commit(&mut self) -> Result<(), LogError> {
        self.committed.copy_from_slice(&self.fetched);
        Ok(())
    }

    async fn heartbeat(&mut self) -> Result<(), LogError> {
        self.last_heartbeat = Instant::now();
        Ok(())
    }
}
