//! Redis Cluster Bridge
//!
//! Connects the process-local [`EventBus`](super::EventBus) to every other
//! backend instance through a single Redis pub/sub channel. Outbound events
//! are serialized as [`Envelope`](super::Envelope)s; inbound envelopes from
//! other processes are re-delivered locally. Envelopes that originated on
//! this process are dropped, because local delivery already happened at
//! publish time.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Envelope, EventBus, RoutedEvent};
use crate::backend::cache::CacheError;

/// Redis channel all instances share.
const BUS_CHANNEL: &str = "relaychat:bus";

/// Background tasks forming the bridge; aborted on shutdown.
pub struct ClusterBridge {
    publisher: JoinHandle<()>,
    subscriber: JoinHandle<()>,
}

impl ClusterBridge {
    /// Start the bridge: attach a forwarder to the bus, spawn the outbound
    /// publisher and the inbound subscriber.
    pub async fn start(bus: Arc<EventBus>, redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let mut publish_conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        pubsub
            .subscribe(BUS_CHANNEL)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        bus.attach_remote(tx);

        let publisher = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let payload = match serde_json::to_string(&envelope) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("[Bus] Failed to serialize envelope: {}", e);
                        continue;
                    }
                };
                let result: Result<(), redis::RedisError> = redis::cmd("PUBLISH")
                    .arg(BUS_CHANNEL)
                    .arg(&payload)
                    .query_async(&mut publish_conn)
                    .await;
                if let Err(e) = result {
                    tracing::error!("[Bus] Failed to publish envelope: {}", e);
                }
            }
            tracing::info!("[Bus] Cluster publisher stopped");
        });

        let local_id = bus.process_id();
        let subscriber = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("[Bus] Unreadable cluster payload: {}", e);
                        continue;
                    }
                };
                let envelope: Envelope = match serde_json::from_str(&payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::error!("[Bus] Malformed cluster envelope: {}", e);
                        continue;
                    }
                };
                if envelope.origin == local_id {
                    continue;
                }
                match envelope.routed {
                    RoutedEvent::User { user_id, event } => {
                        bus.deliver_user_local(&user_id, event);
                    }
                    RoutedEvent::Presence { update } => {
                        bus.deliver_presence_local(update);
                    }
                }
            }
            tracing::info!("[Bus] Cluster subscriber stopped");
        });

        tracing::info!("[Bus] Cluster bridge active on channel {}", BUS_CHANNEL);
        Ok(Self {
            publisher,
            subscriber,
        })
    }

    /// Stop both bridge tasks.
    pub fn shutdown(self) {
        self.publisher.abort();
        self.subscriber.abort();
    }
}
