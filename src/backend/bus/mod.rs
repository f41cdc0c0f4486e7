//! Cross-Instance Event Bus
//!
//! Routes "emit event X to all connections belonging to user Y" calls so
//! they reach matching connections regardless of which process holds them.
//!
//! Locally, each user gets a `tokio::sync::broadcast` channel; every live
//! connection of that user subscribes to it. A separate broadcast channel
//! carries presence transitions for the per-process presence listener.
//!
//! For multi-instance deployments the [`bridge::ClusterBridge`] relays every
//! published event over Redis pub/sub. Local delivery happens directly at
//! publish time; the bridge drops envelopes that originated on the same
//! process, so nothing is delivered twice.
//!
//! Ordering: publish order is preserved within one user channel end-to-end;
//! no ordering is guaranteed across channels.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::shared::messaging::{ConversationKey, PresenceUpdate};
use crate::shared::ServerFrame;

pub mod bridge;

pub use bridge::ClusterBridge;

/// Capacity of each per-user channel and of the presence channel.
const CHANNEL_CAPACITY: usize = 256;

/// An event addressed to a single user's connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UserEvent {
    /// A chat message fanned out ahead of persistence.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        conversation_key: ConversationKey,
        sender_id: String,
        receiver_id: String,
        body: String,
        timestamp: DateTime<Utc>,
    },
    /// A friend's presence transition.
    PresenceUpdate(PresenceUpdate),
}

impl From<UserEvent> for ServerFrame {
    fn from(event: UserEvent) -> Self {
        match event {
            UserEvent::ChatMessage {
                conversation_key,
                sender_id,
                receiver_id,
                body,
                timestamp,
            } => ServerFrame::ChatMessage {
                conversation_key,
                sender_id,
                receiver_id,
                body,
                timestamp,
            },
            UserEvent::PresenceUpdate(update) => ServerFrame::PresenceUpdate {
                user_id: update.user_id,
                status: update.status,
                timestamp: update.timestamp,
            },
        }
    }
}

/// A bus event routed between backend instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RoutedEvent {
    #[serde(rename_all = "camelCase")]
    User { user_id: String, event: UserEvent },
    Presence { update: PresenceUpdate },
}

/// Envelope published on the cluster channel. `origin` lets each process
/// drop its own relayed events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub origin: Uuid,
    pub routed: RoutedEvent,
}

/// The process-local event bus with optional cluster forwarding.
pub struct EventBus {
    user_channels: Mutex<HashMap<String, broadcast::Sender<UserEvent>>>,
    presence: broadcast::Sender<PresenceUpdate>,
    remote: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    process_id: Uuid,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (presence, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            user_channels: Mutex::new(HashMap::new()),
            presence,
            remote: Mutex::new(None),
            process_id: Uuid::new_v4(),
        }
    }

    /// Identity of this backend process on the cluster channel.
    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    /// Attach the cluster forwarder. Called once by the bridge at startup.
    pub fn attach_remote(&self, tx: mpsc::UnboundedSender<Envelope>) {
        *self.remote.lock().expect("bus lock poisoned") = Some(tx);
    }

    /// Subscribe to a user's channel, creating it if needed.
    pub fn subscribe_user(&self, user_id: &str) -> broadcast::Receiver<UserEvent> {
        let mut channels = self.user_channels.lock().expect("bus lock poisoned");
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to all of a user's connections, local and remote.
    ///
    /// Returns the number of local subscribers that received it. Delivery
    /// is fire-and-forget; a user with no connections anywhere simply
    /// receives nothing.
    pub fn publish_to_user(&self, user_id: &str, event: UserEvent) -> usize {
        let delivered = self.deliver_user_local(user_id, event.clone());
        self.forward(RoutedEvent::User {
            user_id: user_id.to_string(),
            event,
        });
        delivered
    }

    /// Deliver to local subscribers only. Used by the cluster bridge for
    /// events that already traveled over the wire.
    pub fn deliver_user_local(&self, user_id: &str, event: UserEvent) -> usize {
        let channels = self.user_channels.lock().expect("bus lock poisoned");
        match channels.get(user_id) {
            // send only fails when there are no receivers
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Publish a presence transition to this process and the cluster.
    pub fn publish_presence(&self, update: PresenceUpdate) {
        self.deliver_presence_local(update.clone());
        self.forward(RoutedEvent::Presence { update });
    }

    /// Deliver a presence transition to local subscribers only.
    pub fn deliver_presence_local(&self, update: PresenceUpdate) {
        if let Err(e) = self.presence.send(update) {
            tracing::debug!("[Bus] No presence subscribers: {:?}", e);
        }
    }

    /// Subscribe to all presence transitions seen by this process.
    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceUpdate> {
        self.presence.subscribe()
    }

    /// Drop user channels with no remaining subscribers.
    pub fn cleanup_inactive_channels(&self) {
        let mut channels = self.user_channels.lock().expect("bus lock poisoned");
        channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    fn forward(&self, routed: RoutedEvent) {
        let remote = self.remote.lock().expect("bus lock poisoned");
        if let Some(tx) = remote.as_ref() {
            let envelope = Envelope {
                origin: self.process_id,
                routed,
            };
            if tx.send(envelope).is_err() {
                tracing::warn!("[Bus] Cluster forwarder is gone, event stays local");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::messaging::PresenceStatus;

    fn chat_event(sender: &str, receiver: &str, body: &str) -> UserEvent {
        UserEvent::ChatMessage {
            conversation_key: ConversationKey::new(sender, receiver),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            body: body.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_all_user_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe_user("bob");
        let mut rx2 = bus.subscribe_user("bob");

        let delivered = bus.publish_to_user("bob", chat_event("alice", "bob", "hi"));
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                UserEvent::ChatMessage { body, .. } => assert_eq!(body, "hi"),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_to_absent_user_is_a_noop() {
        let bus = EventBus::new();
        assert_eq!(
            bus.publish_to_user("nobody", chat_event("alice", "nobody", "hi")),
            0
        );
    }

    #[tokio::test]
    async fn test_user_channel_preserves_publish_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_user("bob");
        for i in 0..5 {
            bus.publish_to_user("bob", chat_event("alice", "bob", &format!("m{}", i)));
        }
        for i in 0..5 {
            match rx.recv().await.unwrap() {
                UserEvent::ChatMessage { body, .. } => assert_eq!(body, format!("m{}", i)),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_presence_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_presence();
        bus.publish_presence(PresenceUpdate::now("alice", PresenceStatus::Online));
        let update = rx.recv().await.unwrap();
        assert_eq!(update.user_id, "alice");
        assert_eq!(update.status, PresenceStatus::Online);
    }

    #[tokio::test]
    async fn test_forwarded_envelope_carries_origin() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.attach_remote(tx);

        bus.publish_to_user("bob", chat_event("alice", "bob", "hi"));
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.origin, bus.process_id());
        match envelope.routed {
            RoutedEvent::User { user_id, .. } => assert_eq!(user_id, "bob"),
            other => panic!("unexpected routed event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cleanup_drops_subscriberless_channels() {
        let bus = EventBus::new();
        let rx = bus.subscribe_user("bob");
        drop(rx);
        bus.cleanup_inactive_channels();
        assert_eq!(bus.publish_to_user("bob", chat_event("a", "bob", "x")), 0);
    }

    #[test]
    fn test_user_event_wire_shape() {
        let event = UserEvent::PresenceUpdate(PresenceUpdate {
            user_id: "alice".to_string(),
            status: PresenceStatus::Online,
            timestamp: 7,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "presence-update");
        assert_eq!(json["userId"], "alice");
    }
}
