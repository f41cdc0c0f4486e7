//! Presence Fanout Listener
//!
//! One background task per backend process. It subscribes to the presence
//! channel and forwards each transition to the transitioning user's friends
//! that are connected to this process. Remote processes run their own
//! listener and receive the same event through the cluster bridge, so
//! delivery here is local-only to avoid echoing events back onto the wire.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::backend::bus::{EventBus, UserEvent};
use crate::backend::friends::FriendDirectory;

/// Spawn the per-process presence listener.
pub fn spawn_presence_listener(
    bus: Arc<EventBus>,
    friends: Arc<dyn FriendDirectory>,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe_presence();
    tokio::spawn(async move {
        tracing::info!("[Presence] Listener subscribed to presence updates");
        loop {
            let update = match rx.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Presence] Listener lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => {
                    tracing::info!("[Presence] Presence channel closed, listener stopping");
                    break;
                }
            };

            let friend_ids = match friends.list_friend_ids(&update.user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!(
                        user_id = %update.user_id,
                        "[Presence] Failed to load friends for fanout: {}",
                        e
                    );
                    continue;
                }
            };

            for friend_id in friend_ids {
                bus.deliver_user_local(&friend_id, UserEvent::PresenceUpdate(update.clone()));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::friends::StaticFriends;
    use crate::shared::messaging::{PresenceStatus, PresenceUpdate};

    #[tokio::test]
    async fn test_presence_fans_out_to_friends_only() {
        let bus = Arc::new(EventBus::new());
        let friends = Arc::new(StaticFriends::new().add_pair("alice", "bob"));
        let _listener = spawn_presence_listener(bus.clone(), friends);

        let mut bob_rx = bus.subscribe_user("bob");
        let mut carol_rx = bus.subscribe_user("carol");

        bus.publish_presence(PresenceUpdate::now("alice", PresenceStatus::Online));

        match bob_rx.recv().await.unwrap() {
            UserEvent::PresenceUpdate(update) => {
                assert_eq!(update.user_id, "alice");
                assert_eq!(update.status, PresenceStatus::Online);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // carol is not a friend of alice and must see nothing
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(carol_rx.try_recv().is_err());
    }
}
