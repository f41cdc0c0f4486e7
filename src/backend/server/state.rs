//! Application State
//!
//! `AppState` is the central state container handed to the Axum router.
//! Every service behind it is either `Arc`-shared or internally
//! synchronized, so the state clones cheaply per request.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::backend::bus::EventBus;
use crate::backend::friends::FriendDirectory;
use crate::backend::gateway::MessageGateway;
use crate::backend::presence::PresenceTracker;
use crate::backend::server::config::Config;
use crate::backend::sessions::SessionRegistry;
use crate::backend::storage::MessageStore;

/// Shared state for all HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// In-process fanout hub, bridged across instances when Redis is
    /// configured.
    pub bus: Arc<EventBus>,
    pub gateway: Arc<MessageGateway>,
    pub presence: Arc<PresenceTracker>,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<dyn MessageStore>,
    pub friends: Arc<dyn FriendDirectory>,
    /// Set during graceful shutdown so `/ready` steers traffic away while
    /// in-flight work drains.
    pub shutting_down: Arc<AtomicBool>,
}
