//! Server Initialization
//!
//! Wires the services together and starts the background tasks: the
//! persistence consumer, the presence fanout listener, the optional Redis
//! cluster bridge, and a periodic sweep of idle bus channels.
//!
//! Missing external services downgrade rather than abort: no PostgreSQL
//! means in-memory history, no Redis means single-instance presence and no
//! cross-instance fanout. The trait seams make both modes run the same
//! code paths.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::bus::{ClusterBridge, EventBus};
use crate::backend::cache::{MemoryCache, RedisCache, SharedCache};
use crate::backend::consumer::PersistenceConsumer;
use crate::backend::friends::{FriendDirectory, PgFriendDirectory, StaticFriends};
use crate::backend::gateway::MessageGateway;
use crate::backend::log::MemoryLog;
use crate::backend::presence::{spawn_presence_listener, PresenceTracker};
use crate::backend::routes::create_router;
use crate::backend::server::config::{load_database, Config};
use crate::backend::server::state::AppState;
use crate::backend::sessions::SessionRegistry;
use crate::backend::storage::{MemoryMessageStore, MessageStore, PgMessageStore};

/// Idle bus channels are swept every 5 minutes.
const CHANNEL_SWEEP_PERIOD: std::time::Duration = std::time::Duration::from_secs(300);

/// The running application: router plus handles needed for an orderly
/// shutdown.
pub struct App {
    pub router: Router,
    pub state: AppState,
    /// Flipping this to `true` asks the consumer to finish its in-flight
    /// batch and stop.
    pub shutdown: watch::Sender<bool>,
    pub consumer: JoinHandle<()>,
    pub presence_listener: JoinHandle<()>,
    pub bridge: Option<ClusterBridge>,
}

/// Build the full service graph from configuration.
pub async fn create_app(config: Config) -> App {
    tracing::info!("Initializing chat backend");

    let config = Arc::new(config);
    let bus = Arc::new(EventBus::new());

    // External services; each falls back to its in-memory twin
    let db_pool = load_database(&config).await;

    let cache: Arc<dyn SharedCache> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tracing::error!("Redis connection failed: {}", e);
                tracing::warn!("Falling back to process-local presence and sessions.");
                Arc::new(MemoryCache::new())
            }
        },
        None => {
            tracing::warn!("REDIS_URL not set. Presence and sessions are process-local.");
            Arc::new(MemoryCache::new())
        }
    };

    let store: Arc<dyn MessageStore> = match &db_pool {
        Some(pool) => Arc::new(PgMessageStore::new(pool.clone())),
        None => Arc::new(MemoryMessageStore::new()),
    };

    let friends: Arc<dyn FriendDirectory> = match &db_pool {
        Some(pool) => Arc::new(PgFriendDirectory::new(pool.clone())),
        None => Arc::new(StaticFriends::new()),
    };

    let sessions = Arc::new(SessionRegistry::new(cache.clone()));
    let presence = Arc::new(PresenceTracker::new(
        cache.clone(),
        bus.clone(),
        config.presence_ttl,
    ));

    // Delivery pipeline: gateway appends to the log, consumer drains it
    let log = MemoryLog::new(config.log_partitions);
    let gateway = Arc::new(MessageGateway::new(bus.clone(), Arc::new(log.clone())));

    let (shutdown, shutdown_rx) = watch::channel(false);
    let consumer = PersistenceConsumer::new(
        Box::new(log.consumer()),
        store.clone(),
        config.consumer_max_batch,
        shutdown_rx,
    );
    let consumer = tokio::spawn(consumer.run());

    let presence_listener = spawn_presence_listener(bus.clone(), friends.clone());

    let bridge = match &config.redis_url {
        Some(url) => match ClusterBridge::start(bus.clone(), url).await {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                tracing::error!("Cluster bridge failed to start: {}", e);
                tracing::warn!("Fanout is limited to this instance.");
                None
            }
        },
        None => None,
    };

    let state = AppState {
        config,
        bus: bus.clone(),
        gateway,
        presence,
        sessions,
        store,
        friends,
        shutting_down: Arc::new(std::sync::atomic::AtomicBool::new(false)),
    };

    let router = create_router(state.clone());

    // Sweep fanout channels whose last subscriber disconnected
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHANNEL_SWEEP_PERIOD);
        loop {
            interval.tick().await;
            bus.cleanup_inactive_channels();
            tracing::debug!("Cleaned up inactive fanout channels");
        }
    });

    tracing::info!("Router configured, background tasks running");

    App {
        router,
        state,
        shutdown,
        consumer,
        presence_listener,
        bridge,
    }
}

impl App {
    /// Orderly teardown: stop intake first, let the consumer finish and
    /// commit its in-flight batch, then detach from the cluster.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down backend services");
        self.state
            .shutting_down
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        if let Err(e) = self.consumer.await {
            tracing::error!("Persistence consumer task failed: {}", e);
        }
        self.presence_listener.abort();
        if let Some(bridge) = self.bridge {
            bridge.shutdown();
        }
        tracing::info!("Backend services stopped");
    }
}
