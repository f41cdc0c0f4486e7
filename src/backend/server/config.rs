//! Server Configuration
//!
//! Configuration is loaded from environment variables with defaults suited
//! to local development. PostgreSQL and Redis are optional: when their URLs
//! are absent the server runs single-process with in-memory implementations
//! of the same traits, which is also how the test suite runs.

use sqlx::PgPool;
use std::time::Duration;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// PostgreSQL connection string. `None` disables durable history.
    pub database_url: Option<String>,
    /// Redis connection string. `None` disables cross-instance mode.
    pub redis_url: Option<String>,
    /// Secret used to sign and verify session tokens.
    pub jwt_secret: String,
    /// Presence marker lifetime; heartbeats refresh at half this.
    pub presence_ttl: Duration,
    /// Partition count for the in-process durable log.
    pub log_partitions: usize,
    /// Upper bound on records per persistence batch.
    pub consumer_max_batch: usize,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using development default");
            "dev-secret-change-in-production".to_string()
        });

        let presence_ttl_secs = std::env::var("PRESENCE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let log_partitions = std::env::var("LOG_PARTITIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);

        let consumer_max_batch = std::env::var("CONSUMER_MAX_BATCH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        Self {
            port,
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            jwt_secret,
            presence_ttl: Duration::from_secs(presence_ttl_secs),
            log_partitions,
            consumer_max_batch,
        }
    }
}

/// Connect to PostgreSQL and run migrations.
///
/// Errors are logged and yield `None`; the server then runs with the
/// in-memory store instead of refusing to start.
pub async fn load_database(config: &Config) -> Option<PgPool> {
    let database_url = match &config.database_url {
        Some(url) => url,
        None => {
            tracing::warn!("DATABASE_URL not set. Message history will be in-memory only.");
            return None;
        }
    };

    tracing::info!("Connecting to database...");
    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory message history.");
            return None;
        }
    };
    tracing::info!("Database connection pool created successfully");

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {:?}", e);
            // Continue anyway - migrations might have already been run
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}
