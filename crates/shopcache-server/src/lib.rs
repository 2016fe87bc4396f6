pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod session;

pub use cache::{
    CachePolicy, CacheStats, Outcome, SharedStore, ShopCacheInvalidator, ShopCacheReader,
    ShopService, StoreError,
};
pub use config::{AppConfig, CacheConfig, LoggingConfig, ReadStrategy, RedisConfig, SessionConfig};
pub use error::CacheError;
pub use observability::{active_filter, init_tracing, reload_logging};
pub use session::{CurrentUser, Identity, SessionValidator, session_middleware};

/// Create the shared store based on configuration.
///
/// ## Modes
///
/// - **Redis disabled**: returns a local-only store (DashMap)
/// - **Redis enabled**: connects to Redis, falls back to local on failure
///
/// ## Graceful Degradation
///
/// If the Redis connection fails, the process keeps serving from a local
/// store. Rebuild locks then only coordinate tasks within this process, so
/// each instance may rebuild a hot entry once instead of once overall.
pub async fn create_shared_store(config: &RedisConfig) -> SharedStore {
    use std::time::Duration;

    if !config.enabled {
        tracing::info!("Redis disabled, using local store only");
        return SharedStore::new_local();
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    redis_config.pool = Some(pool_config);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local store."
            );
            return SharedStore::new_local();
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            SharedStore::new_redis(pool)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local store."
            );
            SharedStore::new_local()
        }
    }
}

/// Spawn a task that periodically sweeps expired entries from a local store.
///
/// Returns `None` for Redis, which expires keys itself.
pub fn spawn_local_cleanup(
    store: &SharedStore,
    every: std::time::Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if !matches!(store, SharedStore::Local(_)) {
        return None;
    }
    let store = store.clone();
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = store.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "swept expired local store entries");
            }
        }
    }))
}
