//! Key layout and timing policy for shop cache entries and rebuild locks.

use std::time::Duration;

use crate::config::CacheConfig;

/// Opaque value stored under a rebuild lock key.
pub const LOCK_MARKER: &str = "1";

/// Key prefixes, TTLs and retry budget used by the shop cache.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub shop_key_prefix: String,
    pub lock_key_prefix: String,
    /// TTL of positive entries.
    pub shop_ttl: Duration,
    /// TTL of empty-marker entries.
    pub null_ttl: Duration,
    /// Safety-net TTL of a rebuild lock, in case its holder dies.
    pub lock_ttl: Duration,
    /// Pause between lock attempts.
    pub retry_delay: Duration,
    /// Deadline for obtaining an answer while other callers hold the lock.
    pub lock_wait: Duration,
    pub max_lock_attempts: u32,
    /// Upper bound on one backing-store read.
    pub rebuild_timeout: Duration,
}

impl CachePolicy {
    #[inline]
    pub fn shop_key(&self, id: i64) -> String {
        format!("{}{id}", self.shop_key_prefix)
    }

    #[inline]
    pub fn lock_key(&self, id: i64) -> String {
        format!("{}{id}", self.lock_key_prefix)
    }
}

impl From<&CacheConfig> for CachePolicy {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            shop_key_prefix: cfg.shop_key_prefix.clone(),
            lock_key_prefix: cfg.lock_key_prefix.clone(),
            shop_ttl: Duration::from_secs(cfg.shop_ttl_secs),
            null_ttl: Duration::from_secs(cfg.null_ttl_secs),
            lock_ttl: Duration::from_secs(cfg.lock_ttl_secs),
            retry_delay: Duration::from_millis(cfg.lock_retry_delay_ms),
            lock_wait: Duration::from_millis(cfg.lock_wait_timeout_ms),
            max_lock_attempts: cfg.max_lock_attempts,
            rebuild_timeout: Duration::from_millis(cfg.rebuild_timeout_ms),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}
