use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time reserved inside the lock TTL for writing the rebuilt entry.
pub const REBUILD_WRITE_HEADROOM_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Shop cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Session validation configuration
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Redis validations
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        // Cache validations
        let cache = &self.cache;
        if cache.shop_ttl_secs == 0 {
            return Err("cache.shop_ttl_secs must be > 0".into());
        }
        if cache.null_ttl_secs == 0 || cache.null_ttl_secs >= cache.shop_ttl_secs {
            return Err("cache.null_ttl_secs must be > 0 and < cache.shop_ttl_secs".into());
        }
        if cache.lock_ttl_secs == 0 {
            return Err("cache.lock_ttl_secs must be > 0".into());
        }
        if cache.lock_retry_delay_ms == 0 || cache.lock_retry_delay_ms >= cache.lock_wait_timeout_ms
        {
            return Err(
                "cache.lock_retry_delay_ms must be > 0 and < cache.lock_wait_timeout_ms".into(),
            );
        }
        if cache.max_lock_attempts == 0 {
            return Err("cache.max_lock_attempts must be > 0".into());
        }
        if cache.rebuild_timeout_ms == 0 {
            return Err("cache.rebuild_timeout_ms must be > 0".into());
        }
        // The lock must outlive the slowest rebuild, including the cache write
        // that follows the backing-store read.
        if cache.rebuild_timeout_ms.saturating_add(REBUILD_WRITE_HEADROOM_MS)
            > cache.lock_ttl_secs.saturating_mul(1000)
        {
            return Err(format!(
                "cache.rebuild_timeout_ms must be at most cache.lock_ttl_secs * 1000 - {REBUILD_WRITE_HEADROOM_MS}"
            ));
        }
        // Key namespaces must not collide
        let prefixes = [
            ("cache.shop_key_prefix", &cache.shop_key_prefix),
            ("cache.lock_key_prefix", &cache.lock_key_prefix),
            ("session.key_prefix", &self.session.key_prefix),
        ];
        for (name, prefix) in prefixes {
            if prefix.is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        for (i, (a_name, a)) in prefixes.iter().enumerate() {
            for (b_name, b) in &prefixes[i + 1..] {
                if a.starts_with(b.as_str()) || b.starts_with(a.as_str()) {
                    return Err(format!("{a_name} and {b_name} must not overlap"));
                }
            }
        }
        // Session validations
        if self.session.ttl_secs == 0 {
            return Err("session.ttl_secs must be > 0".into());
        }
        if self.session.header.is_empty() {
            return Err("session.header must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (falls back to a process-local store without it)
    /// Default: false (single-instance deployments)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// How shop lookups treat a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// Single-flight rebuild guarded by a per-shop lock in the shared store
    #[default]
    Mutex,
    /// Negative caching only; concurrent misses all reach the backing store
    PassThrough,
}

/// Shop cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub strategy: ReadStrategy,

    /// Prefix of shop entries; the shop id is appended
    #[serde(default = "default_shop_key_prefix")]
    pub shop_key_prefix: String,

    /// Prefix of rebuild locks; the shop id is appended
    #[serde(default = "default_lock_key_prefix")]
    pub lock_key_prefix: String,

    /// TTL of positive entries in seconds
    #[serde(default = "default_shop_ttl_secs")]
    pub shop_ttl_secs: u64,

    /// TTL of empty-marker entries in seconds
    #[serde(default = "default_null_ttl_secs")]
    pub null_ttl_secs: u64,

    /// Safety-net TTL of a rebuild lock in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,

    /// Pause between attempts when another caller holds the lock
    #[serde(default = "default_lock_retry_delay_ms")]
    pub lock_retry_delay_ms: u64,

    /// Total time a lookup may spend waiting for the lock
    #[serde(default = "default_lock_wait_timeout_ms")]
    pub lock_wait_timeout_ms: u64,

    /// Maximum number of lock attempts per lookup
    #[serde(default = "default_max_lock_attempts")]
    pub max_lock_attempts: u32,

    /// Upper bound on a single backing-store read during a rebuild
    #[serde(default = "default_rebuild_timeout_ms")]
    pub rebuild_timeout_ms: u64,
}

fn default_shop_key_prefix() -> String {
    "cache:shop:".into()
}
fn default_lock_key_prefix() -> String {
    "lock:shop:".into()
}
fn default_shop_ttl_secs() -> u64 {
    30 * 60
}
fn default_null_ttl_secs() -> u64 {
    2 * 60
}
fn default_lock_ttl_secs() -> u64 {
    10
}
fn default_lock_retry_delay_ms() -> u64 {
    50
}
fn default_lock_wait_timeout_ms() -> u64 {
    5000
}
fn default_max_lock_attempts() -> u32 {
    100
}
fn default_rebuild_timeout_ms() -> u64 {
    3000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strategy: ReadStrategy::default(),
            shop_key_prefix: default_shop_key_prefix(),
            lock_key_prefix: default_lock_key_prefix(),
            shop_ttl_secs: default_shop_ttl_secs(),
            null_ttl_secs: default_null_ttl_secs(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_retry_delay_ms: default_lock_retry_delay_ms(),
            lock_wait_timeout_ms: default_lock_wait_timeout_ms(),
            max_lock_attempts: default_max_lock_attempts(),
            rebuild_timeout_ms: default_rebuild_timeout_ms(),
        }
    }
}

/// Session validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Prefix of session records; the token is appended
    #[serde(default = "default_session_key_prefix")]
    pub key_prefix: String,

    /// Sliding TTL of a session record in seconds
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    /// Request header carrying the session token
    #[serde(default = "default_session_header")]
    pub header: String,
}

fn default_session_key_prefix() -> String {
    "login:token:".into()
}
fn default_session_ttl_secs() -> u64 {
    30 * 60
}
fn default_session_header() -> String {
    "authorization".into()
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_session_key_prefix(),
            ttl_secs: default_session_ttl_secs(),
            header: default_session_header(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("shopcache.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., SHOPCACHE__CACHE__SHOP_TTL_SECS=600
        builder = builder.add_source(
            Environment::with_prefix("SHOPCACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
