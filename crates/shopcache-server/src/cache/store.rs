//! Shared key-value store backends: local (DashMap) and Redis.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use deadpool_redis::Pool;
use redis::AsyncCommands;

/// Errors raised by the shared store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be taken from the pool.
    #[error("failed to get Redis connection: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The command reached Redis but failed.
    #[error("Redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// A string operation hit a hash key or the other way round.
    #[error("key {key} holds a value of the wrong type")]
    WrongType { key: String },
}

#[derive(Clone, Debug)]
enum LocalValue {
    Text(String),
    Hash(HashMap<String, String>),
}

/// A value held by the local backend, with optional expiry.
#[derive(Clone, Debug)]
pub struct LocalEntry {
    value: LocalValue,
    expires_at: Option<Instant>,
}

impl LocalEntry {
    fn text(value: &str, ttl: Duration) -> Self {
        Self {
            value: LocalValue::Text(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Shared key-value store used for cache entries, rebuild locks and sessions.
///
/// ## Modes
///
/// - **Local**: single-instance mode backed by a `DashMap`. Expired keys
///   behave exactly like absent keys. Locks only coordinate tasks of this
///   process.
/// - **Redis**: multi-instance mode. Every server process talking to the
///   same Redis shares cache entries and rebuild locks.
///
/// Unlike a fire-and-forget cache, every write here is awaited: the reader
/// relies on "write entry, then release lock" and the invalidator on
/// "write row, then delete entry" being observed in that order.
#[derive(Clone)]
pub enum SharedStore {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, LocalEntry>>),

    /// Multi-instance: Redis
    Redis(Pool),
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedStore").field(&self.mode()).finish()
    }
}

/// Redis expiry granularity is whole seconds; never round a TTL down to zero.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Runs `f` on the live value at `key`, removing it first if it has expired.
fn with_live<R>(
    map: &DashMap<String, LocalEntry>,
    key: &str,
    f: impl FnOnce(&LocalValue) -> R,
) -> Option<R> {
    let now = Instant::now();
    if let Some(entry) = map.get(key) {
        if !entry.is_expired(now) {
            return Some(f(&entry.value));
        }
    }
    map.remove_if(key, |_, entry| entry.is_expired(now));
    None
}

impl SharedStore {
    /// Create a new local-only store.
    pub fn new_local() -> Self {
        SharedStore::Local(Arc::new(DashMap::new()))
    }

    /// Create a new Redis-backed store.
    pub fn new_redis(pool: Pool) -> Self {
        SharedStore::Redis(pool)
    }

    /// `"local"` or `"redis"`.
    pub fn mode(&self) -> &'static str {
        match self {
            SharedStore::Local(_) => "local",
            SharedStore::Redis(_) => "redis",
        }
    }

    /// `GET key`. Returns `None` for absent or expired keys.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            SharedStore::Local(map) => match with_live(map, key, |value| match value {
                LocalValue::Text(text) => Some(text.clone()),
                LocalValue::Hash(_) => None,
            }) {
                None => Ok(None),
                Some(Some(text)) => Ok(Some(text)),
                Some(None) => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            },
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                let value: Option<String> = conn.get(key).await?;
                Ok(value)
            }
        }
    }

    /// `SET key value EX ttl`.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        match self {
            SharedStore::Local(map) => {
                map.insert(key.to_string(), LocalEntry::text(value, ttl));
            }
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
            }
        }
        tracing::trace!(key = %key, ttl_ms = ttl.as_millis() as u64, "store set");
        Ok(())
    }

    /// `SET key value NX EX ttl`: atomically set the key only if it is absent.
    ///
    /// Returns `true` if this call created the key.
    pub async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        match self {
            SharedStore::Local(map) => {
                let now = Instant::now();
                match map.entry(key.to_string()) {
                    Entry::Occupied(mut occupied) => {
                        if occupied.get().is_expired(now) {
                            occupied.insert(LocalEntry::text(value, ttl));
                            Ok(true)
                        } else {
                            Ok(false)
                        }
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(LocalEntry::text(value, ttl));
                        Ok(true)
                    }
                }
            }
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                let reply: Option<String> = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs(ttl))
                    .query_async(&mut conn)
                    .await?;
                Ok(reply.is_some())
            }
        }
    }

    /// `DEL key`. Returns `true` if a live key was removed.
    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            SharedStore::Local(map) => {
                let now = Instant::now();
                Ok(map
                    .remove(key)
                    .is_some_and(|(_, entry)| !entry.is_expired(now)))
            }
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                let removed: i64 = conn.del(key).await?;
                Ok(removed > 0)
            }
        }
    }

    /// `HGETALL key`. Absent keys yield an empty map.
    pub async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self {
            SharedStore::Local(map) => match with_live(map, key, |value| match value {
                LocalValue::Hash(fields) => Some(fields.clone()),
                LocalValue::Text(_) => None,
            }) {
                None => Ok(HashMap::new()),
                Some(Some(fields)) => Ok(fields),
                Some(None) => Err(StoreError::WrongType {
                    key: key.to_string(),
                }),
            },
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                let fields: HashMap<String, String> = conn.hgetall(key).await?;
                Ok(fields)
            }
        }
    }

    /// `HSET key field value [field value ...]`. Keeps any existing expiry.
    pub async fn hash_set_all(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        match self {
            SharedStore::Local(map) => {
                let now = Instant::now();
                let mut entry = map.entry(key.to_string()).or_insert_with(|| LocalEntry {
                    value: LocalValue::Hash(HashMap::new()),
                    expires_at: None,
                });
                if entry.is_expired(now) {
                    *entry = LocalEntry {
                        value: LocalValue::Hash(HashMap::new()),
                        expires_at: None,
                    };
                }
                match &mut entry.value {
                    LocalValue::Hash(existing) => {
                        existing.extend(fields.iter().cloned());
                        Ok(())
                    }
                    LocalValue::Text(_) => Err(StoreError::WrongType {
                        key: key.to_string(),
                    }),
                }
            }
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                conn.hset_multiple::<_, _, _, ()>(key, fields).await?;
                Ok(())
            }
        }
    }

    /// `EXPIRE key ttl`. Returns `false` if the key does not exist.
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        match self {
            SharedStore::Local(map) => {
                let now = Instant::now();
                match map.get_mut(key) {
                    Some(mut entry) if !entry.is_expired(now) => {
                        entry.expires_at = Some(now + ttl);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
            SharedStore::Redis(pool) => {
                let mut conn = pool.get().await?;
                let updated: bool = conn.expire(key, ttl_secs(ttl) as i64).await?;
                Ok(updated)
            }
        }
    }

    /// Remove expired entries from the local map. Redis expires keys itself.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        match self {
            SharedStore::Local(map) => {
                let now = Instant::now();
                let before = map.len();
                map.retain(|_, entry| !entry.is_expired(now));
                before.saturating_sub(map.len())
            }
            SharedStore::Redis(_) => 0,
        }
    }

    /// Number of entries in the local map, including not-yet-swept expired ones.
    pub fn entry_count(&self) -> Option<usize> {
        match self {
            SharedStore::Local(map) => Some(map.len()),
            SharedStore::Redis(_) => None,
        }
    }

    /// Check if Redis is available (for health checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            SharedStore::Local(_) => false,
            SharedStore::Redis(pool) => pool.get().await.is_ok(),
        }
    }
}
