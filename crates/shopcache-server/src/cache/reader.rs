//! Read-through shop lookups.
//!
//! ## Lookup protocol (mutex strategy)
//!
//! ```text
//! GET cache:shop:{id} ── shop ─────────────────────────────▶ Some(shop)
//!        │ ── empty marker ───────────────────────────────▶ None
//!        │ miss
//!        ▼
//! SET lock:shop:{id} NX EX ── taken by someone else ── sleep, retry from GET
//!        │ acquired                                        (bounded by deadline
//!        ▼                                                  and attempt count)
//! GET cache:shop:{id} again ── answered ── release ──────▶ shop / None
//!        │ still a miss
//!        ▼
//! backing store read ── row ──── SET shop EX shop_ttl ─┐
//!                    └─ no row ─ SET "" EX null_ttl ───┼─ release ─▶ result
//!                    └─ error ───────────────────────── ┴─ release ─▶ Err
//! ```
//!
//! A failed `SET` after a successful backing read is logged and the row is
//! still returned.
//!
//! The lock lives in the shared store, so callers in different processes
//! pointed at the same Redis rebuild a given shop at most once at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use shopcache_storage::{DynShopStorage, Shop, StorageError};
use tracing::instrument;

use super::codec::{self, CachedShop, EMPTY_MARKER};
use super::lock::RebuildLock;
use super::policy::CachePolicy;
use super::store::SharedStore;
use crate::error::CacheError;
use crate::metrics;

/// Reader statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered with a cached shop, including after waiting on the lock.
    pub hits: u64,
    /// Reads answered with a cached empty marker.
    pub negative_hits: u64,
    /// Lookups that found no entry on their first read.
    pub misses: u64,
    /// Backing-store reads issued.
    pub rebuilds: u64,
    /// Failed lock attempts.
    pub lock_contentions: u64,
    /// Backing-store reads that failed.
    pub rebuild_failures: u64,
    /// Rebuilt entries that could not be written to the shared store.
    pub write_failures: u64,
}

impl CacheStats {
    /// Percentage of cache answers among answers and first-read misses.
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.negative_hits;
        let total = answered + self.misses;
        if total == 0 {
            0.0
        } else {
            (answered as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    negative_hits: AtomicU64,
    misses: AtomicU64,
    rebuilds: AtomicU64,
    lock_contentions: AtomicU64,
    rebuild_failures: AtomicU64,
    write_failures: AtomicU64,
}

/// What a cache probe produced.
enum Probe {
    Answered(Option<Shop>),
    Miss,
}

/// Read-through reader for shops.
pub struct ShopCacheReader {
    store: SharedStore,
    storage: DynShopStorage,
    policy: CachePolicy,
    counters: Counters,
}

impl ShopCacheReader {
    pub fn new(store: SharedStore, storage: DynShopStorage, policy: CachePolicy) -> Self {
        Self {
            store,
            storage,
            policy,
            counters: Counters::default(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Look up a shop, rebuilding a missing entry under the per-shop lock.
    ///
    /// Returns `Ok(None)` if the shop does not exist. Fails with
    /// [`CacheError::LockContention`] if other callers keep the lock for
    /// longer than the configured wait budget.
    #[instrument(skip(self))]
    pub async fn lookup(&self, id: i64) -> Result<Option<Shop>, CacheError> {
        let key = self.policy.shop_key(id);
        let lock_key = self.policy.lock_key(id);
        let deadline = Instant::now() + self.policy.lock_wait;
        let mut attempts = 0u32;

        loop {
            match self.probe(&key).await? {
                Probe::Answered(result) => {
                    self.record_answer(&result);
                    return Ok(result);
                }
                Probe::Miss if attempts == 0 => self.record_miss(&key),
                Probe::Miss => {}
            }

            attempts += 1;
            if let Some(lock) =
                RebuildLock::try_acquire(&self.store, lock_key.clone(), self.policy.lock_ttl)
                    .await?
            {
                let result = self.rebuild_locked(id, &key).await;
                lock.release().await;
                return result;
            }

            self.counters
                .lock_contentions
                .fetch_add(1, Ordering::Relaxed);
            metrics::record_lock_contention();

            if attempts >= self.policy.max_lock_attempts
                || Instant::now() + self.policy.retry_delay > deadline
            {
                tracing::warn!(key = %lock_key, attempts, "rebuild lock wait budget exhausted");
                return Err(CacheError::LockContention {
                    key: lock_key,
                    attempts,
                });
            }
            tracing::debug!(key = %lock_key, attempts, "rebuild lock busy, retrying");
            tokio::time::sleep(self.policy.retry_delay).await;
        }
    }

    /// Look up a shop with negative caching only.
    ///
    /// Concurrent misses for the same shop all read the backing store; use
    /// [`lookup`](Self::lookup) for hot keys.
    #[instrument(skip(self))]
    pub async fn lookup_pass_through(&self, id: i64) -> Result<Option<Shop>, CacheError> {
        let key = self.policy.shop_key(id);
        match self.probe(&key).await? {
            Probe::Answered(result) => {
                self.record_answer(&result);
                Ok(result)
            }
            Probe::Miss => {
                self.record_miss(&key);
                self.load_and_populate(id, &key).await
            }
        }
    }

    /// Snapshot of the reader counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            negative_hits: self.counters.negative_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            rebuilds: self.counters.rebuilds.load(Ordering::Relaxed),
            lock_contentions: self.counters.lock_contentions.load(Ordering::Relaxed),
            rebuild_failures: self.counters.rebuild_failures.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    /// Runs with the rebuild lock held. Every return path goes back to
    /// `lookup`, which releases the lock.
    async fn rebuild_locked(&self, id: i64, key: &str) -> Result<Option<Shop>, CacheError> {
        // Re-read from the store: another holder may have finished between
        // our first read and taking the lock.
        if let Probe::Answered(result) = self.probe(key).await? {
            tracing::debug!(key = %key, "entry rebuilt by another caller");
            self.record_answer(&result);
            return Ok(result);
        }
        self.load_and_populate(id, key).await
    }

    async fn load_and_populate(&self, id: i64, key: &str) -> Result<Option<Shop>, CacheError> {
        self.counters.rebuilds.fetch_add(1, Ordering::Relaxed);
        metrics::record_rebuild();

        let read = tokio::time::timeout(self.policy.rebuild_timeout, self.storage.read(id)).await;
        let shop = match read {
            Ok(Ok(shop)) => shop,
            Ok(Err(e)) => return Err(self.rebuild_failed(key, e)),
            Err(_) => {
                let elapsed_ms = self.policy.rebuild_timeout.as_millis() as u64;
                return Err(self.rebuild_failed(key, StorageError::timeout(elapsed_ms)));
            }
        };

        // The row is already in hand: a failed cache write costs a future
        // rebuild, not this answer.
        let written = match &shop {
            Some(found) => {
                let encoded = codec::encode(found)?;
                self.store.set_ex(key, &encoded, self.policy.shop_ttl).await
            }
            None => self.store.set_ex(key, EMPTY_MARKER, self.policy.null_ttl).await,
        };
        match written {
            Ok(()) => tracing::debug!(
                key = %key,
                found = shop.is_some(),
                backend = self.storage.backend_name(),
                "entry rebuilt"
            ),
            Err(e) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_write_failure();
                tracing::warn!(key = %key, error = %e, "failed to write rebuilt entry, answering uncached");
            }
        }
        Ok(shop)
    }

    fn rebuild_failed(&self, key: &str, error: StorageError) -> CacheError {
        self.counters
            .rebuild_failures
            .fetch_add(1, Ordering::Relaxed);
        metrics::record_rebuild_failure();
        tracing::warn!(key = %key, error = %error, "backing store read failed during rebuild");
        CacheError::BackingStore(error)
    }

    /// Read the entry fresh from the store. Undecodable entries are deleted
    /// and reported as a miss so the next step rebuilds them.
    async fn probe(&self, key: &str) -> Result<Probe, CacheError> {
        let raw = self.store.get(key).await?;
        Ok(match codec::classify(raw) {
            CachedShop::Hit(shop) => Probe::Answered(Some(shop)),
            CachedShop::Empty => Probe::Answered(None),
            CachedShop::Miss => Probe::Miss,
            CachedShop::Corrupt(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to decode cached shop, dropping entry");
                self.store.delete(key).await?;
                Probe::Miss
            }
        })
    }

    fn record_answer(&self, result: &Option<Shop>) {
        if result.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit("positive");
        } else {
            self.counters.negative_hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_hit("negative");
        }
    }

    fn record_miss(&self, key: &str) {
        tracing::debug!(key = %key, "cache miss");
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss();
    }
}
