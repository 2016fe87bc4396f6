use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use shopcache_storage::{Shop, ShopStorage, StorageError};

/// Options for the in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Artificial delay added to every read, to emulate a slow database.
    pub read_latency: Option<Duration>,
    /// Artificial delay added to every write.
    pub write_latency: Option<Duration>,
}

/// Read/write counters for the in-memory backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of `read` calls served.
    pub reads: u64,
    /// Number of successful `update` calls.
    pub writes: u64,
    /// Number of rows currently stored.
    pub rows: usize,
}

/// In-memory shop storage.
///
/// Rows are keyed by shop id. All operations are safe to call concurrently.
#[derive(Debug, Default)]
pub struct InMemoryShopStorage {
    rows: DashMap<i64, Shop>,
    reads: AtomicU64,
    writes: AtomicU64,
    options: StorageOptions,
}

impl InMemoryShopStorage {
    /// Creates an empty storage with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Seeds a row without counting it as a write.
    ///
    /// Shops without an id are ignored.
    pub fn insert(&self, shop: Shop) {
        if let Some(id) = shop.id {
            self.rows.insert(id, shop);
        }
    }

    /// Removes a row, returning it if present.
    pub fn remove(&self, id: i64) -> Option<Shop> {
        self.rows.remove(&id).map(|(_, shop)| shop)
    }

    /// Returns the current read/write counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            reads: self.reads.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
            rows: self.rows.len(),
        }
    }
}

#[async_trait]
impl ShopStorage for InMemoryShopStorage {
    async fn read(&self, id: i64) -> Result<Option<Shop>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.options.read_latency {
            tokio::time::sleep(delay).await;
        }
        let shop = self.rows.get(&id).map(|row| row.value().clone());
        tracing::trace!(id, found = shop.is_some(), "in-memory read");
        Ok(shop)
    }

    async fn update(&self, shop: &Shop) -> Result<(), StorageError> {
        let id = shop
            .id
            .ok_or_else(|| StorageError::invalid_entity("shop id is required"))?;
        if let Some(delay) = self.options.write_latency {
            tokio::time::sleep(delay).await;
        }
        self.rows.insert(id, shop.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
