//! Write path: update the backing store, then drop the cache entry.

use shopcache_storage::{DynShopStorage, Shop};
use tracing::instrument;

use super::policy::CachePolicy;
use super::store::SharedStore;
use crate::error::CacheError;
use crate::metrics;

/// Writes shops through to the backing store and invalidates their entries.
pub struct ShopCacheInvalidator {
    store: SharedStore,
    storage: DynShopStorage,
    policy: CachePolicy,
}

impl ShopCacheInvalidator {
    pub fn new(store: SharedStore, storage: DynShopStorage, policy: CachePolicy) -> Self {
        Self {
            store,
            storage,
            policy,
        }
    }

    /// Update a shop.
    ///
    /// The entry is deleted only after the backing-store write succeeds, so a
    /// rebuild that runs afterwards reads the new row. If the write fails the
    /// cache is left untouched.
    #[instrument(skip(self, shop), fields(id = ?shop.id))]
    pub async fn update(&self, shop: &Shop) -> Result<(), CacheError> {
        let id = shop
            .id
            .ok_or_else(|| CacheError::InvalidInput("shop id must not be empty".into()))?;

        self.storage.update(shop).await?;

        let key = self.policy.shop_key(id);
        self.store.delete(&key).await?;
        metrics::record_invalidation();
        tracing::debug!(key = %key, "cache entry invalidated after update");
        Ok(())
    }

    /// Drop the entry for a shop without writing anything.
    pub async fn invalidate(&self, id: i64) -> Result<bool, CacheError> {
        let removed = self.store.delete(&self.policy.shop_key(id)).await?;
        if removed {
            metrics::record_invalidation();
        }
        Ok(removed)
    }
}
