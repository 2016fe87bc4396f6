//! Caller-facing shop operations with tagged outcomes.

use std::sync::Arc;

use serde::Serialize;
use shopcache_storage::{DynShopStorage, Shop};

use super::invalidator::ShopCacheInvalidator;
use super::policy::CachePolicy;
use super::reader::{CacheStats, ShopCacheReader};
use super::store::SharedStore;
use crate::config::{CacheConfig, ReadStrategy};
use crate::error::CacheError;

/// Message returned when a shop does not exist.
pub const SHOP_NOT_FOUND: &str = "shop not found";

/// Result of a caller-facing operation.
///
/// "Not found" and "failed" are separate variants so callers never have to
/// guess what an empty answer means.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok { data: T },
    NotFound { message: String },
    Error { message: String, retryable: bool },
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok { .. })
    }

    /// The value of an `Ok` outcome.
    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Ok { data } => Some(data),
            _ => None,
        }
    }
}

impl<T> From<CacheError> for Outcome<T> {
    fn from(error: CacheError) -> Self {
        Outcome::Error {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Shop lookups and updates over a shared store and a backing store.
pub struct ShopService {
    reader: ShopCacheReader,
    invalidator: ShopCacheInvalidator,
    strategy: ReadStrategy,
}

impl ShopService {
    pub fn new(
        store: SharedStore,
        storage: DynShopStorage,
        policy: CachePolicy,
        strategy: ReadStrategy,
    ) -> Self {
        Self {
            reader: ShopCacheReader::new(store.clone(), storage.clone(), policy.clone()),
            invalidator: ShopCacheInvalidator::new(store, storage, policy),
            strategy,
        }
    }

    /// Build a service from the `[cache]` configuration section.
    pub fn from_config(store: SharedStore, storage: DynShopStorage, cfg: &CacheConfig) -> Arc<Self> {
        Arc::new(Self::new(store, storage, CachePolicy::from(cfg), cfg.strategy))
    }

    /// Look up a shop using the configured read strategy.
    pub async fn query_by_id(&self, id: i64) -> Outcome<Shop> {
        let result = match self.strategy {
            ReadStrategy::Mutex => self.reader.lookup(id).await,
            ReadStrategy::PassThrough => self.reader.lookup_pass_through(id).await,
        };
        match result {
            Ok(Some(shop)) => Outcome::Ok { data: shop },
            Ok(None) => Outcome::NotFound {
                message: SHOP_NOT_FOUND.to_string(),
            },
            Err(e) => {
                tracing::warn!(id, error = %e, category = %e.category(), "shop lookup failed");
                e.into()
            }
        }
    }

    /// Update a shop and invalidate its cache entry.
    pub async fn update(&self, shop: &Shop) -> Outcome<()> {
        match self.invalidator.update(shop).await {
            Ok(()) => Outcome::Ok { data: () },
            Err(e) => {
                tracing::warn!(id = ?shop.id, error = %e, category = %e.category(), "shop update failed");
                e.into()
            }
        }
    }

    pub fn reader(&self) -> &ShopCacheReader {
        &self.reader
    }

    pub fn invalidator(&self) -> &ShopCacheInvalidator {
        &self.invalidator
    }

    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    pub fn stats(&self) -> CacheStats {
        self.reader.stats()
    }
}
