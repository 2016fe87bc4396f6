//! The backing store contract.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::Shop;

/// The trait every shop backing store must implement.
///
/// Implementations must be thread-safe (`Send + Sync`); the cache layer
/// shares one instance across all request tasks.
#[async_trait]
pub trait ShopStorage: Send + Sync {
    /// Reads a shop by id.
    ///
    /// Returns `None` if the shop does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing shops.
    async fn read(&self, id: i64) -> Result<Option<Shop>, StorageError>;

    /// Writes a shop, replacing the stored row with the same id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidEntity` if the shop has no id.
    async fn update(&self, shop: &Shop) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
