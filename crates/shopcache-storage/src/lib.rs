//! # shopcache-storage
//!
//! Backing store abstraction for the shopcache read-through cache.
//!
//! The backing store is the single source of truth for shops. It is slow
//! relative to the shared cache, so the cache layer in `shopcache-server`
//! guards it against penetration (repeated lookups of missing ids) and
//! breakdown (many concurrent rebuilds of one hot id).
//!
//! This crate only defines the contract. Implementations live in separate
//! crates such as `shopcache-db-memory`.
//!
//! ## Example
//!
//! ```ignore
//! use shopcache_storage::{ShopStorage, StorageError, Shop};
//!
//! async fn shop_name(storage: &dyn ShopStorage, id: i64) -> Result<Option<String>, StorageError> {
//!     Ok(storage.read(id).await?.map(|shop| shop.name))
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::ShopStorage;
pub use types::Shop;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynShopStorage = std::sync::Arc<dyn ShopStorage>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::ShopStorage;
    pub use crate::types::Shop;
    pub use crate::{DynShopStorage, StorageResult};
}
