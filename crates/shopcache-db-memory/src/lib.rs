//! In-memory backing store for shopcache.
//!
//! This crate provides an in-memory implementation of the `ShopStorage`
//! trait from `shopcache-storage`, backed by a `DashMap`. It counts reads
//! and writes so callers can observe how often the cache layer actually
//! reaches the backing store, and it can simulate a slow database.
//!
//! # Example
//!
//! ```ignore
//! use shopcache_db_memory::InMemoryShopStorage;
//! use shopcache_storage::{Shop, ShopStorage};
//!
//! let storage = InMemoryShopStorage::new();
//! storage.insert(Shop::new(7, "X"));
//! assert_eq!(storage.read(7).await?.unwrap().name, "X");
//! assert_eq!(storage.stats().reads, 1);
//! ```

pub mod storage;

pub use shopcache_storage::{Shop, ShopStorage, StorageError};
pub use storage::{InMemoryShopStorage, StorageOptions, StorageStats};

