//! Read-through shop cache over a shared key-value store.
//!
//! ## Architecture
//!
//! - **Shared store** (`store`): Redis for multi-instance deployments, a
//!   local DashMap otherwise. Holds shop entries and rebuild locks.
//! - **Reader** (`reader`): cache hit → decoded shop; empty marker → not
//!   found without touching the backing store; miss → single-flight
//!   rebuild under a per-shop lock.
//! - **Invalidator** (`invalidator`): write the backing store, then delete
//!   the entry.
//!
//! ## Key layout
//!
//! ```text
//! cache:shop:{id}   JSON shop, or "" (empty marker)   TTL 30 min / 2 min
//! lock:shop:{id}    "1"                               TTL 10 s (safety net)
//! ```

pub mod codec;
pub mod invalidator;
pub mod lock;
pub mod policy;
pub mod reader;
pub mod service;
pub mod store;

pub use codec::{CachedShop, EMPTY_MARKER};
pub use invalidator::ShopCacheInvalidator;
pub use lock::RebuildLock;
pub use policy::CachePolicy;
pub use reader::{CacheStats, ShopCacheReader};
pub use service::{Outcome, SHOP_NOT_FOUND, ShopService};
pub use store::{SharedStore, StoreError};
