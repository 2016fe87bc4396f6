//! Error types for shop cache reads and writes.

use std::fmt;

use shopcache_storage::StorageError;

use crate::cache::store::StoreError;

/// Errors surfaced by the cache reader and invalidator.
///
/// A shop that does not exist is never an error: readers return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The shared store could not be reached or rejected a command.
    #[error("shared store error: {0}")]
    Store(#[from] StoreError),

    /// The backing store failed while rebuilding or writing an entry.
    #[error("backing store unavailable: {0}")]
    BackingStore(#[from] StorageError),

    /// Other callers held the rebuild lock for the whole wait budget.
    #[error("gave up waiting for rebuild lock {key} after {attempts} attempts")]
    LockContention { key: String, attempts: u32 },

    /// The request was rejected before touching any store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A shop could not be encoded for the cache.
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    /// Returns `true` if the caller may retry the same request later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(_) | Self::LockContention { .. } => true,
            Self::BackingStore(e) => e.is_transient(),
            Self::InvalidInput(_) | Self::Codec(_) => false,
        }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(_) => ErrorCategory::SharedStore,
            Self::BackingStore(_) => ErrorCategory::BackingStore,
            Self::LockContention { .. } => ErrorCategory::Contention,
            Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::Codec(_) => ErrorCategory::Internal,
        }
    }
}

/// Categories of cache errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    SharedStore,
    BackingStore,
    Contention,
    Validation,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedStore => write!(f, "shared_store"),
            Self::BackingStore => write!(f, "backing_store"),
            Self::Contention => write!(f, "contention"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
