//! Per-shop rebuild lock held in the shared store.
//!
//! The lock is advisory: it only keeps concurrent callers from rebuilding
//! the same entry twice. It is created with `SET NX EX`, never extended,
//! and deleted by the caller that created it.

use std::time::Duration;

use super::policy::LOCK_MARKER;
use super::store::{SharedStore, StoreError};

/// A held rebuild lock.
///
/// Call [`RebuildLock::release`] on every exit path. If the guard is dropped
/// without it (the owning future was cancelled or panicked), the key is
/// deleted from a spawned task; failing that, it expires after its TTL.
#[must_use = "a rebuild lock must be released"]
pub struct RebuildLock {
    store: SharedStore,
    key: String,
    released: bool,
}

impl RebuildLock {
    /// Try to take the lock. Returns `None` if another caller holds it.
    pub async fn try_acquire(
        store: &SharedStore,
        key: String,
        ttl: Duration,
    ) -> Result<Option<Self>, StoreError> {
        if store.set_if_absent(&key, LOCK_MARKER, ttl).await? {
            tracing::debug!(key = %key, "rebuild lock acquired");
            Ok(Some(Self {
                store: store.clone(),
                key,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Delete the lock key. A failed delete is logged; the TTL reclaims the key.
    pub async fn release(mut self) {
        self.released = true;
        match self.store.delete(&self.key).await {
            Ok(_) => tracing::debug!(key = %self.key, "rebuild lock released"),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to release rebuild lock")
            }
        }
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = store.delete(&key).await {
                        tracing::warn!(key = %key, error = %e, "failed to release abandoned rebuild lock");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(key = %key, "rebuild lock dropped outside a runtime, leaving it to expire");
            }
        }
    }
}
