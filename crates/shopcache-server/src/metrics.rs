//! Prometheus metrics for the shop cache and session validation.
//!
//! The recording helpers are cheap no-ops until a recorder is installed, so
//! library users that never call [`init_metrics`] pay nothing.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "shopcache_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "shopcache_cache_misses_total";
    pub const CACHE_REBUILDS_TOTAL: &str = "shopcache_cache_rebuilds_total";
    pub const LOCK_CONTENTION_TOTAL: &str = "shopcache_lock_contention_total";
    pub const REBUILD_FAILURES_TOTAL: &str = "shopcache_rebuild_failures_total";
    pub const CACHE_WRITE_FAILURES_TOTAL: &str = "shopcache_cache_write_failures_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "shopcache_cache_invalidations_total";
    pub const SESSIONS_VALIDATED_TOTAL: &str = "shopcache_sessions_validated_total";
}

/// Install the Prometheus recorder.
///
/// Returns `false` if metrics were already initialized or the recorder could
/// not be installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let installed = PROMETHEUS_HANDLE.set(handle).is_ok();
            if installed {
                tracing::info!("Prometheus metrics recorder installed");
            }
            installed
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format, if a recorder is installed.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record a cache hit. `kind` is `"positive"` or `"negative"`.
pub fn record_cache_hit(kind: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "kind" => kind).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a backing-store read performed to rebuild an entry.
pub fn record_rebuild() {
    counter!(names::CACHE_REBUILDS_TOTAL).increment(1);
}

/// Record a failed attempt to take a rebuild lock.
pub fn record_lock_contention() {
    counter!(names::LOCK_CONTENTION_TOTAL).increment(1);
}

/// Record a rebuild that failed in the backing store.
pub fn record_rebuild_failure() {
    counter!(names::REBUILD_FAILURES_TOTAL).increment(1);
}

/// Record a rebuilt entry that could not be stored.
pub fn record_cache_write_failure() {
    counter!(names::CACHE_WRITE_FAILURES_TOTAL).increment(1);
}

/// Record an entry deleted after a write.
pub fn record_invalidation() {
    counter!(names::CACHE_INVALIDATIONS_TOTAL).increment(1);
}

/// Record a session validation. `result` is `"valid"` or `"anonymous"`.
pub fn record_session(result: &'static str) {
    counter!(names::SESSIONS_VALIDATED_TOTAL, "result" => result).increment(1);
}
