//! Tracing setup driven by the `[logging]` config section.
//!
//! `RUST_LOG`, when set, takes precedence over `logging.level` at startup.
//! The filter sits behind a reload layer so a changed config can be applied
//! without restarting.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Install the global subscriber using `config.level` as the filter.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case later [`reload_logging`] calls have no effect.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
        tracing::debug!(level = %config.level, "tracing initialized");
    }
    installed
}

/// Swap the active filter for `config.level`.
pub fn reload_logging(config: &LoggingConfig) -> Result<(), String> {
    let handle = FILTER_HANDLE
        .get()
        .ok_or_else(|| "tracing was not initialized with init_tracing".to_string())?;
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| format!("invalid logging.level {:?}: {e}", config.level))?;
    handle
        .reload(filter)
        .map_err(|e| format!("log filter reload failed: {e}"))?;
    tracing::info!(level = %config.level, "log level changed");
    Ok(())
}

/// The active filter directives, if tracing was initialized here.
pub fn active_filter() -> Option<String> {
    FILTER_HANDLE
        .get()
        .and_then(|handle| handle.with_current(|filter| filter.to_string()).ok())
}
