//! Logging
//!
//! Module-tagged logging macros on top of `tracing`. Every call site names
//! the module it logs for, e.g. `log_info!("resolver", "Checking {}", url)`.
//! The active filter sits behind a reload handle so developer mode can
//! raise verbosity without restarting.

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config;

static FILTER_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

fn default_filter(debug: bool) -> EnvFilter {
    EnvFilter::new(if debug { "debug" } else { "info" })
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_env(config::logging::FILTER_ENV)
        .unwrap_or_else(|_| default_filter(false));
    let (filter_layer, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .try_init()
        .is_ok();

    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Switch between DEBUG (developer mode) and INFO
pub fn set_log_level(debug: bool) {
    match FILTER_HANDLE.get() {
        Some(handle) => {
            if let Err(e) = handle.modify(|filter| *filter = default_filter(debug)) {
                crate::log_warn!("logging", "Failed to change log level: {}", e);
            }
        }
        None => {
            crate::log_debug!("logging", "Log level change ignored, logging not initialized");
        }
    }
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $($arg:tt)+) => {
        ::tracing::debug!(module = %$module, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $($arg:tt)+) => {
        ::tracing::info!(module = %$module, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($module:expr, $($arg:tt)+) => {
        ::tracing::warn!(module = %$module, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $($arg:tt)+) => {
        ::tracing::error!(module = %$module, $($arg)+)
    };
}
