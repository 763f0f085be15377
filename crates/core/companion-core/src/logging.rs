//! Tracing subscriber setup
//!
//! The engine itself only emits `tracing` events; binaries and tests decide
//! where they go.

use crate::config::get_env_or;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the fallback filter when `RUST_LOG` is unset
pub const LOG_LEVEL_ENV: &str = "COMPANION_LOG_LEVEL";

fn env_filter(default_filter: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| get_env_or(LOG_LEVEL_ENV, default_filter).into())
}

/// Initialize the global logging system
///
/// Panics if a global subscriber is already installed; use
/// [`try_init_tracing`] where that can happen.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install the subscriber unless one is already set
///
/// Returns `true` when this call installed it.
pub fn try_init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}
