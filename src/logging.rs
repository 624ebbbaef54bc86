//! Tracing subscriber setup for the command-line tool.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the application.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Filter built from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install a global fmt subscriber writing to stderr.
///
/// Does nothing if a global subscriber is already set.
pub fn init(config: &LogConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
