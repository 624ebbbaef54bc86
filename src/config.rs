//! Engine configuration using Figment.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. a TOML file (`rust_mda.toml` by default; a missing file is skipped)
//! 3. environment variables prefixed with `RUST_MDA_`, with `__` separating
//!    nested keys
//!
//! ```text
//! RUST_MDA_WINDOW_SIZE=500
//! RUST_MDA_LOG__LEVEL=debug
//! RUST_MDA_LOG__JSON=true
//! ```
//!
//! ```toml
//! window_size = 1000
//!
//! [log]
//! level = "info"
//! json = false
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequence::{IterOptions, DEFAULT_WINDOW_SIZE};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "rust_mda.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "RUST_MDA_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[allow(missing_docs)]
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[allow(missing_docs)]
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Indices an unbounded axis visits per enumeration window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level (trace, debug, info, warn, error); `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl EngineConfig {
    /// Load from [`DEFAULT_CONFIG_FILE`] and the environment.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if a source cannot be parsed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path and the environment.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if a source cannot be parsed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path.as_ref())
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        tracing::debug!(?config, "loaded engine configuration");
        Ok(config)
    }

    /// The layered sources, without extracting them.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - window size is at least 1
    /// - log level is one of trace, debug, info, warn, error
    ///
    /// # Errors
    ///
    /// Returns a ConfigError with a descriptive message for any validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ValidationError(
                "window_size must be at least 1".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Enumeration options derived from this configuration.
    pub fn iter_options(&self) -> IterOptions {
        IterOptions::default().with_window_size(self.window_size)
    }
}

impl From<&EngineConfig> for IterOptions {
    fn from(config: &EngineConfig) -> Self {
        config.iter_options()
    }
}
