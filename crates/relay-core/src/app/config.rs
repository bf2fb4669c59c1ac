//! Configuration for the enforcer and the CLI wiring.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pending entries at which new requests are rejected.
pub const MAX_QUEUE_DEPTH: usize = 50;

/// Pending entries at which a flush starts immediately.
pub const FLUSH_THRESHOLD: usize = 3;

/// Length of the coalescence window, measured from the request that opened it.
pub const COALESCENCE_WINDOW_MS: u64 = 10;

pub const DEFAULT_COMPONENT_NAME: &str = "BatchEnforcer";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    pub max_queue_depth: usize,
    pub flush_threshold: usize,
    pub coalescence_window_ms: u64,
    /// Used in backpressure messages and logs.
    pub component_name: String,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: MAX_QUEUE_DEPTH,
            flush_threshold: FLUSH_THRESHOLD,
            coalescence_window_ms: COALESCENCE_WINDOW_MS,
            component_name: DEFAULT_COMPONENT_NAME.to_string(),
        }
    }
}

impl EnforcerConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.coalescence_window_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_depth == 0 {
            return Err(ConfigError::Invalid("max_queue_depth must be > 0".to_string()));
        }
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be > 0".to_string()));
        }
        if self.component_name.trim().is_empty() {
            return Err(ConfigError::Invalid("component_name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Top-level config read by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Initial value of the coalescing flag.
    pub coalescing_enabled: bool,
    pub enforcer: EnforcerConfig,
    /// Capacity of the audit channel; events beyond it are dropped.
    pub audit_channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            coalescing_enabled: true,
            enforcer: EnforcerConfig::default(),
            audit_channel_capacity: 256,
        }
    }
}

impl RelayConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.enforcer.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
