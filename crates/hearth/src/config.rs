//! # Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [event_pool]
//! max_pool_size = 100
//! cleanup_interval_secs = 300
//! eviction_multiplier = 2
//!
//! [event_queue]
//! capacity = 10000
//! idle_wait_ms = 10
//! batch_size = 64
//! ```

use std::path::Path;

use hearth_events::{EventPoolConfig, EventQueueConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Runtime configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    /// Event pool sizing and idle eviction.
    pub event_pool: EventPoolConfig,
    /// Prioritized queue bounds and dispatcher pacing.
    pub event_queue: EventQueueConfig,
}

impl HearthConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(target: "hearth::config", path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Rejects values that would disable a subsystem by accident.
    pub fn validate(&self) -> ConfigResult<()> {
        let pool = &self.event_pool;
        if pool.max_pool_size == 0 {
            return Err(ConfigError::Invalid("event_pool.max_pool_size must be > 0".into()));
        }
        if pool.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "event_pool.cleanup_interval_secs must be > 0".into(),
            ));
        }
        if pool.eviction_multiplier == 0 {
            return Err(ConfigError::Invalid(
                "event_pool.eviction_multiplier must be > 0".into(),
            ));
        }
        if self.event_queue.batch_size == 0 {
            return Err(ConfigError::Invalid("event_queue.batch_size must be > 0".into()));
        }
        Ok(())
    }
}
