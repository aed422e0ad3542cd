//! Configuration for an [`EventLog`](crate::EventLog).
//!
//! All fields have defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! default_timeout_ms = 2000
//! batch_size = 16
//! render_buffer_bytes = 4096
//! max_render_buffer_bytes = 16777216
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables for batch retrieval and rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Wait for `next` in milliseconds.
    pub default_timeout_ms: u64,

    /// Events requested per `next`.
    pub batch_size: u32,

    /// Initial render buffer size in bytes.
    pub render_buffer_bytes: usize,

    /// Render buffer growth cap in bytes.
    pub max_render_buffer_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout_ms: 2000,
            batch_size: 16,
            render_buffer_bytes: evtlog_engine::render::DEFAULT_RENDER_BUFFER_BYTES,
            max_render_buffer_bytes: evtlog_engine::render::DEFAULT_MAX_RENDER_BUFFER_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.max_render_buffer_bytes == 0 {
            return Err(Error::Config(
                "max_render_buffer_bytes must be at least 1".to_string(),
            ));
        }
        if self.render_buffer_bytes > self.max_render_buffer_bytes {
            return Err(Error::Config(format!(
                "render_buffer_bytes ({}) exceeds max_render_buffer_bytes ({})",
                self.render_buffer_bytes, self.max_render_buffer_bytes
            )));
        }
        Ok(())
    }

    /// The `next` timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
