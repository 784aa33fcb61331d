//! Static configuration consumed by the bridge.
//!
//! The configuration is an immutable value built once and passed into the
//! bridge at construction. It can be loaded from a TOML document:
//!
//! ```toml
//! admin_ui = "http://admin.grasshopper.local"
//! tenant_ui = "http://2014.cam.grasshopper.local"
//! wait_timeout_ms = 30000
//! poll_interval_ms = 100
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_ADMIN_UI: &str = "http://admin.grasshopper.local";
pub const DEFAULT_TENANT_UI: &str = "http://2014.cam.grasshopper.local";
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    admin_ui: String,
    tenant_ui: String,
    wait_timeout_ms: u64,
    poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            admin_ui: DEFAULT_ADMIN_UI.to_string(),
            tenant_ui: DEFAULT_TENANT_UI.to_string(),
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl BridgeConfig {
    /// Build a validated configuration from explicit values.
    pub fn new(
        admin_ui: impl Into<String>,
        tenant_ui: impl Into<String>,
        wait_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            admin_ui: admin_ui.into(),
            tenant_ui: tenant_ui.into(),
            wait_timeout_ms: duration_ms(wait_timeout),
            poll_interval_ms: duration_ms(poll_interval),
        };
        config.validate()?;
        Ok(config)
    }

    /// Default endpoints with a different wait timeout and poll interval.
    pub fn with_timing(wait_timeout: Duration, poll_interval: Duration) -> Result<Self, ConfigError> {
        Self::new(DEFAULT_ADMIN_UI, DEFAULT_TENANT_UI, wait_timeout, poll_interval)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!(
            target: "settle_bridge::config",
            "Loaded bridge configuration from {}",
            path.display()
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_timeout_ms == 0 {
            return Err(ConfigError::invalid("wait_timeout_ms must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms must be greater than zero"));
        }
        if self.poll_interval_ms > self.wait_timeout_ms {
            return Err(ConfigError::invalid(format!(
                "poll_interval_ms ({}) exceeds wait_timeout_ms ({})",
                self.poll_interval_ms, self.wait_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn admin_ui(&self) -> &str {
        &self.admin_ui
    }

    pub fn tenant_ui(&self) -> &str {
        &self.tenant_ui
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
