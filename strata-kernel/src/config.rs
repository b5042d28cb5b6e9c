//! Kernel configuration.

use crate::{error::ConfigError, router::RouterOptions};
use serde::Deserialize;

/// Settings for a [`Kernel`](crate::Kernel).
///
/// Deserializable, so it can be read from a configuration file:
///
/// ```rust,ignore
/// let config = KernelConfig::from_json_str(r#"{ "router": { "case_sensitive": false } }"#)?;
/// let kernel = Kernel::with_config(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Options for the default router.
    pub router: RouterOptions,
    /// Log a debug event whenever a lifecycle phase is emitted.
    pub log_phases: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            router: RouterOptions::default(),
            log_phases: true,
        }
    }
}

impl KernelConfig {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the router options.
    pub fn router(mut self, router: RouterOptions) -> Self {
        self.router = router;
        self
    }

    /// Enable or disable per-phase debug logging.
    pub fn log_phases(mut self, enabled: bool) -> Self {
        self.log_phases = enabled;
        self
    }

    /// Check the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.max_param_length == 0 {
            return Err(ConfigError::ZeroParamLength);
        }
        Ok(())
    }
}
