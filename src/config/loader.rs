//! Configuration loader with environment variable expansion

use super::{expand_env_vars, BridgeConfig, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BridgeConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<BridgeConfig, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: BridgeConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}
