//! Configuration module for the bridge
//!
//! Handles loading and parsing of YAML bridge configuration with support for
//! environment variable expansion and validation. A [`BridgeConfig`] is
//! immutable once a bridge has been built from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::options::{keys, Acl, OptionMap};

mod loader;

pub use loader::ConfigLoader;

/// `${NAME}` or `${NAME:-fallback}`; names are upper snake case
const PLACEHOLDER: &str = r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}";

/// Substitute environment placeholders in raw config text
///
/// An unset variable takes its `:-` fallback when one is given, and otherwise
/// the placeholder stays in the output verbatim.
pub(crate) fn expand_env_vars(text: &str) -> String {
    let Ok(placeholder) = regex_lite::Regex::new(PLACEHOLDER) else {
        return text.to_string();
    };

    placeholder
        .replace_all(text, |caps: &regex_lite::Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            std::env::var(name)
                .ok()
                .or_else(|| caps.get(2).map(|fallback| fallback.as_str().to_string()))
                .unwrap_or_else(|| caps.get(0).map_or("", |m| m.as_str()).to_string())
        })
        .into_owned()
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("No adapter registered for provider '{0}'")]
    UnregisteredProvider(Provider),
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Amazon S3 (or any S3-compatible endpoint via `endpoint`)
    #[serde(rename = "s3", alias = "SimpleStorageService")]
    SimpleStorageService,
    /// Wasabi hot cloud storage
    #[serde(rename = "wasabi", alias = "WasabiCloudStorage")]
    WasabiCloudStorage,
    /// Process-local store, for development and tests
    #[serde(rename = "memory")]
    Memory,
}

impl Provider {
    /// Stable lowercase name, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::SimpleStorageService => "s3",
            Provider::WasabiCloudStorage => "wasabi",
            Provider::Memory => "memory",
        }
    }

    /// Whether the provider talks to a remote service with credentials
    pub fn is_remote(&self) -> bool {
        !matches!(self, Provider::Memory)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge configuration
///
/// # Example
///
/// ```yaml
/// provider: s3
/// default_bucket: "${AWS_BUCKET_NAME}"
/// default_timeout: 10
/// public_read: true
/// access_key: "${AWS_ACCESS_KEY}"
/// secret_key: "${AWS_SECRET_KEY}"
/// region: ap-northeast-1
/// debug: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub provider: Provider,
    pub default_bucket: String,
    /// Per-upload timeout in seconds
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,
    #[serde(default)]
    pub public_read: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub region: String,
    /// Endpoint override for S3-compatible services (MinIO, RustFS, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Maximum in-flight uploads per batch. Unbounded when absent.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn default_timeout() -> u64 {
    10
}

impl BridgeConfig {
    /// Minimal configuration for a provider and bucket; everything else defaulted
    pub fn new(provider: Provider, default_bucket: impl Into<String>) -> Self {
        Self {
            provider,
            default_bucket: default_bucket.into(),
            default_timeout: default_timeout(),
            public_read: false,
            access_key: None,
            secret_key: None,
            region: String::new(),
            endpoint: None,
            debug: false,
            max_concurrency: None,
        }
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.default_timeout = seconds;
        self
    }

    pub fn with_public_read(mut self, public_read: bool) -> Self {
        self.public_read = public_read;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        ConfigLoader::from_str(content)
    }

    /// Default per-upload timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout)
    }

    /// The weakest option layer, derived from this configuration.
    ///
    /// Batch-wide and per-file options both take precedence over these.
    pub fn default_options(&self) -> OptionMap {
        let acl = if self.public_read {
            Acl::PublicRead
        } else {
            Acl::Private
        };

        OptionMap::new()
            .with(keys::BUCKET, self.default_bucket.as_str())
            .with(keys::TIMEOUT, self.default_timeout)
            .with(keys::ACL, acl)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_bucket cannot be empty".into(),
            ));
        }

        if self.default_timeout == 0 {
            return Err(ConfigError::ValidationError(
                "default_timeout must be greater than 0".into(),
            ));
        }

        if let Some(max) = self.max_concurrency {
            if max == 0 {
                return Err(ConfigError::ValidationError(
                    "max_concurrency must be at least 1".into(),
                ));
            }
        }

        if let Some(ref endpoint) = self.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.provider.is_remote() {
            if self.region.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "region is required for provider '{}'",
                    self.provider
                )));
            }

            let has_access = self.access_key.as_deref().is_some_and(|k| !k.is_empty());
            let has_secret = self.secret_key.as_deref().is_some_and(|k| !k.is_empty());
            if !has_access || !has_secret {
                return Err(ConfigError::ValidationError(format!(
                    "access_key and secret_key are required for provider '{}'",
                    self.provider
                )));
            }
        }

        Ok(())
    }
}
