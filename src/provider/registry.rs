//! Provider registry
//!
//! Maps each [`Provider`] to the adapter that serves it. A bridge looks up its
//! adapter once, at construction.
//!
//! # Example
//!
//! ```
//! use bifrost::config::Provider;
//! use bifrost::provider::{MemoryAdapter, ProviderRegistry};
//! use std::sync::Arc;
//!
//! let mut registry = ProviderRegistry::with_defaults();
//! registry.register(Provider::Memory, Arc::new(MemoryAdapter::new()));
//! assert!(registry.get(Provider::SimpleStorageService).is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::{MemoryAdapter, ProviderAdapter, S3Adapter};
use crate::config::{ConfigError, Provider};

/// Provider-keyed adapter table
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in adapters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Provider::SimpleStorageService, Arc::new(S3Adapter::aws()));
        registry.register(Provider::WasabiCloudStorage, Arc::new(S3Adapter::wasabi()));
        registry.register(Provider::Memory, Arc::new(MemoryAdapter::new()));
        registry
    }

    /// Register (or replace) the adapter for `provider`
    pub fn register(&mut self, provider: Provider, adapter: Arc<dyn ProviderAdapter>) {
        if self.adapters.insert(provider, adapter).is_some() {
            tracing::debug!(provider = %provider, "Replaced registered adapter");
        }
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Adapter for `provider`, or a configuration error if none is registered
    pub fn resolve(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
        self.get(provider)
            .ok_or(ConfigError::UnregisteredProvider(provider))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.adapters.keys().copied()
    }
}
