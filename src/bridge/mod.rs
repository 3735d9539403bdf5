//! Bridge facade
//!
//! [`Bridge`] is the provider-agnostic entry point. It owns the immutable
//! [`BridgeConfig`], the adapter selected for the configured provider, and at
//! most one live provider session.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──connect──▶ Connecting ──ok──▶ Connected ──disconnect──▶ Disconnected
//!       ▲                        │
//!       └────────── err ─────────┘
//! ```
//!
//! Uploads and deletes are only accepted while `Connected`; in any other state
//! they fail with `NOT_CONNECTED` before the adapter is touched. `Disconnected`
//! is terminal.
//!
//! # Example
//!
//! ```no_run
//! use bifrost::{Bridge, BridgeConfig, FileSpec, Provider};
//!
//! # async fn example() -> Result<(), bifrost::BridgeError> {
//! let config = BridgeConfig::new(Provider::SimpleStorageService, "my-bucket")
//!     .with_region("ap-northeast-1")
//!     .with_credentials("access", "secret")
//!     .with_public_read(true);
//!
//! let bridge = Bridge::open(config).await?;
//! let result = bridge
//!     .upload_file(FileSpec::from_path("./image/aand.png", "aand.png"))
//!     .await?;
//! println!("{}", result.preview);
//! bridge.disconnect().await;
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BridgeConfig;
use crate::error::{classify, BridgeError, ErrorContext, ErrorKind, Operation};
use crate::options::resolve;
use crate::provider::{ProviderAdapter, ProviderRegistry, ProviderSession};
use crate::upload::{BatchOutcome, BatchRequest, FileSpec, UploadCoordinator, UploadResult};

/// Lifecycle state of a [`Bridge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Uninitialized,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::Connecting => "connecting",
            BridgeState::Connected => "connected",
            BridgeState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

enum Slot {
    Uninitialized,
    Connecting,
    Connected(Arc<dyn ProviderSession>),
    Disconnected,
}

impl Slot {
    fn state(&self) -> BridgeState {
        match self {
            Slot::Uninitialized => BridgeState::Uninitialized,
            Slot::Connecting => BridgeState::Connecting,
            Slot::Connected(_) => BridgeState::Connected,
            Slot::Disconnected => BridgeState::Disconnected,
        }
    }
}

/// Failure of a multi-file upload
#[derive(Debug, Error)]
pub enum MultiUploadError {
    /// Nothing was attempted
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// At least one file failed; the others are reported alongside
    #[error("{} of {} uploads failed", .0.failed.len(), .0.len())]
    Partial(BatchOutcome),
}

impl MultiUploadError {
    pub fn outcome(&self) -> Option<&BatchOutcome> {
        match self {
            MultiUploadError::Partial(outcome) => Some(outcome),
            MultiUploadError::Bridge(_) => None,
        }
    }

    pub fn into_outcome(self) -> Option<BatchOutcome> {
        match self {
            MultiUploadError::Partial(outcome) => Some(outcome),
            MultiUploadError::Bridge(_) => None,
        }
    }
}

/// Provider-agnostic storage client
pub struct Bridge {
    config: BridgeConfig,
    adapter: Arc<dyn ProviderAdapter>,
    slot: Mutex<Slot>,
}

impl Bridge {
    /// Build an unconnected bridge using the built-in adapters
    ///
    /// Fails with `CONFIG_ERROR` when the configuration is invalid.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::with_registry(config, &ProviderRegistry::with_defaults())
    }

    /// Build an unconnected bridge, selecting the adapter from `registry`
    pub fn with_registry(
        config: BridgeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let adapter = registry.resolve(config.provider)?;

        if config.debug {
            crate::logging::init_subscriber(true);
        }

        tracing::debug!(
            provider = %config.provider,
            bucket = %config.default_bucket,
            "Bridge created"
        );

        Ok(Self {
            config,
            adapter,
            slot: Mutex::new(Slot::Uninitialized),
        })
    }

    /// Build and connect a bridge with the built-in adapters
    pub async fn open(config: BridgeConfig) -> Result<Self, BridgeError> {
        let bridge = Self::new(config)?;
        bridge.connect().await?;
        Ok(bridge)
    }

    /// Build and connect a bridge, selecting the adapter from `registry`
    pub async fn open_with_registry(
        config: BridgeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, BridgeError> {
        let bridge = Self::with_registry(config, registry)?;
        bridge.connect().await?;
        Ok(bridge)
    }

    /// Open the provider session
    ///
    /// A no-op when already connected. On failure the bridge returns to
    /// `Uninitialized` and the call may be retried. Fails with
    /// `NOT_CONNECTED` once the bridge has been disconnected.
    #[tracing::instrument(
        name = "bridge.connect",
        skip(self),
        fields(bridge.provider = %self.config.provider),
        err
    )]
    pub async fn connect(&self) -> Result<(), BridgeError> {
        {
            let mut slot = self.slot.lock();
            match *slot {
                Slot::Connected(_) => return Ok(()),
                Slot::Connecting => {
                    return Err(BridgeError::not_connected("connection already in progress"))
                }
                Slot::Disconnected => {
                    return Err(BridgeError::not_connected("bridge has been disconnected"))
                }
                Slot::Uninitialized => *slot = Slot::Connecting,
            }
        }

        let mut guard = ConnectingGuard {
            slot: &self.slot,
            armed: true,
        };

        let session = self.adapter.connect(&self.config).await?;

        let mut slot = self.slot.lock();
        guard.armed = false;
        if let Slot::Disconnected = *slot {
            drop(slot);
            session.disconnect().await;
            return Err(BridgeError::not_connected(
                "bridge was disconnected while connecting",
            ));
        }
        *slot = Slot::Connected(session);
        drop(slot);

        tracing::info!(provider = %self.config.provider, "Bridge connected");
        Ok(())
    }

    pub fn state(&self) -> BridgeState {
        self.slot.lock().state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == BridgeState::Connected
    }

    /// The configuration this bridge was built with
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Upload one file
    ///
    /// Options not set on `spec` fall back to the configuration defaults
    /// (bucket, timeout, ACL).
    #[tracing::instrument(
        name = "bridge.upload_file",
        skip_all,
        fields(bridge.provider = %self.config.provider, upload.filename = %spec.filename),
        err
    )]
    pub async fn upload_file(&self, spec: FileSpec) -> Result<UploadResult, BridgeError> {
        let session = self.session(Operation::Put)?;
        let effective = resolve(&self.config.default_options(), &spec.options);
        self.coordinator(session).upload_one(spec, effective).await
    }

    /// Upload every file of `batch` concurrently
    ///
    /// Returns the results in submission order when every file succeeded.
    /// Otherwise returns [`MultiUploadError::Partial`] with both the
    /// successes and the failures, each tagged with its original index.
    #[tracing::instrument(
        name = "bridge.upload_multi_file",
        skip_all,
        fields(bridge.provider = %self.config.provider, batch.files = batch.len())
    )]
    pub async fn upload_multi_file(
        &self,
        mut batch: BatchRequest,
    ) -> Result<Vec<UploadResult>, MultiUploadError> {
        let session = self.session(Operation::Put)?;
        batch.global_options = resolve(&self.config.default_options(), &batch.global_options);

        let outcome = self.coordinator(session).upload_many(batch).await;
        if outcome.is_complete() {
            Ok(outcome.into_results())
        } else {
            Err(MultiUploadError::Partial(outcome))
        }
    }

    /// Delete an object from `bucket`, or from the default bucket
    #[tracing::instrument(
        name = "bridge.delete_file",
        skip(self),
        fields(bridge.provider = %self.config.provider),
        err
    )]
    pub async fn delete_file(&self, name: &str, bucket: Option<&str>) -> Result<(), BridgeError> {
        let session = self.session(Operation::Delete)?;

        if name.trim().is_empty() {
            return Err(BridgeError::validation("object name cannot be empty"));
        }
        let bucket = bucket
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(&self.config.default_bucket);

        let provider = self.config.provider;
        let limit = self.config.timeout();
        match tokio::time::timeout(limit, session.delete(bucket, name)).await {
            Ok(Ok(())) => {
                tracing::info!(bucket, name, "Object deleted");
                Ok(())
            }
            Ok(Err(raw)) => Err(classify(raw, &ErrorContext::new(Operation::Delete, provider))),
            Err(_) => Err(BridgeError::new(
                ErrorKind::Network,
                format!("delete of '{}' timed out after {}s", name, limit.as_secs()),
            )
            .with_context(Operation::Delete, provider)),
        }
    }

    /// Release the provider session
    ///
    /// Idempotent. The bridge cannot be reconnected afterwards. Uploads
    /// already in flight keep their handle on the session and finish.
    pub async fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Disconnected);
        match previous {
            Slot::Connected(session) => {
                session.disconnect().await;
                tracing::info!(provider = %self.config.provider, "Bridge disconnected");
            }
            Slot::Disconnected => {}
            other => {
                tracing::debug!(from = %other.state(), "Bridge closed without a session");
            }
        }
    }

    fn session(&self, operation: Operation) -> Result<Arc<dyn ProviderSession>, BridgeError> {
        match &*self.slot.lock() {
            Slot::Connected(session) => Ok(session.clone()),
            other => Err(BridgeError::not_connected(format!(
                "bridge is {}",
                other.state()
            ))
            .with_context(operation, self.config.provider)),
        }
    }

    fn coordinator(&self, session: Arc<dyn ProviderSession>) -> UploadCoordinator {
        UploadCoordinator::new(session, self.config.provider)
            .with_max_concurrency(self.config.max_concurrency)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("provider", &self.config.provider)
            .field("default_bucket", &self.config.default_bucket)
            .field("state", &self.state())
            .finish()
    }
}

/// Puts a `Connecting` bridge back to `Uninitialized` if connect fails or is dropped
struct ConnectingGuard<'a> {
    slot: &'a Mutex<Slot>,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.lock();
        if let Slot::Connecting = *slot {
            *slot = Slot::Uninitialized;
        }
    }
}
