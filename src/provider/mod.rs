//! Provider adapters
//!
//! A [`ProviderAdapter`] knows how to open a session against one storage
//! backend. The resulting [`ProviderSession`] performs single-object puts and
//! deletes and reports failures as [`RawError`]s, which the bridge classifies.
//!
//! # Implementations
//!
//! - [`S3Adapter`] - Amazon S3, Wasabi, and other S3-compatible endpoints
//! - [`MemoryAdapter`] - Process-local store for development and tests
//!
//! Adapters are selected by [`Provider`](crate::config::Provider) through a
//! [`ProviderRegistry`].

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{BridgeConfig, Provider};
use crate::error::{BridgeError, RawError};
use crate::options::EffectiveOptions;

pub mod memory;
pub mod registry;
pub mod s3;

pub use memory::MemoryAdapter;
pub use registry::ProviderRegistry;
pub use s3::S3Adapter;

/// Readable upload body
///
/// Owns its reader exclusively; dropping the source closes the underlying
/// file or handle.
pub struct ByteSource {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    size_hint: Option<u64>,
    path: Option<PathBuf>,
}

impl ByteSource {
    pub fn new(reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            reader,
            size_hint: None,
            path: None,
        }
    }

    /// Body backed by an already opened regular file
    ///
    /// Adapters that can stream from disk reopen `path` instead of reading
    /// through `file`.
    pub fn from_file(file: tokio::fs::File, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            reader: Box::new(file),
            size_hint: Some(size),
            path: Some(path.into()),
        }
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data: Bytes = data.into();
        let size = data.len() as u64;
        Self {
            reader: Box::new(Cursor::new(data)),
            size_hint: Some(size),
            path: None,
        }
    }

    /// Size in bytes, when known before reading
    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    /// Local file behind this body, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the whole body into memory
    pub async fn read_all(mut self) -> std::io::Result<Bytes> {
        let capacity = self.size_hint.unwrap_or(0).min(64 * 1024 * 1024) as usize;
        let mut buf = Vec::with_capacity(capacity);
        self.reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSource")
            .field("size_hint", &self.size_hint)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Provider-neutral single-object upload
#[derive(Debug)]
pub struct PutRequest {
    pub bucket: String,
    pub name: String,
    pub body: ByteSource,
    pub options: EffectiveOptions,
}

/// What a provider reports about a stored object
#[derive(Debug, Clone, PartialEq)]
pub struct RawObjectInfo {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    /// Caller-facing access URL
    pub url: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Opens sessions against one storage backend
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter implements
    fn provider(&self) -> Provider;

    /// Establish a session. Failures are already classified.
    async fn connect(&self, config: &BridgeConfig) -> Result<Arc<dyn ProviderSession>, BridgeError>;
}

/// An established provider session
///
/// Shared read-only across concurrently running uploads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderSession: Send + Sync {
    /// Upload one object
    async fn put(&self, request: PutRequest) -> Result<RawObjectInfo, RawError>;

    /// Delete one object
    async fn delete(&self, bucket: &str, name: &str) -> Result<(), RawError>;

    /// Release session resources
    async fn disconnect(&self);
}
