//! In-memory provider
//!
//! Keeps objects in a process-local map. Sessions opened from the same
//! [`MemoryAdapter`] share one store, so callers can inspect what was
//! uploaded.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{ProviderAdapter, ProviderSession, PutRequest, RawObjectInfo};
use crate::config::{BridgeConfig, Provider};
use crate::error::{BridgeError, RawError};
use crate::options::OptionMap;

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub options: OptionMap,
    pub etag: String,
    pub stored_at: DateTime<Utc>,
}

type Store = Arc<DashMap<(String, String), StoredObject>>;

/// Adapter backed by a shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Store,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a stored object
    pub fn object(&self, bucket: &str, name: &str) -> Option<StoredObject> {
        self.store
            .get(&(bucket.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.store.len()
    }
}

#[async_trait]
impl ProviderAdapter for MemoryAdapter {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    async fn connect(&self, _config: &BridgeConfig) -> Result<Arc<dyn ProviderSession>, BridgeError> {
        Ok(Arc::new(MemorySession {
            store: self.store.clone(),
            open: AtomicBool::new(true),
        }))
    }
}

struct MemorySession {
    store: Store,
    open: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<(), RawError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RawError::Connection("memory session closed".into()))
        }
    }
}

#[async_trait]
impl ProviderSession for MemorySession {
    async fn put(&self, request: PutRequest) -> Result<RawObjectInfo, RawError> {
        self.ensure_open()?;

        let PutRequest {
            bucket,
            name,
            body,
            options,
        } = request;

        let data = body.read_all().await?;
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&data)));
        let size = data.len() as u64;

        self.store.insert(
            (bucket.clone(), name.clone()),
            StoredObject {
                data,
                options,
                etag: etag.clone(),
                stored_at: Utc::now(),
            },
        );

        Ok(RawObjectInfo {
            url: format!("memory://{}/{}", bucket, name),
            bucket,
            name,
            size,
            etag: Some(etag),
            version_id: Some(uuid::Uuid::new_v4().to_string()),
        })
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), RawError> {
        self.ensure_open()?;

        match self.store.remove(&(bucket.to_string(), name.to_string())) {
            Some(_) => Ok(()),
            None => Err(RawError::service(
                404,
                "NoSuchKey",
                format!("object '{}/{}' does not exist", bucket, name),
            )),
        }
    }

    async fn disconnect(&self) {
        self.open.store(false, Ordering::Release);
    }
}
