//! Shared test infrastructure
//!
//! - A scripted in-process adapter with call counting, injected failures and
//!   randomized latency
//! - A reader that reports when it has been dropped

#![allow(dead_code)]

use async_trait::async_trait;
use bifrost::config::{BridgeConfig, Provider};
use bifrost::error::{BridgeError, RawError};
use bifrost::provider::{ProviderAdapter, ProviderRegistry, ProviderSession, PutRequest, RawObjectInfo};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

/// Test bucket name
pub const TEST_BUCKET: &str = "test-bucket";

/// Observable state shared by a [`ScriptedAdapter`] and its sessions
#[derive(Default)]
pub struct Script {
    pub connects: AtomicUsize,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub disconnects: AtomicUsize,
    /// Upper bound of the random delay inside `put`
    pub max_latency: Mutex<Duration>,
    /// Names whose `put` returns an unclassifiable error
    pub failing: Mutex<HashSet<String>>,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    pub completed: Mutex<Vec<String>>,
}

/// Adapter whose sessions behave as the test scripts them
#[derive(Clone, Default)]
pub struct ScriptedAdapter {
    pub script: Arc<Script>,
}

impl ScriptedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(self, max: Duration) -> Self {
        *self.script.max_latency.lock() = max;
        self
    }

    pub fn failing_on(self, name: &str) -> Self {
        self.script.failing.lock().insert(name.to_string());
        self
    }

    pub fn puts(&self) -> usize {
        self.script.puts.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Provider::Memory, Arc::new(self.clone()));
        registry
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        Provider::Memory
    }

    async fn connect(&self, _config: &BridgeConfig) -> Result<Arc<dyn ProviderSession>, BridgeError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Script>,
}

#[async_trait]
impl ProviderSession for ScriptedSession {
    async fn put(&self, request: PutRequest) -> Result<RawObjectInfo, RawError> {
        self.script.puts.fetch_add(1, Ordering::SeqCst);
        let now = self.script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.script.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let max = *self.script.max_latency.lock();
        let delay = if max.is_zero() {
            Duration::ZERO
        } else {
            let millis = rand::rng().random_range(0..=max.as_millis() as u64);
            Duration::from_millis(millis)
        };
        tokio::time::sleep(delay).await;

        let PutRequest {
            bucket, name, body, ..
        } = request;
        let data = body.read_all().await;
        self.script.in_flight.fetch_sub(1, Ordering::SeqCst);
        let data = data?;

        if self.script.failing.lock().contains(&name) {
            return Err(RawError::other(format!("scripted failure for {}", name)));
        }

        self.script.completed.lock().push(name.clone());
        Ok(RawObjectInfo {
            url: format!("fake://{}/{}", bucket, name),
            bucket,
            name,
            size: data.len() as u64,
            etag: None,
            version_id: None,
        })
    }

    async fn delete(&self, _bucket: &str, _name: &str) -> Result<(), RawError> {
        self.script.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.script.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration for the scripted adapter
pub fn test_config() -> BridgeConfig {
    BridgeConfig::new(Provider::Memory, TEST_BUCKET)
}

/// Reader over a fixed buffer that flips a flag when dropped
pub struct TrackedReader {
    data: Vec<u8>,
    pos: usize,
    dropped: Arc<AtomicBool>,
}

impl TrackedReader {
    pub fn new(data: &[u8]) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                data: data.to_vec(),
                pos: 0,
                dropped: dropped.clone(),
            },
            dropped,
        )
    }
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
