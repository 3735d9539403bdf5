//! Upload module
//!
//! Upload units ([`FileSpec`]), batches ([`BatchRequest`]) and their
//! outcomes. The [`coordinator`] executes them against a provider session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Provider;
use crate::error::BridgeError;
use crate::options::{keys, Acl, OptionMap, OptionValue};

pub mod coordinator;

pub use coordinator::UploadCoordinator;

/// A single upload unit
///
/// The content comes from `path` when set (and non-empty), otherwise from
/// `handle`. The bridge takes ownership of the handle and closes it when the
/// upload finishes, whatever the outcome.
pub struct FileSpec {
    pub path: Option<PathBuf>,
    pub handle: Option<Box<dyn AsyncRead + Send + Unpin>>,
    /// Destination object name. Falls back to the file name of `path`.
    pub filename: String,
    pub options: OptionMap,
}

impl FileSpec {
    /// Upload the file at `path` as `filename`
    pub fn from_path(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            handle: None,
            filename: filename.into(),
            options: OptionMap::new(),
        }
    }

    /// Upload everything readable from `reader` as `filename`
    pub fn from_reader<R>(reader: R, filename: impl Into<String>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            path: None,
            handle: Some(Box::new(reader)),
            filename: filename.into(),
            options: OptionMap::new(),
        }
    }

    /// A spec with a destination name but no content source yet
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            path: None,
            handle: None,
            filename: filename.into(),
            options: OptionMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn with_options(mut self, options: OptionMap) -> Self {
        self.options = options;
        self
    }

    pub fn with_acl(self, acl: Acl) -> Self {
        self.with_option(keys::ACL, acl)
    }

    pub fn with_metadata<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options = self.options.with_metadata(pairs);
        self
    }

    /// Path to read from, ignoring an empty path
    pub(crate) fn source_path(&self) -> Option<&Path> {
        self.path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

impl fmt::Debug for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSpec")
            .field("path", &self.path)
            .field("handle", &self.handle.as_ref().map(|_| "<reader>"))
            .field("filename", &self.filename)
            .field("options", &self.options)
            .finish()
    }
}

/// An ordered multi-file upload
///
/// `global_options` apply to every file that does not set the same key itself.
#[derive(Debug, Default)]
pub struct BatchRequest {
    pub files: Vec<FileSpec>,
    pub global_options: OptionMap,
    /// Overrides the bridge-wide in-flight cap for this batch
    pub max_concurrency: Option<usize>,
    pub cancellation: Option<CancellationToken>,
    /// Files not dispatched by this instant are reported as cancelled
    pub deadline: Option<Instant>,
}

impl BatchRequest {
    pub fn new(files: Vec<FileSpec>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn push(&mut self, file: FileSpec) {
        self.files.push(file);
    }

    pub fn with_global_options(mut self, options: OptionMap) -> Self {
        self.global_options = options;
        self
    }

    pub fn with_global_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Self {
        self.global_options.insert(key, value);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max.max(1));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Outcome of one successful upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    /// Object name assigned by the provider
    pub name: String,
    pub bucket: String,
    pub size: u64,
    /// Caller-facing access URL
    pub preview: String,
    pub acl: Option<Acl>,
    pub metadata: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    pub provider: Provider,
    pub uploaded_at: DateTime<Utc>,
}

/// A value tagged with the position of its file in the caller's batch
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed<T> {
    pub index: usize,
    pub value: T,
}

/// Per-file outcomes of a batch, each list sorted by original index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub succeeded: Vec<Indexed<UploadResult>>,
    pub failed: Vec<Indexed<BridgeError>>,
}

impl BatchOutcome {
    /// Number of files in the batch
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every file succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn result_for(&self, index: usize) -> Option<&UploadResult> {
        self.succeeded
            .iter()
            .find(|r| r.index == index)
            .map(|r| &r.value)
    }

    pub fn error_for(&self, index: usize) -> Option<&BridgeError> {
        self.failed
            .iter()
            .find(|e| e.index == index)
            .map(|e| &e.value)
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|e| e.index).collect()
    }

    /// Successful results in submission order
    pub fn into_results(self) -> Vec<UploadResult> {
        self.succeeded.into_iter().map(|r| r.value).collect()
    }
}
