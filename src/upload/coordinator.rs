//! Upload coordination
//!
//! Single uploads run inline on the caller's task. Batch uploads spawn one
//! task per file, dispatched in submission order and gated by a semaphore.
//! Results are re-assembled by original index once every task has finished,
//! so output order never depends on completion order.
//!
//! A file's failure never cancels its siblings. When the batch's cancellation
//! token fires (or its deadline passes), in-flight uploads run to completion
//! and every file not yet dispatched is reported as cancelled.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use super::{BatchOutcome, BatchRequest, FileSpec, Indexed, UploadResult};
use crate::config::Provider;
use crate::error::{classify, BridgeError, ErrorContext, ErrorKind, Operation};
use crate::options::{keys, resolve, EffectiveOptions};
use crate::provider::{ByteSource, ProviderSession, PutRequest};

#[cfg(feature = "metrics")]
use crate::metrics;

/// Executes uploads against one provider session
pub struct UploadCoordinator {
    session: Arc<dyn ProviderSession>,
    provider: Provider,
    max_concurrency: Option<usize>,
}

impl UploadCoordinator {
    pub fn new(session: Arc<dyn ProviderSession>, provider: Provider) -> Self {
        Self {
            session,
            provider,
            max_concurrency: None,
        }
    }

    /// Default in-flight cap for batches; `None` means one slot per file
    pub fn with_max_concurrency(mut self, max: Option<usize>) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Upload a single file with already-resolved options
    #[tracing::instrument(
        name = "bridge.upload_one",
        skip_all,
        fields(bridge.provider = %self.provider, upload.filename = %spec.filename),
        err
    )]
    pub async fn upload_one(
        &self,
        spec: FileSpec,
        effective: EffectiveOptions,
    ) -> Result<UploadResult, BridgeError> {
        upload_file(self.session.clone(), self.provider, spec, effective).await
    }

    /// Upload every file of `batch` concurrently
    ///
    /// Each file's options are resolved against `batch.global_options` before
    /// dispatch. Never fails as a whole; per-file failures are in the outcome.
    #[tracing::instrument(
        name = "bridge.upload_many",
        skip_all,
        fields(
            bridge.provider = %self.provider,
            batch.files = batch.len(),
            batch.succeeded = tracing::field::Empty,
            batch.failed = tracing::field::Empty
        )
    )]
    pub async fn upload_many(&self, batch: BatchRequest) -> BatchOutcome {
        let BatchRequest {
            files,
            global_options,
            max_concurrency,
            cancellation,
            deadline,
        } = batch;

        let total = files.len();
        if total == 0 {
            return BatchOutcome::default();
        }

        let limit = max_concurrency
            .or(self.max_concurrency)
            .unwrap_or(total)
            .clamp(1, total);
        let semaphore = Arc::new(Semaphore::new(limit));
        let cancel = cancellation.unwrap_or_default();

        let mut slots: Vec<Option<Result<UploadResult, BridgeError>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut tasks = FuturesUnordered::new();
        let mut pending = files.into_iter().enumerate();

        while let Some((index, spec)) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                _ = wait_until(deadline) => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                let reason = if cancel.is_cancelled() {
                    "batch cancelled before this file was dispatched"
                } else {
                    "batch deadline passed before this file was dispatched"
                };
                tracing::warn!(
                    first_index = index,
                    remaining = total - index,
                    reason,
                    "Batch stopped dispatching"
                );

                slots[index] = Some(Err(BridgeError::cancelled(reason)));
                for (rest, _) in pending.by_ref() {
                    slots[rest] = Some(Err(BridgeError::cancelled(reason)));
                }
                break;
            };

            let effective = resolve(&global_options, &spec.options);
            let session = self.session.clone();
            let provider = self.provider;

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                (index, upload_file(session, provider, spec, effective).await)
            }));
        }

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Upload task did not complete"),
            }
        }

        let mut outcome = BatchOutcome::default();
        for (index, slot) in slots.into_iter().enumerate() {
            let result = slot.unwrap_or_else(|| {
                Err(
                    BridgeError::new(ErrorKind::Provider, "upload task terminated unexpectedly")
                        .with_context(Operation::Put, self.provider),
                )
            });
            match result {
                Ok(value) => outcome.succeeded.push(Indexed { index, value }),
                Err(value) => outcome.failed.push(Indexed { index, value }),
            }
        }

        let span = tracing::Span::current();
        span.record("batch.succeeded", outcome.succeeded.len());
        span.record("batch.failed", outcome.failed.len());

        tracing::info!(
            files = total,
            concurrency = limit,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Batch upload finished"
        );

        outcome
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Upload one file; the byte source is dropped on every exit path
async fn upload_file(
    session: Arc<dyn ProviderSession>,
    provider: Provider,
    spec: FileSpec,
    effective: EffectiveOptions,
) -> Result<UploadResult, BridgeError> {
    let started = std::time::Instant::now();
    let result = transfer(session, provider, spec, effective).await;
    observe(provider, &result, started.elapsed());
    result
}

async fn transfer(
    session: Arc<dyn ProviderSession>,
    provider: Provider,
    spec: FileSpec,
    mut effective: EffectiveOptions,
) -> Result<UploadResult, BridgeError> {
    let path = spec.source_path().map(Path::to_path_buf);
    let FileSpec {
        handle, filename, ..
    } = spec;

    effective
        .check()
        .map_err(|e| BridgeError::validation(e.to_string()))?;

    let body = open_source(path.as_deref(), handle).await?;

    let name = destination_name(&filename, path.as_deref()).ok_or_else(|| {
        BridgeError::validation("no destination filename and none derivable from path")
    })?;

    let bucket = effective
        .bucket()
        .map(str::to_string)
        .ok_or_else(|| BridgeError::validation("no destination bucket"))?;

    if !effective.contains_key(keys::CONTENT_TYPE) {
        let guessed = mime_guess::from_path(&name).first_or_octet_stream();
        effective.insert(keys::CONTENT_TYPE, guessed.essence_str().to_string());
    }

    let acl = effective.acl();
    let metadata = effective.metadata().cloned().unwrap_or_default();
    let content_type = effective.content_type().map(str::to_string);
    let timeout = effective.timeout();

    let request = PutRequest {
        bucket,
        name: name.clone(),
        body,
        options: effective,
    };

    let put = session.put(request);
    let raw = match timeout {
        Some(limit) => match tokio::time::timeout(limit, put).await {
            Ok(raw) => raw,
            Err(_) => {
                return Err(BridgeError::new(
                    ErrorKind::Network,
                    format!(
                        "upload of '{}' timed out after {}s",
                        name,
                        limit.as_secs()
                    ),
                )
                .with_context(Operation::Put, provider));
            }
        },
        None => put.await,
    };

    let info = raw.map_err(|e| classify(e, &ErrorContext::new(Operation::Put, provider)))?;

    Ok(UploadResult {
        name: info.name,
        bucket: info.bucket,
        size: info.size,
        preview: info.url,
        acl,
        metadata,
        content_type,
        etag: info.etag,
        version_id: info.version_id,
        provider,
        uploaded_at: Utc::now(),
    })
}

/// Open the content source: the path if given, else the handle
async fn open_source(
    path: Option<&Path>,
    handle: Option<Box<dyn AsyncRead + Send + Unpin>>,
) -> Result<ByteSource, BridgeError> {
    if let Some(path) = path {
        let io_error =
            |e: std::io::Error| BridgeError::io(format!("cannot read '{}': {}", path.display(), e));

        let file = tokio::fs::File::open(path).await.map_err(io_error)?;
        let metadata = file.metadata().await.map_err(io_error)?;
        if !metadata.is_file() {
            return Err(BridgeError::io(format!(
                "cannot read '{}': not a regular file",
                path.display()
            )));
        }

        return Ok(ByteSource::from_file(file, path, metadata.len()));
    }

    match handle {
        Some(reader) => Ok(ByteSource::new(reader)),
        None => Err(BridgeError::validation(
            "no content source: set either a path or a handle",
        )),
    }
}

fn destination_name(filename: &str, path: Option<&Path>) -> Option<String> {
    if !filename.trim().is_empty() {
        return Some(filename.to_string());
    }
    path.and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
}

fn observe(provider: Provider, result: &Result<UploadResult, BridgeError>, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;

    match result {
        Ok(upload) => {
            tracing::info!(
                provider = %provider,
                bucket = %upload.bucket,
                name = %upload.name,
                bytes = upload.size,
                duration_ms,
                "Upload completed"
            );
            #[cfg(feature = "metrics")]
            metrics::record_upload_success(provider.as_str(), upload.size);
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::Validation | ErrorKind::Io | ErrorKind::Cancelled => {
                    tracing::warn!(provider = %provider, code = e.code(), error = %e, "Upload rejected")
                }
                _ => tracing::error!(
                    provider = %provider,
                    code = e.code(),
                    error = %e,
                    duration_ms,
                    "Upload failed"
                ),
            }
            #[cfg(feature = "metrics")]
            {
                metrics::record_upload_failure(provider.as_str());
                metrics::record_error(e.code());
            }
        }
    }

    #[cfg(feature = "metrics")]
    metrics::record_upload_duration(provider.as_str(), "put", elapsed.as_secs_f64());
}
