//! Bridge Upload Integration Tests
//!
//! End-to-end behavior of single and multi-file uploads through the public
//! `Bridge` surface, against a scripted adapter.
//!
//! ## Test Coverage
//!
//! - Partial failure isolation and index correlation
//! - Submission ordering under random completion latency
//! - Validation before any adapter call
//! - State preconditions after disconnect
//! - Cancellation and deadlines for undispatched files
//! - Concurrency cap
//! - Handle release on every exit path

mod common;

#[cfg(test)]
mod tests {
    use super::common::{test_config, ScriptedAdapter, TrackedReader, TEST_BUCKET};
    use bifrost::options::{keys, Acl};
    use bifrost::{BatchRequest, Bridge, ErrorKind, FileSpec, MultiUploadError};
    use std::future::Future;
    use std::io::Write;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    async fn open(adapter: &ScriptedAdapter) -> Bridge {
        Bridge::open_with_registry(test_config(), &adapter.registry())
            .await
            .unwrap()
    }

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    // ========================================================================
    // TEST: Partial Failure
    // ========================================================================

    /// One unreadable file yields N-1 successes and one failure at its index
    #[tokio::test]
    async fn test_unreadable_file_fails_alone() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;

        let files: Vec<_> = (0..5).map(|i| temp_file(format!("file {}", i).as_bytes())).collect();
        let unreadable = 3;

        let specs = files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if i == unreadable {
                    FileSpec::from_path("/nonexistent/bifrost/missing.bin", "missing.bin")
                } else {
                    FileSpec::from_path(f.path(), format!("{}.txt", i))
                }
            })
            .collect();

        let err = bridge
            .upload_multi_file(BatchRequest::new(specs))
            .await
            .unwrap_err();
        let outcome = err.into_outcome().unwrap();

        assert_eq!(outcome.succeeded.len(), 4);
        assert_eq!(outcome.failed_indices(), vec![unreadable]);
        assert_eq!(outcome.error_for(unreadable).unwrap().kind(), ErrorKind::Io);

        for i in [0, 1, 2, 4] {
            let result = outcome.result_for(i).unwrap();
            assert_eq!(result.name, format!("{}.txt", i));
            assert_eq!(result.size, 6);
        }
        assert_eq!(adapter.puts(), 4);
    }

    /// An adapter error on one file does not disturb the others
    #[tokio::test]
    async fn test_adapter_failure_is_isolated() {
        let adapter = ScriptedAdapter::new().failing_on("b.txt");
        let bridge = open(&adapter).await;

        let batch = BatchRequest::new(vec![
            FileSpec::from_reader(&b"a"[..], "a.txt"),
            FileSpec::from_reader(&b"b"[..], "b.txt"),
            FileSpec::from_reader(&b"c"[..], "c.txt"),
        ]);

        let outcome = bridge
            .upload_multi_file(batch)
            .await
            .unwrap_err()
            .into_outcome()
            .unwrap();

        let failure = outcome.error_for(1).unwrap();
        assert_eq!(failure.kind(), ErrorKind::Provider);
        assert_eq!(failure.message(), "scripted failure for b.txt");
        assert_eq!(outcome.succeeded.len(), 2);
    }

    // ========================================================================
    // TEST: Ordering
    // ========================================================================

    /// Results come back in submission order whatever the completion order
    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let adapter = ScriptedAdapter::new().with_latency(Duration::from_millis(40));
        let bridge = open(&adapter).await;
        let names: Vec<String> = (0..5).map(|i| format!("file-{}.bin", i)).collect();

        for _ in 0..5 {
            let batch = BatchRequest::new(
                names
                    .iter()
                    .map(|n| FileSpec::from_reader(&b"payload"[..], n.as_str()))
                    .collect(),
            );

            let results = bridge.upload_multi_file(batch).await.unwrap();
            let returned: Vec<_> = results.iter().map(|r| r.name.clone()).collect();
            assert_eq!(returned, names);
        }
    }

    // ========================================================================
    // TEST: Validation
    // ========================================================================

    /// No path and no handle: validation error, adapter never called
    #[tokio::test]
    async fn test_no_source_never_reaches_adapter() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;

        let err = bridge.upload_file(FileSpec::named("ghost.txt")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(adapter.puts(), 0);
    }

    /// Empty filename falls back to the path's final component
    #[tokio::test]
    async fn test_filename_from_path() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sammy.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let result = bridge.upload_file(FileSpec::from_path(&path, "")).await.unwrap();
        assert_eq!(result.name, "sammy.jpg");
        assert_eq!(result.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(result.bucket, TEST_BUCKET);
    }

    /// Path wins over handle when both are set
    #[tokio::test]
    async fn test_path_preferred_over_handle() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;
        let file = temp_file(b"from path");

        let (reader, dropped) = TrackedReader::new(b"from handle, longer");
        let spec = FileSpec {
            handle: Some(Box::new(reader)),
            ..FileSpec::from_path(file.path(), "both.txt")
        };

        let result = bridge.upload_file(spec).await.unwrap();
        assert_eq!(result.size, 9);
        assert!(dropped.load(Ordering::SeqCst));
    }

    // ========================================================================
    // TEST: State Preconditions
    // ========================================================================

    #[tokio::test]
    async fn test_calls_after_disconnect_are_not_connected() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;
        bridge.disconnect().await;
        bridge.disconnect().await;
        assert_eq!(adapter.script.disconnects.load(Ordering::SeqCst), 1);

        let err = bridge
            .upload_file(FileSpec::from_reader(&b"x"[..], "x.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);

        let err = bridge
            .upload_multi_file(BatchRequest::new(vec![FileSpec::from_reader(
                &b"x"[..],
                "x.txt",
            )]))
            .await
            .unwrap_err();
        assert!(matches!(err, MultiUploadError::Bridge(ref e) if e.kind() == ErrorKind::NotConnected));

        let err = bridge.delete_file("x.txt", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);

        assert_eq!(adapter.puts(), 0);
        assert_eq!(adapter.script.deletes.load(Ordering::SeqCst), 0);
    }

    // ========================================================================
    // TEST: Cancellation
    // ========================================================================

    /// Cancelling mid-batch lets the running upload finish and cancels the rest
    #[tokio::test]
    async fn test_cancellation_reports_undispatched_files() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;

        let (slow, _) = TrackedReader::new(b"first");
        let token = CancellationToken::new();
        let batch = BatchRequest::new(vec![
            FileSpec::from_reader(SlowReader::new(slow, Duration::from_millis(100)), "0.bin"),
            FileSpec::from_reader(&b"1"[..], "1.bin"),
            FileSpec::from_reader(&b"2"[..], "2.bin"),
        ])
        .with_max_concurrency(1)
        .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let outcome = bridge
            .upload_multi_file(batch)
            .await
            .unwrap_err()
            .into_outcome()
            .unwrap();
        canceller.await.unwrap();

        assert!(outcome.result_for(0).is_some());
        assert_eq!(outcome.failed_indices(), vec![1, 2]);
        assert!(outcome
            .failed
            .iter()
            .all(|f| f.value.kind() == ErrorKind::Cancelled));
        assert_eq!(adapter.puts(), 1);
    }

    /// A passed deadline behaves like cancellation
    #[tokio::test]
    async fn test_deadline_reports_undispatched_files() {
        let adapter = ScriptedAdapter::new();
        let bridge = open(&adapter).await;

        let (slow, _) = TrackedReader::new(b"first");
        let batch = BatchRequest::new(vec![
            FileSpec::from_reader(SlowReader::new(slow, Duration::from_millis(100)), "0.bin"),
            FileSpec::from_reader(&b"1"[..], "1.bin"),
        ])
        .with_max_concurrency(1)
        .with_deadline(tokio::time::Instant::now() + Duration::from_millis(20));

        let outcome = bridge
            .upload_multi_file(batch)
            .await
            .unwrap_err()
            .into_outcome()
            .unwrap();

        assert!(outcome.result_for(0).is_some());
        assert_eq!(outcome.error_for(1).unwrap().kind(), ErrorKind::Cancelled);
    }

    // ========================================================================
    // TEST: Concurrency
    // ========================================================================

    #[tokio::test]
    async fn test_config_concurrency_cap() {
        let adapter = ScriptedAdapter::new().with_latency(Duration::from_millis(20));
        let config = test_config().with_max_concurrency(3);
        let bridge = Bridge::open_with_registry(config, &adapter.registry())
            .await
            .unwrap();

        let batch = BatchRequest::new(
            (0..10)
                .map(|i| FileSpec::from_reader(&b"x"[..], format!("{}.bin", i)))
                .collect(),
        );
        let results = bridge.upload_multi_file(batch).await.unwrap();

        assert_eq!(results.len(), 10);
        assert!(adapter.script.peak_in_flight.load(Ordering::SeqCst) <= 3);
    }

    // ========================================================================
    // TEST: Handle Release
    // ========================================================================

    #[tokio::test]
    async fn test_handle_released_on_every_path() {
        let adapter = ScriptedAdapter::new().failing_on("bad.txt");
        let bridge = open(&adapter).await;

        let (reader, dropped) = TrackedReader::new(b"ok");
        tokio_test::assert_ok!(bridge.upload_file(FileSpec::from_reader(reader, "ok.txt")).await);
        assert!(dropped.load(Ordering::SeqCst));

        let (reader, dropped) = TrackedReader::new(b"bad");
        tokio_test::assert_err!(bridge.upload_file(FileSpec::from_reader(reader, "bad.txt")).await);
        assert!(dropped.load(Ordering::SeqCst));

        let (reader, dropped) = TrackedReader::new(b"orphan");
        let spec = FileSpec::from_reader(reader, "").with_option(keys::ACL, Acl::Private);
        tokio_test::assert_err!(bridge.upload_file(spec).await);
        assert!(dropped.load(Ordering::SeqCst));

        bridge.disconnect().await;
        let (reader, dropped) = TrackedReader::new(b"late");
        tokio_test::assert_err!(bridge.upload_file(FileSpec::from_reader(reader, "late.txt")).await);
        assert!(dropped.load(Ordering::SeqCst));
    }

    /// Reader that waits before yielding its inner reader's bytes
    struct SlowReader<R> {
        inner: R,
        delay: Option<std::pin::Pin<Box<tokio::time::Sleep>>>,
    }

    impl<R> SlowReader<R> {
        fn new(inner: R, delay: Duration) -> Self {
            Self {
                inner,
                delay: Some(Box::pin(tokio::time::sleep(delay))),
            }
        }
    }

    impl<R: tokio::io::AsyncRead + Unpin> tokio::io::AsyncRead for SlowReader<R> {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if let Some(delay) = self.delay.as_mut() {
                if delay.as_mut().poll(cx).is_pending() {
                    return std::task::Poll::Pending;
                }
                self.delay = None;
            }
            std::pin::Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }
}
