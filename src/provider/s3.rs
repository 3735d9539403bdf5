//! S3-compatible provider adapter
//!
//! Talks to Amazon S3, Wasabi, or any S3-compatible endpoint through the AWS
//! SDK. The SDK owns request signing, retries, and the wire protocol; this
//! module only maps bridge options onto `PutObject` and SDK failures onto
//! [`RawError`].
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | Connect | `s3.connect` | provider, bucket, region |
//! | PutObject | `s3.put_object` | bucket, key, bytes, etag |
//! | DeleteObject | `s3.delete_object` | bucket, key |

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use aws_smithy_runtime_api::http::Response as HttpResponse;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;

use super::{ProviderAdapter, ProviderSession, PutRequest, RawObjectInfo};
use crate::config::{BridgeConfig, Provider};
use crate::error::{classify, BridgeError, ErrorContext, ErrorKind, Operation, RawError};
use crate::options::keys;

/// Characters left unescaped in object keys when building URLs
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Options `PutObject` understands
const SUPPORTED_OPTIONS: &[&str] = &[
    keys::ACL,
    keys::METADATA,
    keys::CONTENT_TYPE,
    keys::CACHE_CONTROL,
    keys::CONTENT_DISPOSITION,
    keys::CONTENT_ENCODING,
    keys::BUCKET,
    keys::TIMEOUT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Aws,
    Wasabi,
}

/// Adapter for S3-compatible services
#[derive(Debug, Clone)]
pub struct S3Adapter {
    flavor: Flavor,
}

impl S3Adapter {
    /// Amazon S3. Honors `endpoint` for S3-compatible services.
    pub fn aws() -> Self {
        Self {
            flavor: Flavor::Aws,
        }
    }

    /// Wasabi (`https://s3.<region>.wasabisys.com`)
    pub fn wasabi() -> Self {
        Self {
            flavor: Flavor::Wasabi,
        }
    }

    /// Endpoint to send requests to; `None` means the SDK's AWS default
    fn endpoint(&self, config: &BridgeConfig) -> Option<String> {
        match (&config.endpoint, self.flavor) {
            (Some(endpoint), _) => Some(endpoint.trim_end_matches('/').to_string()),
            (None, Flavor::Wasabi) => Some(format!("https://s3.{}.wasabisys.com", config.region)),
            (None, Flavor::Aws) => None,
        }
    }

    async fn build_client(&self, config: &BridgeConfig) -> Client {
        let credentials = Credentials::new(
            config.access_key.clone().unwrap_or_default(),
            config.secret_key.clone().unwrap_or_default(),
            None,
            None,
            "bifrost",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = self.endpoint(config) {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Client::from_conf(builder.build())
    }
}

#[async_trait]
impl ProviderAdapter for S3Adapter {
    fn provider(&self) -> Provider {
        match self.flavor {
            Flavor::Aws => Provider::SimpleStorageService,
            Flavor::Wasabi => Provider::WasabiCloudStorage,
        }
    }

    #[tracing::instrument(
        name = "s3.connect",
        skip(self, config),
        fields(
            bridge.provider = %self.provider(),
            s3.bucket = %config.default_bucket,
            s3.region = %config.region
        ),
        err
    )]
    async fn connect(&self, config: &BridgeConfig) -> Result<Arc<dyn ProviderSession>, BridgeError> {
        let provider = self.provider();
        let client = self.build_client(config).await;

        // Verifies credentials and bucket reachability in one round trip
        client
            .head_bucket()
            .bucket(&config.default_bucket)
            .send()
            .await
            .map_err(|e| {
                let err = classify(
                    raw_from_sdk(e),
                    &ErrorContext::new(Operation::Connect, provider),
                );
                if err.kind() == ErrorKind::NotFound {
                    return BridgeError::config(format!(
                        "default bucket '{}' does not exist",
                        config.default_bucket
                    ))
                    .with_context(Operation::Connect, provider);
                }
                err
            })?;

        let urls = match self.endpoint(config) {
            Some(endpoint) => UrlStyle::Path { endpoint },
            None => UrlStyle::VirtualHost {
                region: config.region.clone(),
            },
        };

        tracing::info!(provider = %provider, "Connected to S3-compatible endpoint");

        Ok(Arc::new(S3Session {
            client,
            provider,
            urls,
        }))
    }
}

/// Request body and its exact length
///
/// File-backed bodies stream from disk; anything else is buffered.
async fn into_stream(body: super::ByteSource) -> Result<(ByteStream, u64), RawError> {
    if let (Some(path), Some(size)) = (body.path(), body.size_hint()) {
        let stream = ByteStream::read_from()
            .path(path)
            .length(Length::Exact(size))
            .build()
            .await
            .map_err(|e| RawError::Io(std::io::Error::other(e)))?;
        return Ok((stream, size));
    }

    let data = body.read_all().await?;
    let size = data.len() as u64;
    Ok((ByteStream::from(data), size))
}

/// How preview URLs are formed
#[derive(Debug, Clone)]
enum UrlStyle {
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`
    VirtualHost { region: String },
    /// `<endpoint>/<bucket>/<key>`
    Path { endpoint: String },
}

impl UrlStyle {
    fn object_url(&self, bucket: &str, key: &str) -> String {
        let key = utf8_percent_encode(key, KEY_ENCODE_SET);
        match self {
            UrlStyle::VirtualHost { region } => {
                format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
            }
            UrlStyle::Path { endpoint } => format!("{}/{}/{}", endpoint, bucket, key),
        }
    }
}

/// Session holding one SDK client
pub struct S3Session {
    client: Client,
    provider: Provider,
    urls: UrlStyle,
}

#[async_trait]
impl ProviderSession for S3Session {
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, request),
        fields(
            s3.bucket = %request.bucket,
            s3.key = %request.name,
            upload.bytes = tracing::field::Empty,
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put(&self, request: PutRequest) -> Result<RawObjectInfo, RawError> {
        let PutRequest {
            bucket,
            name,
            body,
            options,
        } = request;

        let (stream, size) = into_stream(body).await?;
        tracing::Span::current().record("upload.bytes", size);

        let mut put = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&name)
            .content_length(size as i64)
            .body(stream);

        if let Some(acl) = options.acl() {
            put = put.acl(ObjectCannedAcl::from(acl.as_str()));
        }
        if let Some(content_type) = options.content_type() {
            put = put.content_type(content_type);
        }
        if let Some(cache_control) = options.cache_control() {
            put = put.cache_control(cache_control);
        }
        if let Some(disposition) = options.content_disposition() {
            put = put.content_disposition(disposition);
        }
        if let Some(encoding) = options.content_encoding() {
            put = put.content_encoding(encoding);
        }
        if let Some(metadata) = options.metadata() {
            for (key, value) in metadata {
                put = put.metadata(key, value);
            }
        }

        for key in options.keys().filter(|k| !SUPPORTED_OPTIONS.contains(k)) {
            tracing::debug!(option = key, provider = %self.provider, "Option not used by PutObject");
        }

        let output = put.send().await.map_err(raw_from_sdk)?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }

        Ok(RawObjectInfo {
            url: self.urls.object_url(&bucket, &name),
            bucket,
            name,
            size,
            etag,
            version_id: output.version_id().map(str::to_string),
        })
    }

    #[tracing::instrument(
        name = "s3.delete_object",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %name),
        err
    )]
    async fn delete(&self, bucket: &str, name: &str) -> Result<(), RawError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(name)
            .send()
            .await
            .map_err(raw_from_sdk)?;
        Ok(())
    }

    async fn disconnect(&self) {
        // The SDK client holds a pooled HTTP connector that is released on drop
        tracing::debug!(provider = %self.provider, "S3 session closed");
    }
}

/// Flatten an SDK failure into a raw provider error
fn raw_from_sdk<E>(err: SdkError<E, HttpResponse>) -> RawError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::TimeoutError(_) => {
            return RawError::Timeout(DisplayErrorContext(&err).to_string());
        }
        SdkError::DispatchFailure(failure) => {
            let detail = DisplayErrorContext(&err).to_string();
            return if failure.is_timeout() {
                RawError::Timeout(detail)
            } else {
                RawError::Connection(detail)
            };
        }
        _ => {}
    }

    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    if status.is_none() && code.is_none() {
        return RawError::Other(message);
    }

    RawError::Service {
        status,
        code,
        message,
    }
}
