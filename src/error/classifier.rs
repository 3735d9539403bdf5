//! Provider error classification
//!
//! Maps a [`RawError`] from any provider onto the bridge's closed set of
//! [`ErrorKind`]s. Service error codes are checked first, then the HTTP
//! status. Anything unrecognized becomes [`ErrorKind::Provider`] with the raw
//! message kept verbatim.

use super::{BridgeError, ErrorKind, Operation, RawError};
use crate::config::Provider;

/// Where a raw error was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub operation: Operation,
    pub provider: Provider,
}

impl ErrorContext {
    pub fn new(operation: Operation, provider: Provider) -> Self {
        Self {
            operation,
            provider,
        }
    }
}

/// Classify a raw provider failure
pub fn classify(raw: RawError, context: &ErrorContext) -> BridgeError {
    let message = raw.to_string();

    let kind = match &raw {
        RawError::Service { status, code, .. } => code
            .as_deref()
            .and_then(kind_for_code)
            .or_else(|| status.and_then(kind_for_status))
            .unwrap_or(ErrorKind::Provider),
        RawError::Timeout(_) | RawError::Connection(_) => ErrorKind::Network,
        RawError::Io(_) => ErrorKind::Io,
        RawError::Other(_) => ErrorKind::Provider,
    };

    tracing::debug!(
        provider = %context.provider,
        operation = %context.operation,
        code = kind.code(),
        raw = ?raw,
        "Classified provider error"
    );

    BridgeError::new(kind, message).with_context(context.operation, context.provider)
}

/// S3-family service error codes (shared by S3-compatible providers)
fn kind_for_code(code: &str) -> Option<ErrorKind> {
    let kind = match code {
        "AccessDenied"
        | "AllAccessDisabled"
        | "AccountProblem"
        | "ExpiredToken"
        | "InvalidAccessKeyId"
        | "InvalidSecurity"
        | "InvalidToken"
        | "RequestTimeTooSkewed"
        | "SignatureDoesNotMatch"
        | "TokenRefreshRequired"
        | "Unauthorized"
        | "Forbidden" => ErrorKind::Auth,

        "NoSuchBucket" | "NoSuchKey" | "NoSuchUpload" | "NoSuchVersion" | "NotFound" => {
            ErrorKind::NotFound
        }

        "EntityTooLarge"
        | "MaxMessageLengthExceeded"
        | "MetadataTooLarge"
        | "QuotaExceeded"
        | "ServiceQuotaExceeded"
        | "SlowDown"
        | "Throttling"
        | "TooManyBuckets"
        | "TooManyRequests" => ErrorKind::Quota,

        "BadDigest"
        | "EntityTooSmall"
        | "IncompleteBody"
        | "InvalidArgument"
        | "InvalidBucketName"
        | "InvalidDigest"
        | "InvalidRequest"
        | "InvalidStorageClass"
        | "KeyTooLongError"
        | "MalformedACLError"
        | "MalformedXML"
        | "MissingContentLength"
        | "UnexpectedContent" => ErrorKind::Validation,

        "RequestTimeout" | "ServiceUnavailable" => ErrorKind::Network,

        _ => return None,
    };
    Some(kind)
}

fn kind_for_status(status: u16) -> Option<ErrorKind> {
    match status {
        401 | 403 => Some(ErrorKind::Auth),
        404 => Some(ErrorKind::NotFound),
        408 | 502 | 503 | 504 => Some(ErrorKind::Network),
        413 | 429 | 507 => Some(ErrorKind::Quota),
        400 | 411 | 414 | 416 | 422 => Some(ErrorKind::Validation),
        _ => None,
    }
}
