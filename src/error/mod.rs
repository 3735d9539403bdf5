//! Bridge error taxonomy
//!
//! Every failure surfaced by the bridge is a [`BridgeError`] with a closed
//! [`ErrorKind`]. Kinds carry stable string and numeric codes, so callers can
//! branch on the failure category the same way for every provider.
//!
//! Provider sessions report failures as [`RawError`]; the
//! [`classifier`] maps those onto kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{ConfigError, Provider};

pub mod classifier;

pub use classifier::{classify, ErrorContext};

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Invalid bridge configuration
    Config,
    /// Operation attempted while the bridge is not connected
    NotConnected,
    /// Malformed upload input
    Validation,
    /// Local file could not be opened or read
    Io,
    Auth,
    NotFound,
    Network,
    /// Quota, rate or size limit exceeded
    Quota,
    /// Unrecognized provider failure
    Provider,
    /// File was never dispatched because the batch was cancelled
    Cancelled,
}

impl ErrorKind {
    /// Stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG_ERROR",
            ErrorKind::NotConnected => "NOT_CONNECTED",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Quota => "QUOTA_ERROR",
            ErrorKind::Provider => "PROVIDER_ERROR",
            ErrorKind::Cancelled => "CANCELLED",
        }
    }

    /// Stable numeric code
    pub fn numeric_code(&self) -> u16 {
        match self {
            ErrorKind::Config => 1001,
            ErrorKind::NotConnected => 1002,
            ErrorKind::Validation => 1003,
            ErrorKind::Io => 1004,
            ErrorKind::Auth => 1005,
            ErrorKind::NotFound => 1006,
            ErrorKind::Network => 1007,
            ErrorKind::Quota => 1008,
            ErrorKind::Provider => 1009,
            ErrorKind::Cancelled => 1010,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Bridge operation an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    Put,
    Delete,
    Disconnect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Put => "put",
            Operation::Delete => "delete",
            Operation::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified bridge failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}: {}", .kind.code(), .message)]
pub struct BridgeError {
    kind: ErrorKind,
    message: String,
    operation: Option<Operation>,
    provider: Option<Provider>,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            operation: None,
            provider: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn not_connected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConnected, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Attach the operation and provider the error came from
    pub fn with_context(mut self, operation: Operation, provider: Provider) -> Self {
        self.operation = Some(operation);
        self.provider = Some(provider);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable string code of the error kind
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn numeric_code(&self) -> u16 {
        self.kind.numeric_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn provider(&self) -> Option<Provider> {
        self.provider
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::config(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::io(err.to_string())
    }
}

/// Unclassified failure reported by a provider session
#[derive(Error, Debug)]
pub enum RawError {
    /// The service answered with an error response
    #[error("{message}")]
    Service {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl RawError {
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        RawError::Service {
            status: Some(status),
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        RawError::Other(message.into())
    }
}
