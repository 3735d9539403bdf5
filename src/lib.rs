//! Bifrost
//!
//! Provider-agnostic object storage uploads. One [`Bridge`] uploads single
//! files or whole batches to Amazon S3, Wasabi, any S3-compatible endpoint,
//! or an in-memory store, without provider-specific code at the call site.
//!
//! # Features
//!
//! - **Layered options**: config defaults < batch globals < per-file options
//! - **Concurrent batches**: bounded fan-out, results in submission order
//! - **Partial failure**: one file's error never aborts its siblings
//! - **Uniform errors**: every provider failure maps to a stable [`ErrorKind`]
//!
//! # Example
//!
//! ```no_run
//! use bifrost::options::{keys, Acl};
//! use bifrost::{BatchRequest, Bridge, BridgeConfig, FileSpec, Provider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::load("bifrost.yaml")?;
//!     let bridge = Bridge::open(config).await?;
//!
//!     let batch = BatchRequest::new(vec![
//!         FileSpec::from_path("./image/aand.png", "aand.png"),
//!         FileSpec::from_path("./image/sammy.jpg", "sammy.jpg").with_acl(Acl::Private),
//!     ])
//!     .with_global_option(keys::ACL, Acl::PublicRead);
//!
//!     for result in bridge.upload_multi_file(batch).await? {
//!         println!("{} -> {}", result.name, result.preview);
//!     }
//!
//!     bridge.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod options;
pub mod provider;
pub mod upload;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeState, MultiUploadError};
pub use config::{BridgeConfig, ConfigError, Provider};
pub use error::{BridgeError, ErrorKind};
pub use options::{Acl, OptionMap, OptionValue};
pub use upload::{BatchOutcome, BatchRequest, FileSpec, Indexed, UploadResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
