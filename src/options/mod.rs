//! Upload options
//!
//! Options are an open, string-keyed map of tagged values. A small set of
//! well-known keys (see [`keys`]) get typed accessors; any other key is carried
//! through to the provider adapter untouched.
//!
//! # Example
//!
//! ```
//! use bifrost::options::{keys, Acl, OptionMap};
//!
//! let opts = OptionMap::new()
//!     .with(keys::ACL, Acl::PublicRead)
//!     .with_metadata([("originalname", "aand.png")]);
//!
//! assert_eq!(opts.acl(), Some(Acl::PublicRead));
//! assert_eq!(opts.metadata().unwrap()["originalname"], "aand.png");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

mod resolver;

pub use resolver::{resolve, EffectiveOptions};

/// Well-known option keys
pub mod keys {
    /// Canned ACL, an [`Acl`](super::Acl)
    pub const ACL: &str = "acl";
    /// User metadata, a string map
    pub const METADATA: &str = "metadata";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CACHE_CONTROL: &str = "cache-control";
    pub const CONTENT_DISPOSITION: &str = "content-disposition";
    pub const CONTENT_ENCODING: &str = "content-encoding";
    /// Destination bucket override
    pub const BUCKET: &str = "bucket";
    /// Upload timeout in whole seconds
    pub const TIMEOUT: &str = "timeout";
}

/// Canned access control list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl Acl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::AuthenticatedRead => "authenticated-read",
            Acl::BucketOwnerRead => "bucket-owner-read",
            Acl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Acl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Acl::Private),
            "public-read" => Ok(Acl::PublicRead),
            "public-read-write" => Ok(Acl::PublicReadWrite),
            "authenticated-read" => Ok(Acl::AuthenticatedRead),
            "bucket-owner-read" => Ok(Acl::BucketOwnerRead),
            "bucket-owner-full-control" => Ok(Acl::BucketOwnerFullControl),
            other => Err(format!("unknown ACL '{}'", other)),
        }
    }
}

/// A single option value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Acl(Acl),
    Metadata(BTreeMap<String, String>),
    Text(String),
    Integer(i64),
    Flag(bool),
}

impl From<Acl> for OptionValue {
    fn from(acl: Acl) -> Self {
        OptionValue::Acl(acl)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Integer(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Flag(v)
    }
}

impl From<BTreeMap<String, String>> for OptionValue {
    fn from(map: BTreeMap<String, String>) -> Self {
        OptionValue::Metadata(map)
    }
}

impl From<HashMap<String, String>> for OptionValue {
    fn from(map: HashMap<String, String>) -> Self {
        OptionValue::Metadata(map.into_iter().collect())
    }
}

/// String-keyed option map with deterministic iteration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
    entries: BTreeMap<String, OptionValue>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert of the `metadata` key
    pub fn with_metadata<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.with(keys::METADATA, map)
    }

    /// Insert or replace a value, returning the previous one
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Text value for `key`, if it holds text
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(OptionValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The canned ACL. Accepts the typed variant or its textual form.
    pub fn acl(&self) -> Option<Acl> {
        match self.entries.get(keys::ACL) {
            Some(OptionValue::Acl(acl)) => Some(*acl),
            Some(OptionValue::Text(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        match self.entries.get(keys::METADATA) {
            Some(OptionValue::Metadata(map)) => Some(map),
            _ => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.text(keys::CONTENT_TYPE)
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.text(keys::CACHE_CONTROL)
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.text(keys::CONTENT_DISPOSITION)
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.text(keys::CONTENT_ENCODING)
    }

    pub fn bucket(&self) -> Option<&str> {
        self.text(keys::BUCKET).filter(|b| !b.is_empty())
    }

    /// Upload timeout. Non-positive values are treated as unset.
    pub fn timeout(&self) -> Option<Duration> {
        match self.entries.get(keys::TIMEOUT) {
            Some(OptionValue::Integer(secs)) if *secs > 0 => {
                Some(Duration::from_secs(*secs as u64))
            }
            _ => None,
        }
    }
}

/// A well-known key holding a value its accessor cannot interpret
#[derive(Error, Debug, Clone, PartialEq)]
#[error("option '{key}' has an invalid value {value:?}: {expected}")]
pub struct OptionError {
    pub key: &'static str,
    pub value: OptionValue,
    pub expected: &'static str,
}

impl OptionMap {
    /// Check that every present well-known key is usable by its accessor
    ///
    /// Unknown keys are never inspected.
    pub fn check(&self) -> Result<(), OptionError> {
        let reject = |key: &'static str, expected: &'static str| match self.entries.get(key) {
            Some(value) => Err(OptionError {
                key,
                value: value.clone(),
                expected,
            }),
            None => Ok(()),
        };

        if self.acl().is_none() {
            reject(keys::ACL, "a canned ACL such as \"public-read\"")?;
        }
        if self.timeout().is_none() {
            reject(keys::TIMEOUT, "a positive number of seconds")?;
        }
        if self.metadata().is_none() {
            reject(keys::METADATA, "a string map")?;
        }
        if self.bucket().is_none() {
            reject(keys::BUCKET, "a non-empty bucket name")?;
        }
        for key in [
            keys::CONTENT_TYPE,
            keys::CACHE_CONTROL,
            keys::CONTENT_DISPOSITION,
            keys::CONTENT_ENCODING,
        ] {
            if self.text(key).is_none() {
                reject(key, "text")?;
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<'a> IntoIterator for &'a OptionMap {
    type Item = (&'a String, &'a OptionValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, OptionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
