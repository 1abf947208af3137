//! Object-store capability and backends.
//!
//! The wagon talks to storage only through [`ObjectStore`]: metadata lookup,
//! one-level listing, streaming download and streaming upload. Backends
//! translate their native failures into [`ProviderError`] so a single
//! classifier maps them for every provider.

mod error;
mod fs;
pub mod http;
mod memory;

pub use error::{ProviderError, StoreError};
pub use fs::FsStore;
pub use memory::{Fault, MemoryStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Content type for structured metadata documents.
pub const XML_CONTENT_TYPE: &str = "application/xml";
/// Content type for everything else.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Storage provider behind a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    S3,
    #[default]
    Gcs,
    /// Local directory standing in for a bucket.
    Fs,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::Fs => "fs",
        };
        f.write_str(s)
    }
}

/// Metadata fields a caller needs; backends may fetch only these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Size,
    Updated,
    ContentType,
}

/// Object metadata. Fields not requested (or not reported) are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: Option<u64>,
    /// Last update time in milliseconds since the Unix epoch.
    pub updated_ms: Option<i64>,
    pub content_type: Option<String>,
}

/// One entry of a single-level listing. Names are full object keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ListEntry {
    Object(String),
    /// Nested "directory"; always ends with `/`.
    Prefix(String),
}

impl ListEntry {
    pub fn name(&self) -> &str {
        match self {
            ListEntry::Object(n) | ListEntry::Prefix(n) => n,
        }
    }
}

/// Capability interface over an object store.
///
/// Implementations are shared by concurrent transfers through an `Arc`, so
/// they must be safe to call from several threads at once.
pub trait ObjectStore: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Metadata for `key`, or `None` if no such object exists.
    fn metadata(
        &self,
        key: &str,
        fields: &[MetadataField],
    ) -> Result<Option<ObjectMetadata>, StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.metadata(key, &[])?.is_some())
    }

    /// Objects and nested prefixes directly under `prefix`, using `/` as delimiter.
    fn list(&self, prefix: &str) -> Result<Vec<ListEntry>, StoreError>;

    /// Stream the object's bytes into `sink`.
    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<(), StoreError>;

    /// Store `size` bytes read from `source` under `key`.
    fn upload(
        &self,
        key: &str,
        content_type: &str,
        source: &mut dyn Read,
        size: u64,
    ) -> Result<(), StoreError>;
}

/// Content type inferred from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".xml") {
        XML_CONTENT_TYPE
    } else {
        BINARY_CONTENT_TYPE
    }
}

/// Append `/` unless `s` is empty or already ends with one.
pub fn ensure_trailing_slash(s: &str) -> String {
    if s.is_empty() || s.ends_with('/') {
        s.to_string()
    } else {
        format!("{}/", s)
    }
}

/// Split `names` under `prefix` into direct children, collapsing deeper
/// names into their first-level prefix. Shared by backends without a
/// native delimiter.
pub(crate) fn one_level<'a>(
    prefix: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<ListEntry> {
    let mut out = std::collections::BTreeSet::new();
    for name in names {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        match rest.find('/') {
            Some(i) => {
                out.insert(ListEntry::Prefix(format!("{}{}", prefix, &rest[..=i])));
            }
            None => {
                out.insert(ListEntry::Object(name.to_string()));
            }
        }
    }
    out.into_iter().collect()
}
