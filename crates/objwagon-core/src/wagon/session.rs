//! Connection state: which store, which bucket, which base directory.

use crate::config::RepositoryConfig;
use crate::store::http::{GcsStore, S3Store, GCS_ENDPOINT, S3_ENDPOINT};
use crate::store::{BackendKind, FsStore, ObjectStore};
use anyhow::{bail, Result};
use std::fmt;
use std::sync::Arc;

/// An open connection to one repository.
///
/// Cloning is cheap; clones share the store handle, so concurrent transfers
/// of distinct resources can each hold one.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    base_directory: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.store.kind())
            .field("bucket", &self.bucket)
            .field("base_directory", &self.base_directory)
            .finish()
    }
}

impl Session {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        base_directory: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            base_directory: base_directory.into(),
        }
    }

    /// Build the store described by `repo` and wrap it in a session.
    pub fn open(repo: &RepositoryConfig) -> Result<Self> {
        if repo.bucket.is_empty() {
            bail!("repository.bucket is not set");
        }
        let token = repo.bearer_token();
        let store: Arc<dyn ObjectStore> = match repo.backend {
            BackendKind::Gcs => Arc::new(GcsStore::new(
                repo.endpoint.as_deref().unwrap_or(GCS_ENDPOINT),
                &repo.bucket,
                token,
            )?),
            BackendKind::S3 => Arc::new(S3Store::new(
                repo.endpoint.as_deref().unwrap_or(S3_ENDPOINT),
                &repo.bucket,
                token,
            )?),
            BackendKind::Fs => Arc::new(FsStore::new(&repo.bucket)),
        };
        Ok(Self::new(store, &repo.bucket, &repo.base_directory))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn backend(&self) -> BackendKind {
        self.store.kind()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn base_directory(&self) -> &str {
        &self.base_directory
    }

    /// Object key for a resource: the base directory followed by the name, verbatim.
    pub fn key(&self, resource_name: &str) -> String {
        format!("{}{}", self.base_directory, resource_name)
    }
}
