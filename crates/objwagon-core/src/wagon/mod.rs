//! Repository transport: existence checks, listings, and retried get/put.
//!
//! Every get/put runs under the session's [`RetryPolicy`] with its own
//! [`RetryableProgress`], so the caller's listener sees each byte once no
//! matter how many attempts the transfer needed. Metadata calls (exists,
//! newer, list) are single requests; their failures are classified but not
//! retried.

mod session;

pub use session::Session;

use crate::config::WagonConfig;
use crate::progress::{
    ProgressListener, ProgressReader, ProgressWriter, RetryableProgress, TransferProgress,
};
use crate::retry::{
    classify, classify_store, run_with_retry, AttemptObserver, Operation, RetryPolicy,
    TracingObserver, TransferError,
};
use crate::store::{content_type_for, ensure_trailing_slash, ListEntry, MetadataField, StoreError};
use crate::validate::XmlValidator;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Transport over one repository session.
#[derive(Clone)]
pub struct Wagon {
    session: Session,
    policy: RetryPolicy,
    observer: Arc<dyn AttemptObserver>,
    validator: XmlValidator,
}

impl Wagon {
    /// Wagon over an existing session, with the backend's default retry profile.
    pub fn new(session: Session) -> Self {
        let policy = RetryPolicy::for_backend(session.backend());
        Self {
            session,
            policy,
            observer: Arc::new(TracingObserver),
            validator: XmlValidator::new(),
        }
    }

    /// Open the configured repository. `[retry]` overrides the backend profile.
    pub fn connect(cfg: &WagonConfig) -> anyhow::Result<Self> {
        let session = Session::open(&cfg.repository)?;
        let wagon = Self::new(session);
        let policy = wagon.policy.with_config(cfg.retry.as_ref());
        tracing::info!(
            backend = %wagon.session.backend(),
            bucket = wagon.session.bucket(),
            base_directory = wagon.session.base_directory(),
            max_attempts = policy.max_attempts,
            backoff_secs = policy.backoff.as_secs_f64(),
            "connected to repository"
        );
        Ok(wagon.with_policy(policy))
    }

    /// Close the session. Clones made for concurrent transfers keep the store alive until dropped.
    pub fn disconnect(self) {
        tracing::debug!(bucket = self.session.bucket(), "disconnected from repository");
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether the resource exists. A missing object is `false`, not an error.
    pub fn resource_exists(&self, name: &str) -> Result<bool, TransferError> {
        let key = self.session.key(name);
        match self.session.store().metadata(&key, &[]) {
            Ok(meta) => Ok(meta.is_some()),
            Err(StoreError::Provider(p)) if p.status == Some(404) => Ok(false),
            Err(e) => Err(classify_store(e, &key, Operation::Access)),
        }
    }

    /// Whether the remote copy was updated after `timestamp_ms` (Unix millis).
    ///
    /// An object without an update time counts as newer.
    pub fn is_remote_newer(&self, name: &str, timestamp_ms: i64) -> Result<bool, TransferError> {
        let key = self.session.key(name);
        let meta = self
            .session
            .store()
            .metadata(&key, &[MetadataField::Updated])
            .map_err(|e| classify_store(e, &key, Operation::Access))?
            .ok_or_else(|| TransferError::not_found(&key))?;
        Ok(meta.updated_ms.map_or(true, |updated| updated > timestamp_ms))
    }

    /// Everything under `directory`, relative to it. Nested directories appear
    /// as `sub/` followed by their contents as `sub/<entry>`.
    pub fn list_directory(&self, directory: &str) -> Result<Vec<String>, TransferError> {
        let prefix = ensure_trailing_slash(&self.session.key(directory));
        self.list_prefix(&prefix)
            .map_err(|e| classify_store(e, &prefix, Operation::Access))
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        for entry in self.session.store().list(prefix)? {
            let name = entry.name();
            let relative = name.strip_prefix(prefix).unwrap_or(name).to_string();
            if let ListEntry::Prefix(nested) = &entry {
                let children = self.list_prefix(nested)?;
                out.push(relative.clone());
                out.extend(children.into_iter().map(|c| format!("{}{}", relative, c)));
            } else {
                out.push(relative);
            }
        }
        Ok(out)
    }

    /// Download `name` to `destination`, retrying transient failures.
    ///
    /// Bytes land in `<destination>.part` and are renamed into place once the
    /// download succeeds. Returns the number of distinct bytes reported.
    pub fn get_resource(
        &self,
        name: &str,
        destination: &Path,
        listener: &mut dyn ProgressListener,
    ) -> Result<u64, TransferError> {
        let key = self.session.key(name);
        let part = part_path(destination);
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                TransferError::failed_with(
                    &key,
                    format!("Cannot write file to '{}'", destination.display()),
                    e,
                )
            })?;
        }

        let mut progress = RetryableProgress::new(|b: &[u8]| listener.transferred(b));
        let result = run_with_retry(&self.policy, &mut progress, self.observer.as_ref(), |p| {
            self.download_attempt(&key, name, destination, &part, p)
        });
        if let Err(e) = result {
            let _ = fs::remove_file(&part);
            return Err(e);
        }

        fs::rename(&part, destination).map_err(|e| {
            TransferError::failed_with(
                &key,
                format!("Cannot write file to '{}'", destination.display()),
                e,
            )
        })?;
        let bytes = progress.state().total_bytes_seen;
        tracing::debug!(key = %key, bytes, destination = %destination.display(), "download complete");
        Ok(bytes)
    }

    fn download_attempt<P: TransferProgress + ?Sized>(
        &self,
        key: &str,
        name: &str,
        destination: &Path,
        part: &Path,
        progress: &mut P,
    ) -> Result<(), TransferError> {
        let store = self.session.store();
        if store
            .metadata(key, &[MetadataField::Size])
            .map_err(|e| classify_store(e, key, Operation::Read))?
            .is_none()
        {
            return Err(TransferError::not_found(key));
        }

        let file = File::create(part).map_err(|e| {
            TransferError::failed_with(
                key,
                format!("Cannot write file to '{}'", destination.display()),
                e,
            )
        })?;
        let io_failure = |e: std::io::Error| {
            TransferError::failed_with(
                key,
                format!(
                    "Cannot read from '{}' and write to '{}'",
                    name,
                    destination.display()
                ),
                e,
            )
        };

        let mut writer = ProgressWriter::new(BufWriter::new(file), progress);
        store.download(key, &mut writer).map_err(|e| match e {
            StoreError::Provider(p) => classify(&p, key, Operation::Read),
            StoreError::Io(io) => io_failure(io),
        })?;
        writer.flush().map_err(io_failure)?;
        Ok(())
    }

    /// Upload `source` as `name`, retrying transient failures.
    ///
    /// Keys ending in `.xml` are validated first; a malformed document fails
    /// without any upload attempt. Returns the number of distinct bytes reported.
    pub fn put_resource(
        &self,
        source: &Path,
        name: &str,
        listener: &mut dyn ProgressListener,
    ) -> Result<u64, TransferError> {
        let key = self.session.key(name);
        let missing = |e: std::io::Error| {
            TransferError::failed_with(&key, format!("Cannot find file: {}", source.display()), e)
        };
        fs::metadata(source).map_err(missing)?;

        let validated = if key.ends_with(".xml") {
            Some(self.validator.validated_source(&key, source)?)
        } else {
            None
        };
        let upload_path = validated.as_ref().map_or(source, |v| v.path());
        let size = fs::metadata(upload_path).map_err(missing)?.len();
        let content_type = content_type_for(&key);

        let mut progress = RetryableProgress::new(|b: &[u8]| listener.transferred(b));
        run_with_retry(&self.policy, &mut progress, self.observer.as_ref(), |p| {
            let file = File::open(upload_path).map_err(missing)?;
            let mut reader = ProgressReader::new(BufReader::new(file), p);
            self.session
                .store()
                .upload(&key, content_type, &mut reader, size)
                .map_err(|e| match e {
                    StoreError::Provider(p) => classify(&p, &key, Operation::Write),
                    StoreError::Io(io) => TransferError::failed_with(
                        &key,
                        format!(
                            "Cannot read from '{}' and write to '{}'",
                            source.display(),
                            key
                        ),
                        io,
                    ),
                })
        })?;

        let bytes = progress.state().total_bytes_seen;
        tracing::debug!(key = %key, bytes, content_type, "upload complete");
        Ok(bytes)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests;
