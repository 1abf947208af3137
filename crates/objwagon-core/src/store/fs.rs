//! Local directory used as a bucket (e.g. for `file://` style repositories).

use super::{
    BackendKind, ListEntry, MetadataField, ObjectMetadata, ObjectStore, ProviderError, StoreError,
};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const BUF_SIZE: usize = 64 * 1024;
const TEMP_PREFIX: &str = ".objwagon-";

/// Object store backed by a directory tree. Keys map to relative paths.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

/// Provider-side I/O failure, mapped to HTTP-like statuses where one fits.
fn provider_io(err: io::Error, key: &str) -> StoreError {
    let status = match err.kind() {
        io::ErrorKind::NotFound => Some(404),
        io::ErrorKind::PermissionDenied => Some(403),
        _ => None,
    };
    ProviderError::new(BackendKind::Fs, status, format!("{}: {}", key, err)).into()
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `key` under the root. `.` and `..` segments are refused so a
    /// key can never name anything outside the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut p = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ProviderError::new(
                    BackendKind::Fs,
                    Some(403),
                    format!("{}: '{}' segment not allowed in key", key, segment),
                )
                .with_code("InvalidKey")
                .into());
            }
            p.push(segment);
        }
        Ok(p)
    }
}

impl ObjectStore for FsStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Fs
    }

    fn metadata(
        &self,
        key: &str,
        _fields: &[MetadataField],
    ) -> Result<Option<ObjectMetadata>, StoreError> {
        let meta = match fs::metadata(self.path_for(key)?) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(provider_io(e, key)),
        };
        let updated_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        Ok(Some(ObjectMetadata {
            size: Some(meta.len()),
            updated_ms,
            content_type: Some(super::content_type_for(key).to_string()),
        }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ListEntry>, StoreError> {
        let (dir_part, name_prefix) = match prefix.rfind('/') {
            Some(i) => (&prefix[..=i], &prefix[i + 1..]),
            None => ("", prefix),
        };
        let dir = self.path_for(dir_part)?;
        let read_dir = match fs::read_dir(&dir) {
            Ok(r) => r,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(provider_io(e, prefix)),
        };
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| provider_io(e, prefix))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(TEMP_PREFIX) || !name.starts_with(name_prefix) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| provider_io(e, prefix))?;
            if file_type.is_dir() {
                entries.push(ListEntry::Prefix(format!("{}{}/", dir_part, name)));
            } else {
                entries.push(ListEntry::Object(format!("{}{}", dir_part, name)));
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<(), StoreError> {
        let mut file = File::open(self.path_for(key)?).map_err(|e| provider_io(e, key))?;
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|e| provider_io(e, key))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])?;
        }
        Ok(())
    }

    fn upload(
        &self,
        key: &str,
        _content_type: &str,
        source: &mut dyn Read,
        _size: u64,
    ) -> Result<(), StoreError> {
        let final_path = self.path_for(key)?;
        let parent = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).map_err(|e| provider_io(e, key))?;

        // Write next to the target and rename, so readers never see a partial object.
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&parent)
            .map_err(|e| provider_io(e, key))?;
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            temp.write_all(&buf[..n]).map_err(|e| provider_io(e, key))?;
        }
        temp.as_file().sync_all().map_err(|e| provider_io(e, key))?;
        temp.persist(&final_path)
            .map_err(|e| provider_io(e.error, key))?;
        Ok(())
    }
}
