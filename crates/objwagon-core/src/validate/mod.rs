//! Pre-upload validation of XML payloads.
//!
//! A corrupt `maven-metadata.xml` in a repository breaks every consumer, so
//! XML files are copied aside and parsed end to end before they are uploaded.
//! The copy is what gets uploaded; the caller's file is only ever read.

mod error;
mod xml;

pub use error::WellFormedError;
pub use xml::check_well_formed;

use crate::retry::TransferError;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const TEMP_PREFIX: &str = "xmlvalidator";

/// A validated copy of an upload source. The temp file is removed on drop.
#[derive(Debug)]
pub struct ValidatedSource {
    path: TempPath,
}

impl ValidatedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Validates XML sources before upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlValidator;

impl XmlValidator {
    pub fn new() -> Self {
        Self
    }

    /// Copy `source` to a temp file and check that the copy is well-formed.
    ///
    /// On success the copy is returned for upload. On failure the error
    /// names the copy, which is kept on disk for inspection.
    pub fn validated_source(
        &self,
        key: &str,
        source: &Path,
    ) -> Result<ValidatedSource, TransferError> {
        let copy = copy_to_temp(source).map_err(|e| {
            TransferError::failed_with(
                key,
                format!(
                    "Failed to copy source to temporary file prior to validation: {}",
                    source.display()
                ),
                e,
            )
        })?;

        let file = File::open(&copy).map_err(|e| {
            TransferError::failed_with(
                key,
                format!("Failed to validate xml file: {}", copy.display()),
                e,
            )
        })?;

        match check_well_formed(BufReader::new(file)) {
            Ok(()) => {
                tracing::debug!(key, copy = %copy.display(), "xml payload is well-formed");
                Ok(ValidatedSource { path: copy })
            }
            Err(e) => {
                let kept = keep(copy);
                tracing::warn!(key, copy = %kept.display(), error = %e, "rejecting malformed xml");
                Err(TransferError::failed_with(key, failure_message(key, &kept), e))
            }
        }
    }
}

fn copy_to_temp(source: &Path) -> io::Result<TempPath> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&name)
        .tempfile()?;
    let mut src = File::open(source)?;
    io::copy(&mut src, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    Ok(temp.into_temp_path())
}

fn keep(copy: TempPath) -> PathBuf {
    let path = copy.to_path_buf();
    if let Err(e) = copy.keep() {
        tracing::debug!(error = %e, "could not keep rejected xml copy");
    }
    path
}

fn failure_message(key: &str, copy: &Path) -> String {
    if key.contains("maven-metadata") {
        format!(
            "Received maven-metadata that is not valid xml: {}. \
             If this is your first time seeing this issue, please try to rebuild.",
            copy.display()
        )
    } else {
        format!(
            "Received xml file for upload: {} is not valid xml!",
            copy.display()
        )
    }
}
