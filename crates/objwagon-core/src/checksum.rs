//! SHA-256 digests of artifacts, either of a local file or of the bytes a
//! transfer delivered.

use crate::progress::ProgressListener;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest of a byte stream: lowercase hex SHA-256 and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub sha256: String,
    pub size: u64,
}

/// Compute SHA-256 of a file. Reads in chunks to keep memory use bounded.
pub fn sha256_path(path: &Path) -> Result<FileDigest> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut digest = StreamDigest::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finish())
}

/// Incremental digest, usable as the downstream listener of a transfer.
///
/// Behind a `RetryableProgress` it sees each distinct byte once, so the
/// result is the digest of the object even when attempts were retried.
#[derive(Debug, Clone, Default)]
pub struct StreamDigest {
    hasher: Sha256,
    size: u64,
}

impl StreamDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
    }

    pub fn finish(self) -> FileDigest {
        FileDigest {
            sha256: hex::encode(self.hasher.finalize()),
            size: self.size,
        }
    }
}

impl ProgressListener for StreamDigest {
    fn transferred(&mut self, chunk: &[u8]) {
        self.update(chunk);
    }
}
