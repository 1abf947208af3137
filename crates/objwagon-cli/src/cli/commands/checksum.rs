//! Checksum command: compute SHA-256 of a local file.

use anyhow::Result;
use objwagon_core::checksum;
use std::path::Path;

/// Compute and print SHA-256 of the given file, in `sha256sum` format.
pub async fn run_checksum(path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::sha256_path(&owned)).await??;
    println!("{}  {}", digest.sha256, path.display());
    Ok(())
}
