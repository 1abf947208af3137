//! `objwagon put`: upload one local file.

use anyhow::{Context, Result};
use objwagon_core::checksum::StreamDigest;
use objwagon_core::progress::ProgressMeter;
use objwagon_core::Wagon;
use std::path::PathBuf;

pub async fn run_put(
    wagon: &Wagon,
    source: PathBuf,
    name: Option<String>,
    sha256: bool,
) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a resource name from {}", source.display()))?,
    };
    let total = std::fs::metadata(&source).ok().map(|m| m.len());
    let key = wagon.session().key(&name);
    let wagon = wagon.clone();
    let (bytes, digest) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut meter = ProgressMeter::new(name.clone(), total);
        let mut digest = StreamDigest::new();
        let bytes = wagon.put_resource(&source, &name, &mut |b: &[u8]| {
            meter.record(b);
            digest.update(b);
        })?;
        let stats = meter.stats();
        tracing::info!(
            resource = %name,
            bytes,
            rate = stats.bytes_per_sec() as u64,
            "upload finished"
        );
        Ok((bytes, digest.finish()))
    })
    .await??;

    println!("{} ({} bytes)", key, bytes);
    if sha256 {
        println!("{}  {}", digest.sha256, key);
    }
    Ok(())
}
