//! `objwagon get`: download one resource.

use anyhow::{Context, Result};
use objwagon_core::checksum::StreamDigest;
use objwagon_core::progress::ProgressMeter;
use objwagon_core::Wagon;
use std::path::PathBuf;

/// Last path segment of a resource name, used as the default local file name.
fn file_name_of(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|s| !s.is_empty())
}

pub async fn run_get(
    wagon: &Wagon,
    name: String,
    dest: Option<PathBuf>,
    sha256: bool,
) -> Result<()> {
    let dest = match dest {
        Some(d) => d,
        None => PathBuf::from(
            file_name_of(&name)
                .with_context(|| format!("cannot derive a file name from '{}'", name))?,
        ),
    };
    let wagon = wagon.clone();
    let (bytes, digest, dest) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut meter = ProgressMeter::new(name.clone(), None);
        let mut digest = StreamDigest::new();
        let bytes = wagon.get_resource(&name, &dest, &mut |b: &[u8]| {
            meter.record(b);
            digest.update(b);
        })?;
        tracing::info!(
            resource = %name,
            bytes,
            elapsed_secs = meter.stats().elapsed_secs,
            "download finished"
        );
        Ok((bytes, digest.finish(), dest))
    })
    .await??;

    println!("{} ({} bytes)", dest.display(), bytes);
    if sha256 {
        println!("{}  {}", digest.sha256, dest.display());
    }
    Ok(())
}
