//! `objwagon deploy`: upload a directory tree through one shared session.
//!
//! Artifacts go first, metadata files (`maven-metadata*`) only after every
//! artifact landed, so readers never see metadata naming a missing file.
//! Up to `jobs` uploads run at once on the blocking pool; each has its own
//! progress tracker.

use anyhow::{bail, Context, Result};
use objwagon_core::progress::ProgressMeter;
use objwagon_core::Wagon;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;

/// A local file and the resource name it is uploaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Upload {
    pub path: PathBuf,
    pub name: String,
}

/// Regular files under `root`, sorted by resource name (`prefix` + relative path with `/`).
pub(crate) fn collect_uploads(root: &Path, prefix: &str) -> Result<Vec<Upload>> {
    let mut out = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read {}", dir.display()))?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                dirs.push(path);
            } else if file_type.is_file() {
                let rel = path.strip_prefix(root)?;
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(Upload {
                    path,
                    name: format!("{}{}", prefix, rel.join("/")),
                });
            }
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn is_metadata(name: &str) -> bool {
    name.rsplit('/')
        .next()
        .is_some_and(|f| f.starts_with("maven-metadata"))
}

/// Split into (artifacts, metadata), keeping order.
pub(crate) fn partition_metadata(uploads: Vec<Upload>) -> (Vec<Upload>, Vec<Upload>) {
    uploads.into_iter().partition(|u| !is_metadata(&u.name))
}

/// Upload `batch` with at most `jobs` in flight. Returns the names that failed.
async fn upload_batch(wagon: &Wagon, batch: Vec<Upload>, jobs: usize) -> Result<Vec<String>> {
    let jobs = jobs.max(1);
    let mut pending = batch.into_iter();
    let mut join_set = JoinSet::new();
    let mut failed = Vec::new();

    loop {
        while join_set.len() < jobs {
            let Some(upload) = pending.next() else {
                break;
            };
            let wagon = wagon.clone();
            join_set.spawn_blocking(move || {
                let total = fs::metadata(&upload.path).ok().map(|m| m.len());
                let mut meter = ProgressMeter::new(upload.name.clone(), total);
                let result = wagon.put_resource(&upload.path, &upload.name, &mut meter);
                (upload.name, result)
            });
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        let (name, result) = res?;
        match result {
            Ok(bytes) => println!("uploaded {} ({} bytes)", name, bytes),
            Err(e) => {
                tracing::warn!(resource = %name, error = %e, "upload failed");
                eprintln!("failed {}: {}", name, e);
                failed.push(name);
            }
        }
    }
    Ok(failed)
}

pub async fn run_deploy(wagon: &Wagon, dir: PathBuf, prefix: String, jobs: usize) -> Result<()> {
    let root = dir.clone();
    let uploads = tokio::task::spawn_blocking(move || collect_uploads(&root, &prefix)).await??;
    if uploads.is_empty() {
        bail!("nothing to deploy under {}", dir.display());
    }
    let (artifacts, metadata) = partition_metadata(uploads);
    tracing::info!(
        artifacts = artifacts.len(),
        metadata = metadata.len(),
        jobs,
        "starting deploy of {}",
        dir.display()
    );

    let failed = upload_batch(wagon, artifacts, jobs).await?;
    if !failed.is_empty() {
        bail!(
            "{} artifact upload(s) failed; metadata not published: {}",
            failed.len(),
            failed.join(", ")
        );
    }
    let failed = upload_batch(wagon, metadata, jobs).await?;
    if !failed.is_empty() {
        bail!("{} metadata upload(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
