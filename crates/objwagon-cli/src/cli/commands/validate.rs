//! `objwagon validate`: well-formedness check of a local XML file.

use anyhow::{Context, Result};
use objwagon_core::validate::check_well_formed;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub async fn run_validate(path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = File::open(&owned).with_context(|| format!("open {}", owned.display()))?;
        check_well_formed(BufReader::new(file))
            .with_context(|| format!("{} is not valid xml", owned.display()))?;
        Ok(())
    })
    .await??;
    println!("{}: ok", path.display());
    Ok(())
}
