//! Metadata commands: `exists`, `list`, `newer`.

use anyhow::Result;
use objwagon_core::Wagon;

pub async fn run_exists(wagon: &Wagon, name: String) -> Result<()> {
    let wagon = wagon.clone();
    let found = tokio::task::spawn_blocking(move || wagon.resource_exists(&name)).await??;
    println!("{}", found);
    Ok(())
}

pub async fn run_list(wagon: &Wagon, dir: String) -> Result<()> {
    let wagon = wagon.clone();
    let entries = tokio::task::spawn_blocking(move || wagon.list_directory(&dir)).await??;
    for entry in entries {
        println!("{}", entry);
    }
    Ok(())
}

pub async fn run_newer(wagon: &Wagon, name: String, timestamp_ms: i64) -> Result<()> {
    let wagon = wagon.clone();
    let newer =
        tokio::task::spawn_blocking(move || wagon.is_remote_newer(&name, timestamp_ms)).await??;
    println!("{}", newer);
    Ok(())
}
