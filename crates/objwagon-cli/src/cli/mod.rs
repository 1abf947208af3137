//! CLI for the objwagon artifact transport.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use objwagon_core::config::{self, RetryConfig, WagonConfig};
use objwagon_core::store::BackendKind;
use objwagon_core::Wagon;
use std::path::PathBuf;

use commands::{
    run_checksum, run_deploy, run_exists, run_get, run_list, run_newer, run_put, run_validate,
};

/// Top-level CLI for objwagon.
#[derive(Debug, Parser)]
#[command(name = "objwagon")]
#[command(about = "objwagon: move build artifacts to and from S3/GCS buckets", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides for the `[repository]` and `[retry]` config sections.
#[derive(Debug, Default, Args)]
pub struct RepoArgs {
    /// Config file to use instead of ~/.config/objwagon/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Storage backend.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Bucket name (directory for the fs backend).
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Prefix prepended to every resource name.
    #[arg(long, global = true, value_name = "PREFIX")]
    pub base_directory: Option<String>,

    /// Provider endpoint URL (emulators, S3-compatible services).
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Environment variable holding a bearer token.
    #[arg(long, global = true, value_name = "VAR")]
    pub token_env: Option<String>,

    /// Attempts per transfer, including the first.
    #[arg(long, global = true, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Fixed wait between attempts, in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub backoff_secs: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    Gcs,
    S3,
    Fs,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Gcs => BackendKind::Gcs,
            BackendArg::S3 => BackendKind::S3,
            BackendArg::Fs => BackendKind::Fs,
        }
    }
}

impl RepoArgs {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, cfg: &mut WagonConfig) {
        let repo = &mut cfg.repository;
        if let Some(b) = self.backend {
            repo.backend = b.into();
        }
        if let Some(b) = &self.bucket {
            repo.bucket = b.clone();
        }
        if let Some(d) = &self.base_directory {
            repo.base_directory = d.clone();
        }
        if let Some(e) = &self.endpoint {
            repo.endpoint = Some(e.clone());
        }
        if let Some(t) = &self.token_env {
            repo.token_env = Some(t.clone());
        }
        if self.max_attempts.is_some() || self.backoff_secs.is_some() {
            let base = cfg.retry.clone();
            let default_profile = objwagon_core::retry::RetryPolicy::for_backend(repo.backend);
            cfg.retry = Some(RetryConfig {
                max_attempts: self
                    .max_attempts
                    .or(base.as_ref().map(|r| r.max_attempts))
                    .unwrap_or(default_profile.max_attempts),
                backoff_secs: self
                    .backoff_secs
                    .or(base.as_ref().map(|r| r.backoff_secs))
                    .unwrap_or(default_profile.backoff.as_secs_f64()),
            });
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a resource.
    Get {
        /// Resource name, relative to the base directory.
        name: String,
        /// Local destination (default: the resource's file name in the current directory).
        dest: Option<PathBuf>,
        /// Print the SHA-256 of the downloaded bytes.
        #[arg(long)]
        sha256: bool,
    },

    /// Upload a local file.
    Put {
        /// Local file to upload.
        source: PathBuf,
        /// Resource name (default: the file's name).
        name: Option<String>,
        /// Print the SHA-256 of the uploaded bytes.
        #[arg(long)]
        sha256: bool,
    },

    /// Check whether a resource exists.
    Exists {
        /// Resource name.
        name: String,
    },

    /// List a directory recursively.
    List {
        /// Directory, relative to the base directory.
        #[arg(default_value = "")]
        dir: String,
    },

    /// Check whether the remote copy changed after a timestamp.
    Newer {
        /// Resource name.
        name: String,
        /// Unix timestamp in milliseconds.
        timestamp_ms: i64,
    },

    /// Check that a local XML file is well-formed (no upload).
    Validate {
        /// XML file to check.
        path: PathBuf,
    },

    /// Upload every file under a directory, metadata files last.
    Deploy {
        /// Local directory to upload.
        dir: PathBuf,
        /// Prefix for resource names (e.g. "com/acme/widget/1.0/").
        #[arg(long, default_value = "")]
        prefix: String,
        /// Upload up to N files concurrently (default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },

    /// Compute SHA-256 of a local file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

fn load_config(repo: &RepoArgs) -> Result<WagonConfig> {
    let mut cfg = match &repo.config {
        Some(path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    repo.apply(&mut cfg);
    tracing::debug!("effective config: {:?}", cfg);
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Local-only commands need no repository.
        match &cli.command {
            CliCommand::Validate { path } => return run_validate(path).await,
            CliCommand::Checksum { path } => return run_checksum(path).await,
            _ => {}
        }

        let cfg = load_config(&cli.repo)?;
        let wagon = Wagon::connect(&cfg)?;

        match cli.command {
            CliCommand::Get { name, dest, sha256 } => run_get(&wagon, name, dest, sha256).await?,
            CliCommand::Put {
                source,
                name,
                sha256,
            } => run_put(&wagon, source, name, sha256).await?,
            CliCommand::Exists { name } => run_exists(&wagon, name).await?,
            CliCommand::List { dir } => run_list(&wagon, dir).await?,
            CliCommand::Newer { name, timestamp_ms } => {
                run_newer(&wagon, name, timestamp_ms).await?
            }
            CliCommand::Deploy { dir, prefix, jobs } => {
                let jobs = jobs.unwrap_or(cfg.max_parallel_transfers);
                run_deploy(&wagon, dir, prefix, jobs).await?
            }
            CliCommand::Validate { .. } | CliCommand::Checksum { .. } => {}
        }

        wagon.disconnect();
        Ok(())
    }
}

#[cfg(test)]
mod tests;
