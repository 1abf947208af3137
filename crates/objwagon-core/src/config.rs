use crate::store::BackendKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry overrides (optional section in config.toml). When absent, the
/// backend's profile applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Fixed delay in seconds between attempts (e.g. 0.5 = 500ms).
    pub backoff_secs: f64,
}

/// Repository the wagon connects to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// "gcs", "s3" or "fs".
    #[serde(default)]
    pub backend: BackendKind,
    /// Bucket name; for the fs backend, the directory serving as the bucket.
    pub bucket: String,
    /// Prefix prepended to every resource name, e.g. "releases/".
    #[serde(default)]
    pub base_directory: String,
    /// Override of the provider endpoint (emulators, S3-compatible services).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of an environment variable holding a bearer token.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Gcs,
            bucket: String::new(),
            base_directory: String::new(),
            endpoint: None,
            token_env: None,
        }
    }
}

impl RepositoryConfig {
    /// Bearer token from `token_env`, if the variable is set and non-empty.
    pub fn bearer_token(&self) -> Option<String> {
        let var = self.token_env.as_deref()?;
        std::env::var(var).ok().filter(|t| !t.is_empty())
    }
}

/// Global configuration loaded from `~/.config/objwagon/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagonConfig {
    /// Maximum concurrent uploads for `deploy`.
    pub max_parallel_transfers: usize,
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Optional retry overrides; if missing, backend defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for WagonConfig {
    fn default() -> Self {
        Self {
            max_parallel_transfers: 4,
            repository: RepositoryConfig::default(),
            retry: None,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("objwagon")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WagonConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WagonConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<WagonConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: WagonConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
