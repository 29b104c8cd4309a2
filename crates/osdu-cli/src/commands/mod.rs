//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod assess_coverage;
pub mod delete;
pub mod generate_manifests;
pub mod ingest;
pub mod inventory;
pub mod pipeline;
pub mod process;
pub mod register;

use std::path::{Path, PathBuf};

use osdu_ingest::config::DEFAULT_CONFIG_FILE;
use osdu_ingest::inventory::ObjectLister;
use osdu_ingest::orchestrator::ContentSource;
use osdu_ingest::storage::{LocalStore, S3Store, StorageConfig};
use osdu_ingest::{AdmeClient, IngestConfig};
use tracing::debug;

use crate::error::{CliError, Result};

/// Options shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Load the configuration: the explicit file, else `config.json` when it
    /// exists, else defaults; then environment and command-line overrides.
    pub fn load_config(&self) -> Result<IngestConfig> {
        let path = match &self.config {
            Some(path) if !path.exists() => return Err(CliError::file_not_found(path)),
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        debug!(config = ?path, "Loading configuration");

        let mut config = IngestConfig::load(path.as_deref())?;
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(config)
    }
}

/// Input path: the explicit one, else the artifact the previous stage wrote.
pub fn input_path(explicit: Option<&Path>, config: &IngestConfig, default_file: &str) -> Result<PathBuf> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_dir.join(default_file));
    if !path.exists() {
        return Err(CliError::file_not_found(&path));
    }
    Ok(path)
}

pub fn output_path(explicit: Option<&Path>, config: &IngestConfig, default_file: &str) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_dir.join(default_file))
}

/// The configured object store
pub enum Store {
    Local(LocalStore),
    S3(S3Store),
}

impl Store {
    pub async fn open(config: &IngestConfig) -> Result<Self> {
        match &config.content_root {
            Some(root) => {
                if !root.is_dir() {
                    return Err(CliError::config(format!(
                        "content_root {} is not a directory",
                        root.display()
                    )));
                }
                let container = if config.container_name.is_empty() {
                    "local".to_string()
                } else {
                    config.container_name.clone()
                };
                Ok(Store::Local(LocalStore::new(root, container)))
            },
            None => Ok(Store::S3(S3Store::new(StorageConfig::from_ingest_config(config)?).await)),
        }
    }

    pub fn lister(&self) -> &dyn ObjectLister {
        match self {
            Store::Local(store) => store as &dyn ObjectLister,
            Store::S3(store) => store as &dyn ObjectLister,
        }
    }

    pub fn content(&self) -> &dyn ContentSource {
        match self {
            Store::Local(store) => store as &dyn ContentSource,
            Store::S3(store) => store as &dyn ContentSource,
        }
    }
}

/// Client for the data platform; fails early when endpoint or token are missing.
pub fn connect(config: &IngestConfig) -> Result<AdmeClient> {
    config.validate_remote()?;
    Ok(AdmeClient::from_config(config)?)
}
