//! Ingestion configuration
//!
//! Read from a JSON file (`config.json` by default), then overridden by
//! environment variables, then validated. Key names follow the files the
//! ingestion service already uses; `adme_endpoint` and `adme_credentials`
//! are accepted as aliases.
//!
//! | Key | Env override |
//! |---|---|
//! | `endpoint` | `OSDU_ENDPOINT` |
//! | `credentials.access_token` | `OSDU_ACCESS_TOKEN` |
//! | `data_partition_id` | `OSDU_DATA_PARTITION_ID` |
//! | `max_concurrent_uploads` | `OSDU_MAX_CONCURRENT_UPLOADS` |
//! | `connection_string` | `OSDU_CONNECTION_STRING` |
//! | `container_name` | `OSDU_CONTAINER_NAME` |
//! | `content_root` | `OSDU_CONTENT_ROOT` |
//! | `retry.max_attempts` | `OSDU_RETRY_MAX_ATTEMPTS` |
//! | `retry.delay` | `OSDU_RETRY_DELAY_SECS` |
//! | `output_dir` | `OSDU_OUTPUT_DIR` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::retry::{RetryPolicy, DEFAULT_DELAY_SECS, DEFAULT_MAX_ATTEMPTS};

// ============================================================================
// Configuration Constants
// ============================================================================

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 5;
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_OUTPUT_DIR: &str = "./data";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds between attempts
    #[serde(default = "default_delay")]
    pub delay: f64,
    /// Per-attempt timeout in seconds
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY_SECS as f64,
            timeout: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delay() -> f64 {
    DEFAULT_DELAY_SECS as f64
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Base URL of the data platform
    #[serde(alias = "adme_endpoint", default)]
    pub endpoint: String,

    #[serde(alias = "adme_credentials", default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub data_partition_id: String,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_uploads: usize,

    /// Object store endpoint URL; `None` means the provider default
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Bucket holding the files to ingest
    #[serde(default)]
    pub container_name: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Read content from this local directory instead of the object store
    #[serde(default)]
    pub content_root: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub dry_run: bool,

    /// Inline schema catalog, same shapes as a schemas file
    #[serde(default)]
    pub osdu_schemas: Option<Value>,

    /// Where pipeline artifacts are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            credentials: Credentials::default(),
            data_partition_id: String::new(),
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            connection_string: None,
            container_name: String::new(),
            region: default_region(),
            content_root: None,
            retry: RetrySettings::default(),
            dry_run: false,
            osdu_schemas: None,
            output_dir: default_output_dir(),
        }
    }
}

impl IngestConfig {
    /// Parse a configuration file without applying overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OsduError::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            OsduError::config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load the file when given (a missing file is an error), apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration from defaults and environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(endpoint) = var("OSDU_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(token) = var("OSDU_ACCESS_TOKEN") {
            self.credentials.access_token = token;
        }
        if let Some(partition) = var("OSDU_DATA_PARTITION_ID") {
            self.data_partition_id = partition;
        }
        if let Some(limit) = var("OSDU_MAX_CONCURRENT_UPLOADS") {
            self.max_concurrent_uploads = parse_env("OSDU_MAX_CONCURRENT_UPLOADS", &limit)?;
        }
        if let Some(connection) = var("OSDU_CONNECTION_STRING") {
            self.connection_string = Some(connection);
        }
        if let Some(container) = var("OSDU_CONTAINER_NAME") {
            self.container_name = container;
        }
        if let Some(root) = var("OSDU_CONTENT_ROOT") {
            self.content_root = Some(PathBuf::from(root));
        }
        if let Some(attempts) = var("OSDU_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env("OSDU_RETRY_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(delay) = var("OSDU_RETRY_DELAY_SECS") {
            self.retry.delay = parse_env("OSDU_RETRY_DELAY_SECS", &delay)?;
        }
        if let Some(dir) = var("OSDU_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_uploads == 0 {
            return Err(OsduError::config("max_concurrent_uploads must be at least 1"));
        }
        if !self.retry.delay.is_finite() || self.retry.delay < 0.0 {
            return Err(OsduError::config("retry.delay must be a non-negative number of seconds"));
        }
        if let Some(timeout) = self.retry.timeout {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(OsduError::config("retry.timeout must be a positive number of seconds"));
            }
        }
        self.retry_policy().validate()
    }

    /// Checks needed before talking to the data platform
    pub fn validate_remote(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(OsduError::config(
                "endpoint is not set (config 'endpoint' or OSDU_ENDPOINT)",
            ));
        }
        if self.credentials.access_token.trim().is_empty() {
            return Err(OsduError::config(
                "access token is not set (config 'credentials.access_token' or OSDU_ACCESS_TOKEN)",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs_f64(self.retry.delay.max(0.0)),
        );
        if let Some(timeout) = self.retry.timeout.filter(|t| t.is_finite() && *t > 0.0) {
            policy = policy.with_attempt_timeout(Duration::from_secs_f64(timeout));
        }
        policy
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OsduError::config(format!("{} has an invalid value: '{}'", key, value)))
}
