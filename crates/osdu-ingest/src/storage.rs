//! Object store access
//!
//! [`S3Store`] lists and downloads objects from an S3-compatible bucket.
//! [`LocalStore`] serves a directory tree the same way for offline runs.
//! Both implement [`ObjectLister`] and [`ContentSource`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::{config::Region, Client};
use chrono::{DateTime, Utc};
use osdu_common::types::ObjectRecord;
use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::client::RemoteError;
use crate::config::IngestConfig;
use crate::inventory::{ListPage, ObjectLister};
use crate::orchestrator::{ContentRef, ContentSource, LocalContentSource};

// ============================================================================
// Storage configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Static keys; `None` falls back to the default AWS credential chain
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    /// Object-store settings from the ingestion config, keys from the environment.
    ///
    /// Keys: `S3_ACCESS_KEY` / `AWS_ACCESS_KEY_ID` and `S3_SECRET_KEY` /
    /// `AWS_SECRET_ACCESS_KEY`. A custom endpoint implies path-style addressing.
    pub fn from_ingest_config(config: &IngestConfig) -> Result<Self> {
        if config.container_name.trim().is_empty() {
            return Err(OsduError::config(
                "container_name is not set (config 'container_name' or OSDU_CONTAINER_NAME)",
            ));
        }

        let var = |primary: &str, fallback: &str| {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .ok()
                .filter(|v| !v.is_empty())
        };
        let endpoint = config
            .connection_string
            .clone()
            .filter(|c| !c.trim().is_empty());

        Ok(Self {
            path_style: endpoint.is_some(),
            endpoint,
            region: config.region.clone(),
            bucket: config.container_name.clone(),
            access_key: var("S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"),
            secret_key: var("S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"),
        })
    }
}

// ============================================================================
// S3
// ============================================================================

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn new(config: StorageConfig) -> Self {
        debug!(bucket = %config.bucket, endpoint = ?config.endpoint, "Initializing object store client");

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => {
                let credentials = Credentials::new(access, secret, None, None, "osdu-ingest");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            },
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, "Object store client initialized");
        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn record_from(&self, object: &aws_sdk_s3::types::Object) -> Option<ObjectRecord> {
        let key = object.key()?;
        let mut record = ObjectRecord::new(key, &self.bucket, object.size().unwrap_or(0).max(0) as u64);
        record.last_modified = object
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
        record.etag = object.e_tag().map(|e| e.trim_matches('"').to_string());
        record.blob_type = Some("BlockBlob".to_string());
        record.blob_tier = object.storage_class().map(|c| c.as_str().to_string());
        record.properties = json!({
            "contentLength": record.size,
            "etag": record.etag,
            "blobTier": record.blob_tier,
        });
        Some(record)
    }
}

#[async_trait]
impl ObjectLister for S3Store {
    fn container(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self))]
    async fn list_page(&self, prefix: &str, token: Option<String>) -> Result<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| OsduError::storage(format!("failed to list s3://{}/{}: {}", self.bucket, prefix, e)))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| self.record_from(object))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { objects, next_token })
    }

    #[instrument(skip(self))]
    async fn sub_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let mut prefixes = Vec::new();
        let mut token = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .delimiter("/")
                .set_continuation_token(token)
                .send()
                .await
                .map_err(|e| OsduError::storage(format!("failed to list s3://{}/{}: {}", self.bucket, prefix, e)))?;

            prefixes.extend(
                output
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix().map(str::to_string)),
            );

            match (output.is_truncated().unwrap_or(false), output.next_continuation_token()) {
                (true, Some(next)) => token = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(prefixes)
    }
}

#[async_trait]
impl ContentSource for S3Store {
    async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError> {
        debug!(bucket = %content.container, key = %content.path, "Downloading object");

        let response = self
            .client
            .get_object()
            .bucket(&content.container)
            .key(&content.path)
            .send()
            .await
            .map_err(|e| sdk_fetch_error(&content.path, e))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| RemoteError::Network(format!("{}: {}", content.path, e)))?
            .into_bytes();

        Ok(bytes.to_vec())
    }
}

/// Classify a failed download: no response or a throttled/5xx reply can be
/// retried, any other status (404, 403) is final.
fn sdk_fetch_error<E>(path: &str, err: SdkError<E, HttpResponse>) -> RemoteError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let detail = format!("{}: {}", path, DisplayErrorContext(&err));
    match &err {
        SdkError::ConstructionFailure(_) => RemoteError::Setup(detail),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => RemoteError::Network(detail),
        _ => fetch_status_error(err.raw_response().map(|r| r.status().as_u16()), detail),
    }
}

fn fetch_status_error(status: Option<u16>, detail: String) -> RemoteError {
    match status {
        None => RemoteError::Network(detail),
        Some(status) if status == 429 || status >= 500 => RemoteError::Status { status, body: detail },
        Some(_) => RemoteError::ContentUnavailable(detail),
    }
}

// ============================================================================
// Local directory
// ============================================================================

/// A directory tree presented as a container. Object paths are relative to `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    container: String,
    content: LocalContentSource,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            content: LocalContentSource::new(&root),
            root,
            container: container.into(),
        }
    }

    fn record_for(&self, file: &Path) -> Result<Option<ObjectRecord>> {
        let Ok(relative) = file.strip_prefix(&self.root) else {
            return Ok(None);
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = std::fs::metadata(file)?;
        let mut record = ObjectRecord::new(path, &self.container, metadata.len());
        record.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        record.creation_time = metadata.created().ok().map(DateTime::<Utc>::from);
        record.blob_type = Some("BlockBlob".to_string());
        Ok(Some(record))
    }
}

#[async_trait]
impl ObjectLister for LocalStore {
    fn container(&self) -> &str {
        &self.container
    }

    /// The whole listing fits in one page.
    async fn list_page(&self, prefix: &str, _token: Option<String>) -> Result<ListPage> {
        let mut objects = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| OsduError::storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(record) = self.record_for(entry.path())? {
                if record.path.starts_with(prefix) {
                    objects.push(record);
                }
            }
        }
        Ok(ListPage {
            objects,
            next_token: None,
        })
    }

    async fn sub_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.root.join(prefix.trim_end_matches('/'));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut prefixes: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| format!("{}{}/", prefix, entry.file_name().to_string_lossy()))
            .collect();
        prefixes.sort();
        Ok(prefixes)
    }
}

#[async_trait]
impl ContentSource for LocalStore {
    async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError> {
        self.content.fetch(content).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::inventory::collect_inventory;

    #[test]
    fn test_storage_config_from_ingest_config() {
        let config = IngestConfig {
            connection_string: Some("http://localhost:9000".to_string()),
            container_name: "corpus".to_string(),
            ..Default::default()
        };
        let storage = StorageConfig::from_ingest_config(&config).unwrap();
        assert_eq!(storage.bucket, "corpus");
        assert_eq!(storage.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(storage.path_style);
        assert_eq!(storage.region, "us-east-1");

        let aws = StorageConfig::from_ingest_config(&IngestConfig {
            container_name: "corpus".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(!aws.path_style);
    }

    #[test]
    fn test_fetch_status_classification() {
        let detail = || "files/a.las: failed".to_string();
        assert!(fetch_status_error(None, detail()).is_transient());
        assert!(fetch_status_error(Some(503), detail()).is_transient());
        assert!(fetch_status_error(Some(500), detail()).is_transient());
        assert!(fetch_status_error(Some(429), detail()).is_transient());
        assert!(matches!(
            fetch_status_error(Some(404), detail()),
            RemoteError::ContentUnavailable(_)
        ));
        assert!(matches!(
            fetch_status_error(Some(403), detail()),
            RemoteError::ContentUnavailable(_)
        ));
    }

    #[test]
    fn test_sdk_timeouts_are_transient() {
        use aws_sdk_s3::operation::get_object::GetObjectError;

        let timeout: SdkError<GetObjectError, HttpResponse> = SdkError::timeout_error("read timed out");
        let err = sdk_fetch_error("files/a.las", timeout);
        assert!(matches!(&err, RemoteError::Network(msg) if msg.starts_with("files/a.las")));
        assert!(err.is_transient());

        let setup: SdkError<GetObjectError, HttpResponse> = SdkError::construction_failure("no region");
        assert!(!sdk_fetch_error("files/a.las", setup).is_transient());
    }

    #[test]
    fn test_storage_config_needs_container() {
        assert!(StorageConfig::from_ingest_config(&IngestConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_local_store_inventory_and_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("files/Volve/well_logs")).unwrap();
        std::fs::create_dir_all(root.join("files/Volve/seismic")).unwrap();
        std::fs::write(root.join("files/Volve/readme.pdf"), "pdf").unwrap();
        std::fs::write(root.join("files/Volve/well_logs/W-1.las"), "~V").unwrap();
        std::fs::write(root.join("files/Volve/seismic/S_survey.segy"), "segy").unwrap();

        let store = LocalStore::new(root, "corpus");
        assert_eq!(
            store.sub_prefixes("files/Volve/").await.unwrap(),
            vec!["files/Volve/seismic/", "files/Volve/well_logs/"]
        );

        let inventory = collect_inventory(&store, "files/Volve/").await.unwrap();
        let paths: Vec<_> = inventory.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "files/Volve/readme.pdf",
                "files/Volve/seismic/S_survey.segy",
                "files/Volve/well_logs/W-1.las",
            ]
        );
        assert_eq!(inventory[2].size, 2);
        assert_eq!(inventory[2].container, "corpus");

        let bytes = store
            .fetch(&ContentRef {
                container: "corpus".to_string(),
                path: "files/Volve/well_logs/W-1.las".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(bytes, b"~V");
    }
}
