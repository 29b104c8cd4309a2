//! HTTP client for the OSDU data platform
//!
//! One [`AdmeClient`] is built per run and shared by reference between all
//! in-flight tasks. It holds a single `reqwest::Client` plus the bearer token
//! and partition id, and is never mutated after construction.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::IngestConfig;

/// Default timeout for a single HTTP request in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Errors
// ============================================================================

/// Whether a failed call is worth repeating
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure, timeout, 5xx, 429
    Transient,
    /// Any other rejection; repeating the call gives the same answer
    Permanent,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("content is not valid UTF-8: {0}")]
    InvalidContent(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("client setup failed: {0}")]
    Setup(String),
}

impl RemoteError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RemoteError::Network(_) | RemoteError::Timeout(_) => ErrorClass::Transient,
            RemoteError::Status { status, .. } => {
                if *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500 {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                }
            },
            RemoteError::InvalidContent(_)
            | RemoteError::InvalidResponse(_)
            | RemoteError::ContentUnavailable(_)
            | RemoteError::Setup(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            RemoteError::Setup(err.to_string())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

// ============================================================================
// Remote API seam
// ============================================================================

/// The remote ingestion call the orchestrator drives.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Upload one manifest with its text content and return the service response.
    async fn ingest(&self, manifest: &Value, content: &str) -> Result<Value, RemoteError>;
}

/// Raw answer to an administrative call
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// JSON when the body parses as JSON, otherwise the text; `None` when empty
    pub body: Option<Value>,
}

impl RawResponse {
    async fn read(response: reqwest::Response) -> Result<Self, RemoteError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };
        Ok(Self { status, body })
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct AdmeClient {
    http: Client,
    endpoint: String,
    access_token: String,
    data_partition_id: String,
}

impl AdmeClient {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
        data_partition_id: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RemoteError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            data_partition_id: data_partition_id.into(),
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, RemoteError> {
        Self::new(
            &config.endpoint,
            &config.credentials.access_token,
            &config.data_partition_id,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn data_partition_id(&self) -> &str {
        &self.data_partition_id
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    fn partitioned(&self, request: RequestBuilder) -> RequestBuilder {
        self.authorized(request)
            .header("data-partition-id", &self.data_partition_id)
    }

    /// `PUT {endpoint}/api/dataset/v1/registerDataset`
    #[instrument(skip(self, payload))]
    pub async fn register_dataset(&self, payload: &Value) -> Result<RawResponse, RemoteError> {
        let url = format!("{}/api/dataset/v1/registerDataset", self.endpoint);
        let response = self.partitioned(self.http.put(&url)).json(payload).send().await?;
        RawResponse::read(response).await
    }

    /// `POST {endpoint}/api/storage/v2/records/{id}:delete`
    #[instrument(skip(self))]
    pub async fn delete_record(&self, record_id: &str) -> Result<RawResponse, RemoteError> {
        let url = format!("{}/api/storage/v2/records/{}:delete", self.endpoint, record_id);
        let response = self
            .partitioned(self.http.post(&url))
            .header("Content-Type", "application/json")
            .send()
            .await?;
        RawResponse::read(response).await
    }
}

#[async_trait]
impl IngestionApi for AdmeClient {
    async fn ingest(&self, manifest: &Value, content: &str) -> Result<Value, RemoteError> {
        let url = format!("{}/ingest", self.endpoint);
        debug!(url = %url, bytes = content.len(), "Uploading manifest");

        let response = self
            .authorized(self.http.post(&url))
            .json(&json!({ "manifest": manifest, "content": content }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AdmeClient {
        AdmeClient::new(server.uri(), "token-123", "opendes", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_error_classes() {
        let status = |status| RemoteError::Status {
            status,
            body: String::new(),
        };
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!RemoteError::InvalidContent("bad".into()).is_transient());
        assert_eq!(status(418).status(), Some(418));
    }

    #[tokio::test]
    async fn test_ingest_posts_manifest_and_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(header("authorization", "Bearer token-123"))
            .and(body_json(json!({"manifest": {"kind": "k"}, "content": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "rec-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .ingest(&json!({"kind": "k"}), "hello")
            .await
            .unwrap();
        assert_eq!(response["id"], "rec-1");
    }

    #[tokio::test]
    async fn test_ingest_non_200_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created elsewhere"))
            .mount(&server)
            .await;

        let err = client(&server).ingest(&json!({}), "x").await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Status {
                status: 201,
                body: "created elsewhere".to_string()
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_ingest_non_json_success_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = client(&server).ingest(&json!({}), "x").await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let client =
            AdmeClient::new("http://127.0.0.1:1", "t", "p", Duration::from_secs(2)).unwrap();
        let err = client.ingest(&json!({}), "x").await.unwrap_err();
        assert!(err.is_transient(), "{err:?}");
    }

    #[tokio::test]
    async fn test_register_dataset_sends_partition_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/dataset/v1/registerDataset"))
            .and(header("data-partition-id", "opendes"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"datasetRegistries": [{"id": "opendes:dataset--File.Generic:1"}]})),
            )
            .mount(&server)
            .await;

        let response = client(&server).register_dataset(&json!({})).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(
            response.body.unwrap()["datasetRegistries"][0]["id"],
            "opendes:dataset--File.Generic:1"
        );
    }

    #[tokio::test]
    async fn test_delete_record_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/storage/v2/records/rec-9:delete"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let response = client(&server).delete_record("rec-9").await.unwrap();
        assert_eq!(response, RawResponse { status: 204, body: None });
    }
}
