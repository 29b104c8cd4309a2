//! Concurrent ingestion orchestrator
//!
//! Drives ingestion tasks through content download and remote upload with at
//! most `concurrency` tasks in flight. Uploads go through the run's
//! [`RetryPolicy`]; a task's backoff sleep keeps its slot. Every task ends as
//! exactly one [`IngestionResult`] and results come back in submission order,
//! whatever order the tasks finished in. A failing task never cancels its
//! siblings.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use osdu_common::{OsduError, Result};

use crate::client::{IngestionApi, RemoteError, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::manifest::ManifestMap;
use crate::retry::RetryPolicy;

// ============================================================================
// Tasks and content
// ============================================================================

/// Where a task's content lives. The bytes are fetched only when the task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub container: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionTask {
    pub path: String,
    pub manifest: Value,
    pub content: ContentRef,
}

impl IngestionTask {
    pub fn new(container: impl Into<String>, path: impl Into<String>, manifest: Value) -> Self {
        let path = path.into();
        Self {
            content: ContentRef {
                container: container.into(),
                path: path.clone(),
            },
            path,
            manifest,
        }
    }
}

/// Pair every listed object that has a manifest with that manifest.
///
/// Objects without a manifest are left out; task order follows `object_paths`.
pub fn select_tasks<'a>(
    container: &str,
    object_paths: impl IntoIterator<Item = &'a str>,
    manifests: &ManifestMap,
) -> Vec<IngestionTask> {
    let by_path: std::collections::HashMap<&str, &Value> = manifests
        .iter()
        .map(|(path, manifest)| (path.as_str(), manifest))
        .collect();

    object_paths
        .into_iter()
        .filter_map(|path| {
            by_path
                .get(path)
                .map(|manifest| IngestionTask::new(container, path, (*manifest).clone()))
        })
        .collect()
}

/// Fetches task content on demand.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError>;
}

/// Content served from a local directory mirroring the container layout
#[derive(Debug, Clone)]
pub struct LocalContentSource {
    root: PathBuf,
}

impl LocalContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, RemoteError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(RemoteError::ContentUnavailable(format!(
                "refusing path outside content root: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentSource for LocalContentSource {
    async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError> {
        let file = self.resolve(&content.path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| RemoteError::ContentUnavailable(format!("{}: {}", file.display(), e)))
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionOutcome {
    Success { response: Value },
    Failure { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub path: String,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: IngestionOutcome,
}

impl IngestionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, IngestionOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub results: Vec<IngestionResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl IngestionSummary {
    fn from_results(run_id: Uuid, dry_run: bool, results: Vec<IngestionResult>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let failure_count = results.len() - success_count;
        Self {
            run_id,
            dry_run,
            results,
            success_count,
            failure_count,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved ingestion results");
        Ok(())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct IngestionOrchestrator<'a> {
    api: &'a dyn IngestionApi,
    content: &'a dyn ContentSource,
    concurrency: usize,
    retry: RetryPolicy,
    progress: ProgressBar,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(
        api: &'a dyn IngestionApi,
        content: &'a dyn ContentSource,
        concurrency: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(OsduError::config("concurrency limit must be at least 1"));
        }
        retry.validate()?;

        Ok(Self {
            api,
            content,
            concurrency,
            retry,
            progress: ProgressBar::hidden(),
        })
    }

    /// Show progress on the terminal while running
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = if enabled {
            progress_bar()
        } else {
            ProgressBar::hidden()
        };
        self
    }

    pub async fn run(&self, tasks: Vec<IngestionTask>) -> IngestionSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingestion_run", %run_id);
        self.run_tasks(run_id, tasks).instrument(span).await
    }

    async fn run_tasks(&self, run_id: Uuid, tasks: Vec<IngestionTask>) -> IngestionSummary {
        let started = Instant::now();
        let total = tasks.len();
        info!(
            tasks = total,
            concurrency = self.concurrency,
            max_attempts = self.retry.max_attempts,
            "Starting ingestion"
        );

        self.progress.set_length(total as u64);
        self.progress.set_message("Ingesting");

        let mut indexed: Vec<(usize, IngestionResult)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| async move {
                let result = self.run_one(task).await;
                self.progress.inc(1);
                (index, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<IngestionResult> = indexed.into_iter().map(|(_, r)| r).collect();
        self.progress.finish_and_clear();

        let summary = IngestionSummary::from_results(run_id, false, results);
        info!(
            total = summary.total(),
            succeeded = summary.success_count,
            failed = summary.failure_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion finished"
        );
        summary
    }

    /// Downloads share the upload policy but always carry a time limit.
    fn fetch_policy(&self) -> RetryPolicy {
        let limit = self
            .retry
            .attempt_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        self.retry.with_attempt_timeout(limit)
    }

    async fn run_one(&self, task: IngestionTask) -> IngestionResult {
        let fetched = self
            .fetch_policy()
            .run(&task.path, |_| self.content.fetch(&task.content))
            .await;
        let bytes = match fetched.result {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    path = %task.path,
                    fetch_attempts = fetched.attempts,
                    error = %e,
                    "Failed to fetch content"
                );
                return failure(task.path, 0, &e);
            },
        };

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let err = RemoteError::InvalidContent(e.to_string());
                error!(path = %task.path, error = %err, "Failed to ingest");
                return failure(task.path, 0, &err);
            },
        };

        let attempted = self
            .retry
            .run(&task.path, |_| self.api.ingest(&task.manifest, &content))
            .await;

        match attempted.result {
            Ok(response) => {
                info!(path = %task.path, attempts = attempted.attempts, "Successfully ingested");
                IngestionResult {
                    path: task.path,
                    attempts: attempted.attempts,
                    outcome: IngestionOutcome::Success { response },
                }
            },
            Err(e) => {
                error!(
                    path = %task.path,
                    attempts = attempted.attempts,
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to ingest"
                );
                failure(task.path, attempted.attempts, &e)
            },
        }
    }
}

fn failure(path: String, attempts: u32, err: &RemoteError) -> IngestionResult {
    IngestionResult {
        path,
        attempts,
        outcome: IngestionOutcome::Failure {
            error: err.to_string(),
        },
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Simulated run: every task reports success and nothing leaves the process.
pub fn simulate(tasks: &[IngestionTask]) -> IngestionSummary {
    let run_id = Uuid::new_v4();
    info!(%run_id, tasks = tasks.len(), "Dry run: skipping ingestion");

    let results = tasks
        .iter()
        .map(|task| IngestionResult {
            path: task.path.clone(),
            attempts: 0,
            outcome: IngestionOutcome::Success {
                response: json!({ "dry_run": true, "message": "Ingestion simulated" }),
            },
        })
        .collect();

    IngestionSummary::from_results(run_id, true, results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fake remote: per-path scripted failures, tracks concurrent calls.
    #[derive(Default)]
    struct ScriptedApi {
        failures: Mutex<HashMap<String, Vec<RemoteError>>>,
        hang_first: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<HashMap<String, u32>>,
        latency: Duration,
    }

    impl ScriptedApi {
        fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Default::default()
            }
        }

        fn fail(self, path: &str, errors: Vec<RemoteError>) -> Self {
            self.failures.lock().unwrap().insert(path.to_string(), errors);
            self
        }

        fn calls(&self, path: &str) -> u32 {
            self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl IngestionApi for ScriptedApi {
        async fn ingest(&self, manifest: &Value, content: &str) -> std::result::Result<Value, RemoteError> {
            let path = manifest["path"].as_str().unwrap().to_string();
            *self.calls.lock().unwrap().entry(path.clone()).or_default() += 1;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let hang = {
                let mut hang_first = self.hang_first.lock().unwrap();
                match hang_first.iter().position(|p| *p == path) {
                    Some(i) => {
                        hang_first.remove(i);
                        true
                    },
                    None => false,
                }
            };
            if hang {
                // released by the per-attempt timeout
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
            }

            tokio::time::sleep(self.latency).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = {
                let mut failures = self.failures.lock().unwrap();
                failures.get_mut(&path).and_then(|errs| {
                    if errs.is_empty() {
                        None
                    } else {
                        Some(errs.remove(0))
                    }
                })
            };
            match scripted {
                Some(err) => Err(err),
                None => Ok(json!({ "path": path, "bytes": content.len() })),
            }
        }
    }

    /// Content for every path is the path itself; paths ending in `.bin` are not UTF-8.
    struct EchoContent;

    #[async_trait]
    impl ContentSource for EchoContent {
        async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError> {
            if content.path.ends_with(".bin") {
                Ok(vec![0xff, 0xfe, 0x00])
            } else if content.path.starts_with("missing/") {
                Err(RemoteError::ContentUnavailable(content.path.clone()))
            } else {
                Ok(content.path.clone().into_bytes())
            }
        }
    }

    fn tasks(n: usize) -> Vec<IngestionTask> {
        (0..n)
            .map(|i| {
                let path = format!("files/well_logs/W-{}.las", i);
                IngestionTask::new("corpus", path.clone(), json!({ "path": path }))
            })
            .collect()
    }

    fn busy() -> RemoteError {
        RemoteError::Status {
            status: 503,
            body: "busy".into(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_peak_concurrency_is_bounded() {
        let api = ScriptedApi::with_latency(Duration::from_millis(100));
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 3, policy()).unwrap();

        let summary = orchestrator.run(tasks(10)).await;

        assert_eq!(summary.success_count, 10);
        assert!(api.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(api.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_submission_order() {
        // earlier tasks are slowed by retries so they finish last
        let api = ScriptedApi::with_latency(Duration::from_millis(10))
            .fail("files/well_logs/W-0.las", vec![busy(), busy()])
            .fail("files/well_logs/W-1.las", vec![busy()]);
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 4, policy()).unwrap();

        let input = tasks(6);
        let expected: Vec<String> = input.iter().map(|t| t.path.clone()).collect();
        let summary = orchestrator.run(input).await;

        let got: Vec<String> = summary.results.iter().map(|r| r.path.clone()).collect();
        assert_eq!(got, expected);
        assert_eq!(summary.results[0].attempts, 3);
        assert_eq!(summary.results[1].attempts, 2);
        assert_eq!(summary.results[2].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_two_transient_failures() {
        let path = "files/well_logs/W-0.las";
        let api = ScriptedApi::default().fail(path, vec![busy(), busy()]);
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 2, policy()).unwrap();

        let summary = orchestrator.run(tasks(1)).await;

        assert!(summary.results[0].is_success());
        assert_eq!(summary.results[0].attempts, 3);
        assert_eq!(api.calls(path), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_do_not_stop_siblings() {
        let path = "files/well_logs/W-2.las";
        let api = ScriptedApi::default().fail(path, vec![busy(), busy(), busy(), busy()]);
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 2, policy()).unwrap();

        let summary = orchestrator.run(tasks(5)).await;

        assert_eq!(summary.total(), 5);
        assert_eq!(summary.success_count, 4);
        assert_eq!(summary.failure_count, 1);
        let failed = &summary.results[2];
        assert_eq!(failed.attempts, 3);
        assert_eq!(api.calls(path), 3);
        assert!(matches!(
            &failed.outcome,
            IngestionOutcome::Failure { error } if error.contains("503")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_attempted_once() {
        let path = "files/well_logs/W-0.las";
        let api = ScriptedApi::default().fail(
            path,
            vec![RemoteError::Status {
                status: 400,
                body: "bad manifest".into(),
            }],
        );
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 1, policy()).unwrap();

        let summary = orchestrator.run(tasks(2)).await;

        assert!(!summary.results[0].is_success());
        assert_eq!(summary.results[0].attempts, 1);
        assert_eq!(api.calls(path), 1);
        assert!(summary.results[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_upload_times_out_and_retries() {
        let path = "files/well_logs/W-0.las";
        let api = ScriptedApi::default();
        api.hang_first.lock().unwrap().push(path.to_string());
        let retry = RetryPolicy::new(3, Duration::from_secs(1))
            .with_attempt_timeout(Duration::from_secs(60));
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 1, retry).unwrap();

        let summary = orchestrator.run(tasks(1)).await;

        assert!(summary.results[0].is_success());
        assert_eq!(summary.results[0].attempts, 2);
    }

    /// `stuck/` downloads never complete; `flaky/` ones fail once with a 503.
    #[derive(Default)]
    struct StallingContent {
        fetches: Mutex<HashMap<String, u32>>,
    }

    #[async_trait]
    impl ContentSource for StallingContent {
        async fn fetch(&self, content: &ContentRef) -> std::result::Result<Vec<u8>, RemoteError> {
            let count = {
                let mut fetches = self.fetches.lock().unwrap();
                let count = fetches.entry(content.path.clone()).or_default();
                *count += 1;
                *count
            };
            if content.path.starts_with("stuck/") {
                std::future::pending::<()>().await;
            }
            if content.path.starts_with("flaky/") && count == 1 {
                return Err(busy());
            }
            Ok(content.path.clone().into_bytes())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_download_releases_its_slot() {
        let api = ScriptedApi::default();
        let content = StallingContent::default();
        let retry = RetryPolicy::new(3, Duration::from_secs(1))
            .with_attempt_timeout(Duration::from_secs(60));
        let orchestrator = IngestionOrchestrator::new(&api, &content, 1, retry).unwrap();
        let input = vec![
            IngestionTask::new("corpus", "stuck/a.las", json!({ "path": "stuck/a.las" })),
            IngestionTask::new("corpus", "files/b.las", json!({ "path": "files/b.las" })),
        ];

        let summary = tokio::time::timeout(Duration::from_secs(3600), orchestrator.run(input))
            .await
            .expect("run must finish");

        assert!(matches!(
            &summary.results[0].outcome,
            IngestionOutcome::Failure { error } if error.contains("timed out")
        ));
        assert_eq!(summary.results[0].attempts, 0);
        assert_eq!(content.fetches.lock().unwrap()["stuck/a.las"], 3);
        assert_eq!(api.calls("stuck/a.las"), 0);
        assert!(summary.results[1].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_download_bounded_without_configured_timeout() {
        let api = ScriptedApi::default();
        let content = StallingContent::default();
        let orchestrator =
            IngestionOrchestrator::new(&api, &content, 1, RetryPolicy::new(1, Duration::ZERO)).unwrap();
        let input = vec![IngestionTask::new("corpus", "stuck/a.las", json!({ "path": "stuck/a.las" }))];

        let summary = tokio::time::timeout(Duration::from_secs(3600), orchestrator.run(input))
            .await
            .expect("run must finish");

        assert_eq!(summary.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_download_failure_is_retried() {
        let api = ScriptedApi::default();
        let content = StallingContent::default();
        let orchestrator = IngestionOrchestrator::new(&api, &content, 1, policy()).unwrap();
        let input = vec![IngestionTask::new("corpus", "flaky/a.las", json!({ "path": "flaky/a.las" }))];

        let summary = orchestrator.run(input).await;

        assert!(summary.results[0].is_success());
        assert_eq!(summary.results[0].attempts, 1);
        assert_eq!(content.fetches.lock().unwrap()["flaky/a.las"], 2);
    }

    #[tokio::test]
    async fn test_content_problems_fail_without_upload() {
        let api = ScriptedApi::default();
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 2, policy()).unwrap();
        let input = vec![
            IngestionTask::new("corpus", "files/raw/blob.bin", json!({ "path": "files/raw/blob.bin" })),
            IngestionTask::new("corpus", "missing/x.las", json!({ "path": "missing/x.las" })),
        ];

        let summary = orchestrator.run(input).await;

        assert_eq!(summary.failure_count, 2);
        assert!(summary.results.iter().all(|r| r.attempts == 0));
        assert_eq!(api.calls("files/raw/blob.bin"), 0);
        assert_eq!(api.calls("missing/x.las"), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let api = ScriptedApi::default();
        let orchestrator = IngestionOrchestrator::new(&api, &EchoContent, 2, policy()).unwrap();
        let summary = orchestrator.run(Vec::new()).await;
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.success_count + summary.failure_count, 0);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let api = ScriptedApi::default();
        assert!(IngestionOrchestrator::new(&api, &EchoContent, 0, policy()).is_err());
    }

    #[test]
    fn test_simulate_reports_success_per_task() {
        let summary = simulate(&tasks(3));
        assert!(summary.dry_run);
        assert_eq!(summary.success_count, 3);
        assert!(summary.results.iter().all(|r| r.attempts == 0));
    }

    #[test]
    fn test_select_tasks_keeps_listing_order() {
        let manifests: ManifestMap = vec![
            ("b.las".to_string(), json!({"n": 2})),
            ("a.las".to_string(), json!({"n": 1})),
        ];
        let selected = select_tasks("corpus", ["a.las", "c.las", "b.las"], &manifests);
        let paths: Vec<_> = selected.iter().map(|t| t.path.as_str()).collect();
        assert_eq!(paths, vec!["a.las", "b.las"]);
        assert_eq!(selected[0].content.container, "corpus");
    }

    #[test]
    fn test_result_serialization() {
        let result = IngestionResult {
            path: "a.las".into(),
            attempts: 2,
            outcome: IngestionOutcome::Failure { error: "boom".into() },
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"path": "a.las", "attempts": 2, "status": "failure", "error": "boom"})
        );
    }

    #[tokio::test]
    async fn test_local_content_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files/logs")).unwrap();
        std::fs::write(dir.path().join("files/logs/a.las"), "~VERSION").unwrap();
        let source = LocalContentSource::new(dir.path());

        let content = ContentRef {
            container: "corpus".into(),
            path: "files/logs/a.las".into(),
        };
        assert_eq!(source.fetch(&content).await.unwrap(), b"~VERSION");

        let escape = ContentRef {
            container: "corpus".into(),
            path: "../etc/passwd".into(),
        };
        assert!(matches!(
            source.fetch(&escape).await,
            Err(RemoteError::ContentUnavailable(_))
        ));
    }
}
