//! End-to-end pipeline
//!
//! inventory -> process -> coverage -> manifests -> ingest, with every stage's
//! artifact written to the output directory and a final run report counting
//! what each stage produced. In dry-run mode the ingest stage is simulated
//! and no request reaches the data platform.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use osdu_common::{OsduError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::Classifier;
use crate::client::{AdmeClient, IngestionApi};
use crate::config::IngestConfig;
use crate::coverage::{CoverageReport, SchemaCatalog};
use crate::inventory::{collect_inventory, write_inventory_csv, write_raw_inventory, KindsSummary, ObjectLister};
use crate::manifest::{manifest_map, write_manifests, Grouping, ManifestBuilder};
use crate::orchestrator::{select_tasks, simulate, ContentSource, IngestionOrchestrator, IngestionSummary};
use crate::storage::{LocalStore, S3Store, StorageConfig};

pub const RAW_INVENTORY_FILE: &str = "blob_inventory.json";
pub const INVENTORY_CSV_FILE: &str = "categorized_inventory.csv";
pub const KINDS_SUMMARY_FILE: &str = "kinds_summary.json";
pub const COVERAGE_TEXT_FILE: &str = "manifest_coverage_report.txt";
pub const COVERAGE_JSON_FILE: &str = "coverage_report.json";
pub const MANIFESTS_FILE: &str = "generated_manifests.json";
pub const INGESTION_RESULTS_FILE: &str = "ingestion_results.json";
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// Counts per stage of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub inventoried: usize,
    pub classified: usize,
    pub unknown: usize,
    pub ready: usize,
    pub manifests: usize,
    pub tasks: usize,
    pub ingested: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub root_prefix: String,
    pub stages: StageCounts,
    pub coverage: Value,
    pub artifacts: Vec<PathBuf>,
}

impl RunReport {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved run report");
        Ok(())
    }
}

pub struct Pipeline {
    config: IngestConfig,
    root_prefix: String,
    grouping: Grouping,
    progress: bool,
}

impl Pipeline {
    pub fn new(config: IngestConfig, root_prefix: impl Into<String>) -> Self {
        Self {
            config,
            root_prefix: root_prefix.into(),
            grouping: Grouping::default(),
            progress: false,
        }
    }

    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Show upload progress on the terminal
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    fn output(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }

    /// Run against the store the configuration names: the local content
    /// root when set, otherwise the S3 bucket.
    pub async fn run(&self) -> Result<RunReport> {
        if !self.config.dry_run {
            self.config.validate_remote()?;
        }

        let client = if self.config.dry_run {
            None
        } else {
            Some(AdmeClient::from_config(&self.config).map_err(|e| OsduError::config(e.to_string()))?)
        };
        let api = client.as_ref().map(|c| c as &dyn IngestionApi);

        match &self.config.content_root {
            Some(root) => {
                let container = if self.config.container_name.is_empty() {
                    "local"
                } else {
                    self.config.container_name.as_str()
                };
                let store = LocalStore::new(root, container);
                self.run_with(&store, &store, api).await
            },
            None => {
                let store = S3Store::new(StorageConfig::from_ingest_config(&self.config)?).await;
                self.run_with(&store, &store, api).await
            },
        }
    }

    /// Run with explicit collaborators. `api` may be `None` only in dry-run mode.
    pub async fn run_with(
        &self,
        lister: &dyn ObjectLister,
        content: &dyn ContentSource,
        api: Option<&dyn IngestionApi>,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id, dry_run = self.config.dry_run);
        self.stages(run_id, lister, content, api).instrument(span).await
    }

    async fn stages(
        &self,
        run_id: Uuid,
        lister: &dyn ObjectLister,
        content: &dyn ContentSource,
        api: Option<&dyn IngestionApi>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        std::fs::create_dir_all(&self.config.output_dir)?;

        // Everything local is checked before the first remote call.
        let catalog = self.catalog()?;
        let classifier = Classifier::with_default_policy()
            .map_err(|e| OsduError::config(format!("invalid extraction pattern: {}", e)))?;
        let orchestrator = match (self.config.dry_run, api) {
            (true, _) => None,
            (false, Some(api)) => Some(
                IngestionOrchestrator::new(
                    api,
                    content,
                    self.config.max_concurrent_uploads,
                    self.config.retry_policy(),
                )?
                .with_progress(self.progress),
            ),
            (false, None) => {
                return Err(OsduError::config("no ingestion client configured for a live run"))
            },
        };

        let mut stages = StageCounts::default();
        let mut artifacts = Vec::new();

        info!("Starting inventory");
        let objects = collect_inventory(lister, &self.root_prefix).await?;
        stages.inventoried = objects.len();
        let raw_path = self.output(RAW_INVENTORY_FILE);
        write_raw_inventory(&raw_path, &objects)?;
        artifacts.push(raw_path);

        info!("Processing inventory");
        let records = classifier.classify_all(objects);
        let kinds = KindsSummary::from_records(&records);
        stages.classified = records.len();
        stages.unknown = kinds.unknown_count;
        stages.ready = records.iter().filter(|r| r.ready).count();
        let csv_path = self.output(INVENTORY_CSV_FILE);
        write_inventory_csv(&csv_path, &records)?;
        let kinds_path = self.output(KINDS_SUMMARY_FILE);
        kinds.write_json(&kinds_path)?;
        artifacts.extend([csv_path, kinds_path]);

        info!("Assessing manifest coverage");
        let coverage = CoverageReport::assess(&records, &catalog);
        let coverage_text = self.output(COVERAGE_TEXT_FILE);
        coverage.write_text(&coverage_text)?;
        let coverage_json = self.output(COVERAGE_JSON_FILE);
        coverage.write_json(&coverage_json)?;
        artifacts.extend([coverage_text, coverage_json]);

        info!("Generating manifests");
        let manifests = ManifestBuilder::new(self.grouping).build(&records);
        stages.manifests = manifests.len();
        let manifests_path = self.output(MANIFESTS_FILE);
        write_manifests(&manifests_path, &manifests)?;
        artifacts.push(manifests_path);

        let by_path = manifest_map(&manifests)?;
        let tasks = select_tasks(
            lister.container(),
            records.iter().map(|r| r.path()),
            &by_path,
        );
        stages.tasks = tasks.len();

        let summary: IngestionSummary = match orchestrator {
            Some(orchestrator) => {
                info!(tasks = tasks.len(), "Starting ingestion");
                orchestrator.run(tasks).await
            },
            None => {
                info!("Dry run mode: skipping ingestion");
                simulate(&tasks)
            },
        };
        stages.ingested = summary.success_count;
        stages.failed = summary.failure_count;
        let results_path = self.output(INGESTION_RESULTS_FILE);
        summary.write_json(&results_path)?;
        artifacts.push(results_path);

        let report = RunReport {
            run_id,
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
            root_prefix: self.root_prefix.clone(),
            stages,
            coverage: coverage.to_json(),
            artifacts,
        };
        report.write_json(&self.output(RUN_REPORT_FILE))?;

        info!(
            inventoried = report.stages.inventoried,
            manifests = report.stages.manifests,
            ingested = report.stages.ingested,
            failed = report.stages.failed,
            "Pipeline completed"
        );
        Ok(report)
    }

    fn catalog(&self) -> Result<SchemaCatalog> {
        match &self.config.osdu_schemas {
            Some(schemas) => SchemaCatalog::from_json(schemas),
            None => {
                warn!("No osdu_schemas in configuration; every file will be reported as missing");
                Ok(SchemaCatalog::default())
            },
        }
    }
}
