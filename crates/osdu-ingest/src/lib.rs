//! OSDU Ingest Library
//!
//! Inventory, classification, coverage assessment and concurrent ingestion of
//! object-store files into an OSDU data platform.
//!
//! # Stages
//!
//! - **inventory**: list objects and write the raw blob inventory
//! - **classify** / **readiness**: map each object to a category and schema kind
//! - **coverage**: measure how much of the inventory the schema catalog covers
//! - **manifest**: build manifest entries for ready records
//! - **orchestrator**: upload manifests and content with bounded concurrency and retries
//! - **registry**: sequential bulk dataset registration and record deletion
//! - **pipeline**: every stage in order, with a run report
//!
//! # Example
//!
//! ```no_run
//! use osdu_ingest::classify::Classifier;
//! use osdu_ingest::coverage::{CoverageReport, SchemaCatalog};
//! use osdu_common::types::ObjectRecord;
//!
//! # fn main() -> anyhow::Result<()> {
//! let classifier = Classifier::with_default_policy()?;
//! let inventory = classifier.classify_all(vec![
//!     ObjectRecord::new("files/volve/well_logs/WELL-42_2021-03-01.las", "corpus", 1024),
//! ]);
//! let catalog = SchemaCatalog::from_kinds(["Well Log"]);
//! let report = CoverageReport::assess(&inventory, &catalog);
//! print!("{}", report.render_text());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod classify;
pub mod client;
pub mod config;
pub mod coverage;
pub mod inventory;
pub mod manifest;
pub mod orchestrator;
pub mod pipeline;
pub mod readiness;
pub mod registry;
pub mod retry;
pub mod storage;

pub use classify::Classifier;
pub use client::{AdmeClient, IngestionApi, RemoteError};
pub use config::IngestConfig;
pub use orchestrator::{IngestionOrchestrator, IngestionSummary, IngestionTask};
pub use pipeline::{Pipeline, RunReport};
pub use retry::RetryPolicy;
