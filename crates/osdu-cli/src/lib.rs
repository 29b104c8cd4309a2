//! OSDU CLI Library
//!
//! Command-line interface for moving an object-store corpus into an OSDU data platform.
//!
//! # Overview
//!
//! Each pipeline stage is its own subcommand and reads the previous stage's artifact:
//!
//! - **Inventory**: list the container (`osdu inventory`)
//! - **Processing**: classify the raw inventory (`osdu process`)
//! - **Coverage**: compare categories with the schema catalog (`osdu assess-coverage`)
//! - **Manifests**: build manifests for ready files (`osdu generate-manifests`)
//! - **Ingestion**: upload manifests with content (`osdu ingest`)
//! - **Datasets**: bulk register or delete datasets (`osdu register-datasets`, `osdu delete-datasets`)
//! - **Pipeline**: every stage in one go (`osdu run`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// OSDU ingest - inventory, classify and ingest object-store files
#[derive(Parser, Debug)]
#[command(name = "osdu")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./config.json when present)
    #[arg(short, long, env = "OSDU_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory for generated artifacts (overrides the configuration)
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every object under a prefix and write the raw inventory
    Inventory {
        /// Root prefix to walk
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Output file (defaults to <output-dir>/blob_inventory.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Classify a raw inventory into the categorized CSV and kinds summary
    Process {
        /// Raw inventory JSON (defaults to <output-dir>/blob_inventory.json)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Report how much of the inventory the schema catalog covers
    AssessCoverage {
        /// Categorized inventory CSV (defaults to <output-dir>/categorized_inventory.csv)
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Directory of schema definition files
        #[arg(long, conflicts_with = "schemas_file")]
        schemas_dir: Option<PathBuf>,

        /// JSON file listing schema kinds
        #[arg(long)]
        schemas_file: Option<PathBuf>,
    },

    /// Build manifests for every ready file
    GenerateManifests {
        /// Categorized inventory CSV (defaults to <output-dir>/categorized_inventory.csv)
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Grouping of records into manifests (record, entity)
        #[arg(short, long, default_value = "record")]
        group_by: String,
    },

    /// Upload manifests with their file content
    Ingest {
        /// Manifest map or generated manifests (defaults to <output-dir>/generated_manifests.json)
        #[arg(short, long)]
        manifests: Option<PathBuf>,

        /// Raw inventory restricting and ordering the uploads
        #[arg(short, long)]
        inventory: Option<PathBuf>,

        /// Report what would be uploaded without contacting the platform
        #[arg(long)]
        dry_run: bool,
    },

    /// Register one dataset per uploaded file
    RegisterDatasets {
        /// Upload results JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Legal tag applied to every dataset
        #[arg(short, long, env = "OSDU_LEGAL_TAG")]
        legal_tag: String,

        /// Output file (defaults to <output-dir>/register_results.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Delete the datasets created by a registration run
    DeleteDatasets {
        /// Registration results JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to <output-dir>/delete_results.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline
    Run {
        /// Root prefix to walk
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Grouping of records into manifests (record, entity)
        #[arg(short, long, default_value = "record")]
        group_by: String,

        /// Simulate the ingest stage
        #[arg(long)]
        dry_run: bool,
    },
}
