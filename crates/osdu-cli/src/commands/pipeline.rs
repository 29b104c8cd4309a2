//! `osdu run` command implementation
//!
//! Runs every stage in order and prints the per-stage counts.

use colored::Colorize;
use osdu_ingest::manifest::Grouping;
use osdu_ingest::pipeline::{INGESTION_RESULTS_FILE, RUN_REPORT_FILE};
use osdu_ingest::Pipeline;

use super::GlobalArgs;
use crate::error::{CliError, Result};
use crate::progress::{counts_table, print_saved};

pub async fn run(globals: &GlobalArgs, prefix: String, group_by: String, dry_run: bool) -> Result<()> {
    let grouping: Grouping = group_by
        .parse()
        .map_err(|_| CliError::invalid_argument(format!("--group-by must be 'record' or 'entity', got '{}'", group_by)))?;
    let mut config = globals.load_config()?;
    config.dry_run = dry_run || config.dry_run;
    let output_dir = config.output_dir.clone();

    if config.dry_run {
        println!("{}", "Dry run: the ingest stage will be simulated".yellow());
    }

    let report = Pipeline::new(config, prefix)
        .with_grouping(grouping)
        .with_progress(true)
        .run()
        .await?;

    let stages = &report.stages;
    println!(
        "{}",
        counts_table(
            "Stage",
            [
                ("Inventoried", stages.inventoried.to_string()),
                ("Classified", stages.classified.to_string()),
                ("Unknown", stages.unknown.to_string()),
                ("Ready", stages.ready.to_string()),
                ("Manifests", stages.manifests.to_string()),
                ("Upload tasks", stages.tasks.to_string()),
                ("Ingested", stages.ingested.to_string()),
                ("Failed", stages.failed.to_string()),
            ]
        )
    );
    print_saved("Run report saved to", &output_dir.join(RUN_REPORT_FILE));

    if stages.failed > 0 {
        return Err(CliError::ItemsFailed {
            failed: stages.failed,
            total: stages.tasks,
            report: output_dir.join(INGESTION_RESULTS_FILE).display().to_string(),
        });
    }
    Ok(())
}
