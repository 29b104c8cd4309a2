//! `osdu ingest` command implementation
//!
//! Pairs manifests with the files they describe and uploads them with bounded
//! concurrency and retries.

use std::path::PathBuf;

use colored::Colorize;
use osdu_ingest::inventory::load_raw_inventory;
use osdu_ingest::manifest::load_manifest_map;
use osdu_ingest::orchestrator::{select_tasks, simulate};
use osdu_ingest::pipeline::{INGESTION_RESULTS_FILE, MANIFESTS_FILE};
use osdu_ingest::{IngestionOrchestrator, IngestionSummary};

use super::{connect, input_path, output_path, GlobalArgs, Store};
use crate::error::{CliError, Result};
use crate::progress::{counts_table, print_saved};

pub async fn run(
    globals: &GlobalArgs,
    manifests: Option<PathBuf>,
    inventory: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    let config = globals.load_config()?;
    let dry_run = dry_run || config.dry_run;
    let manifests = input_path(manifests.as_deref(), &config, MANIFESTS_FILE)?;
    let manifest_map = load_manifest_map(&manifests)?;

    let object_paths: Vec<String> = match &inventory {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::file_not_found(path));
            }
            load_raw_inventory(path)?.into_iter().map(|o| o.path).collect()
        },
        None => manifest_map.iter().map(|(path, _)| path.clone()).collect(),
    };

    let summary = if dry_run {
        let container = if config.container_name.is_empty() {
            "local"
        } else {
            config.container_name.as_str()
        };
        let tasks = select_tasks(container, object_paths.iter().map(String::as_str), &manifest_map);
        println!("{}", "Dry run: nothing will be uploaded".yellow());
        simulate(&tasks)
    } else {
        // Connect before touching the store so a bad endpoint fails fast.
        let client = connect(&config)?;
        let store = Store::open(&config).await?;
        let tasks = select_tasks(
            store.lister().container(),
            object_paths.iter().map(String::as_str),
            &manifest_map,
        );
        let orchestrator = IngestionOrchestrator::new(
            &client,
            store.content(),
            config.max_concurrent_uploads,
            config.retry_policy(),
        )?
        .with_progress(true);
        orchestrator.run(tasks).await
    };

    let output = output_path(None, &config, INGESTION_RESULTS_FILE);
    summary.write_json(&output)?;
    report(&summary, &output)
}

/// Print the summary; any failed item makes the command fail.
pub(crate) fn report(summary: &IngestionSummary, output: &std::path::Path) -> Result<()> {
    println!(
        "{}",
        counts_table(
            "Ingestion",
            [
                ("Tasks", summary.total().to_string()),
                ("Succeeded", summary.success_count.to_string()),
                ("Failed", summary.failure_count.to_string()),
            ]
        )
    );
    print_saved("Ingestion results saved to", output);

    if summary.failure_count > 0 {
        return Err(CliError::ItemsFailed {
            failed: summary.failure_count,
            total: summary.total(),
            report: output.display().to_string(),
        });
    }
    Ok(())
}
