//! `osdu register-datasets` command implementation

use std::path::{Path, PathBuf};

use osdu_ingest::registry::{load_items, register_datasets, BulkReport};

use super::{connect, output_path, GlobalArgs};
use crate::error::{CliError, Result};
use crate::progress::{counts_table, print_saved};

pub const REGISTER_RESULTS_FILE: &str = "register_results.json";

pub async fn run(globals: &GlobalArgs, input: PathBuf, legal_tag: String, output: Option<PathBuf>) -> Result<()> {
    if legal_tag.trim().is_empty() {
        return Err(CliError::invalid_argument("--legal-tag must not be empty"));
    }
    if !input.exists() {
        return Err(CliError::file_not_found(&input));
    }

    let config = globals.load_config()?;
    let client = connect(&config)?;
    let items = load_items(&input)?;

    let report = register_datasets(&client, items, &legal_tag).await;
    let output = output_path(output.as_deref(), &config, REGISTER_RESULTS_FILE);
    report.write_json(&output)?;
    print_bulk("Registration", &report, &output)
}

/// Print bulk counts; any failed item makes the command fail.
pub(crate) fn print_bulk(title: &str, report: &BulkReport, output: &Path) -> Result<()> {
    let summary = report.summary;
    println!(
        "{}",
        counts_table(
            title,
            [
                ("Processed", summary.total_datasets_processed.to_string()),
                ("Succeeded", summary.total_successes.to_string()),
                ("Failed", summary.total_failures.to_string()),
            ]
        )
    );
    print_saved("Results saved to", output);

    if summary.total_failures > 0 {
        return Err(CliError::ItemsFailed {
            failed: summary.total_failures,
            total: summary.total_datasets_processed,
            report: output.display().to_string(),
        });
    }
    Ok(())
}
