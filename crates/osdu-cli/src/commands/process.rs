//! `osdu process` command implementation
//!
//! Classifies the raw inventory into the categorized CSV and the kinds summary.

use std::path::PathBuf;

use osdu_ingest::inventory::process_inventory;
use osdu_ingest::pipeline::{INVENTORY_CSV_FILE, KINDS_SUMMARY_FILE, RAW_INVENTORY_FILE};
use osdu_ingest::Classifier;

use super::{input_path, output_path, GlobalArgs};
use crate::error::{CliError, Result};
use crate::progress::{counts_table, print_saved};

pub async fn run(globals: &GlobalArgs, input: Option<PathBuf>) -> Result<()> {
    let config = globals.load_config()?;
    let input = input_path(input.as_deref(), &config, RAW_INVENTORY_FILE)?;
    let csv_out = output_path(None, &config, INVENTORY_CSV_FILE);
    let summary_out = output_path(None, &config, KINDS_SUMMARY_FILE);

    let classifier = Classifier::with_default_policy()
        .map_err(|e| CliError::config(format!("invalid extraction pattern: {}", e)))?;
    let (records, summary) = process_inventory(&classifier, &input, &csv_out, &summary_out)?;

    let ready = records.iter().filter(|r| r.ready).count();
    let mut rows: Vec<(&str, String)> = summary
        .kinds
        .iter()
        .map(|(category, kind)| (category.as_str(), kind.count.to_string()))
        .collect();
    rows.push(("Unknown", summary.unknown_count.to_string()));
    rows.push(("Total", summary.total_files.to_string()));
    rows.push(("Ready for manifest", ready.to_string()));

    println!("{}", counts_table("Category", rows));
    print_saved("Categorized inventory saved to", &csv_out);
    print_saved("Kinds summary saved to", &summary_out);
    Ok(())
}
