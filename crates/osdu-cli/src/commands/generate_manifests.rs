//! `osdu generate-manifests` command implementation
//!
//! Builds one manifest per ready record (or per entity) from the categorized inventory.

use std::path::PathBuf;

use osdu_ingest::inventory::read_inventory_csv;
use osdu_ingest::manifest::{write_manifests, Grouping, ManifestBuilder};
use osdu_ingest::pipeline::{INVENTORY_CSV_FILE, MANIFESTS_FILE};

use super::{input_path, output_path, GlobalArgs};
use crate::error::{CliError, Result};
use crate::progress::{counts_table, print_saved};

pub async fn run(globals: &GlobalArgs, inventory: Option<PathBuf>, group_by: String) -> Result<()> {
    let grouping: Grouping = group_by
        .parse()
        .map_err(|_| CliError::invalid_argument(format!("--group-by must be 'record' or 'entity', got '{}'", group_by)))?;
    let config = globals.load_config()?;
    let inventory = input_path(inventory.as_deref(), &config, INVENTORY_CSV_FILE)?;

    let records = read_inventory_csv(&inventory)?;
    let manifests = ManifestBuilder::new(grouping).build(&records);

    let output = output_path(None, &config, MANIFESTS_FILE);
    write_manifests(&output, &manifests)?;

    let ready = records.iter().filter(|r| r.ready).count();
    println!(
        "{}",
        counts_table(
            "Records",
            [
                ("Inventory", records.len().to_string()),
                ("Ready", ready.to_string()),
                ("Manifests", manifests.len().to_string()),
            ]
        )
    );
    print_saved("Manifests saved to", &output);
    Ok(())
}
