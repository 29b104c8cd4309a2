//! `osdu delete-datasets` command implementation

use std::path::PathBuf;

use osdu_ingest::registry::{delete_records, load_items};

use super::register::print_bulk;
use super::{connect, output_path, GlobalArgs};
use crate::error::{CliError, Result};

pub const DELETE_RESULTS_FILE: &str = "delete_results.json";

pub async fn run(globals: &GlobalArgs, input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    if !input.exists() {
        return Err(CliError::file_not_found(&input));
    }

    let config = globals.load_config()?;
    let client = connect(&config)?;
    let items = load_items(&input)?;

    let report = delete_records(&client, items).await;
    let output = output_path(output.as_deref(), &config, DELETE_RESULTS_FILE);
    report.write_json(&output)?;
    print_bulk("Deletion", &report, &output)
}
