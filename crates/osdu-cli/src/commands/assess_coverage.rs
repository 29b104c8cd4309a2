//! `osdu assess-coverage` command implementation
//!
//! Compares the categorized inventory with the schema catalog and writes the
//! coverage report.

use std::path::PathBuf;

use osdu_ingest::coverage::{CoverageReport, SchemaCatalog};
use osdu_ingest::inventory::read_inventory_csv;
use osdu_ingest::pipeline::{COVERAGE_JSON_FILE, COVERAGE_TEXT_FILE, INVENTORY_CSV_FILE};
use osdu_ingest::IngestConfig;
use tracing::warn;

use super::{input_path, output_path, GlobalArgs};
use crate::error::{CliError, Result};
use crate::progress::print_saved;

pub async fn run(
    globals: &GlobalArgs,
    inventory: Option<PathBuf>,
    schemas_dir: Option<PathBuf>,
    schemas_file: Option<PathBuf>,
) -> Result<()> {
    let config = globals.load_config()?;
    let inventory = input_path(inventory.as_deref(), &config, INVENTORY_CSV_FILE)?;
    let catalog = load_catalog(&config, schemas_dir, schemas_file)?;

    let records = read_inventory_csv(&inventory)?;
    let report = CoverageReport::assess(&records, &catalog);

    let text_out = output_path(None, &config, COVERAGE_TEXT_FILE);
    let json_out = output_path(None, &config, COVERAGE_JSON_FILE);
    report.write_text(&text_out)?;
    report.write_json(&json_out)?;

    println!("{}", report.render_text());
    print_saved("Coverage report saved to", &text_out);
    print_saved("Coverage summary saved to", &json_out);
    Ok(())
}

fn load_catalog(
    config: &IngestConfig,
    schemas_dir: Option<PathBuf>,
    schemas_file: Option<PathBuf>,
) -> Result<SchemaCatalog> {
    if let Some(dir) = schemas_dir {
        if !dir.is_dir() {
            return Err(CliError::file_not_found(&dir));
        }
        return Ok(SchemaCatalog::from_dir(&dir)?);
    }
    if let Some(file) = schemas_file {
        if !file.exists() {
            return Err(CliError::file_not_found(&file));
        }
        return Ok(SchemaCatalog::from_schemas_file(&file)?);
    }
    match &config.osdu_schemas {
        Some(schemas) => Ok(SchemaCatalog::from_json(schemas)?),
        None => {
            warn!("No schema catalog given; every file will be reported as missing");
            Ok(SchemaCatalog::default())
        },
    }
}
