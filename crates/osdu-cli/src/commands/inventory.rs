//! `osdu inventory` command implementation
//!
//! Lists every object under a prefix and writes the raw blob inventory.

use std::path::PathBuf;

use colored::Colorize;
use osdu_ingest::inventory::{collect_inventory, write_raw_inventory};
use osdu_ingest::pipeline::RAW_INVENTORY_FILE;

use super::{output_path, GlobalArgs, Store};
use crate::error::Result;
use crate::progress::{create_spinner, format_bytes, print_saved};

pub async fn run(globals: &GlobalArgs, prefix: String, output: Option<PathBuf>) -> Result<()> {
    let config = globals.load_config()?;
    let store = Store::open(&config).await?;
    let output = output_path(output.as_deref(), &config, RAW_INVENTORY_FILE);

    let spinner = create_spinner(&format!("Listing {}/{}", store.lister().container(), prefix));
    let objects = collect_inventory(store.lister(), &prefix).await;
    spinner.finish_and_clear();
    let objects = objects?;

    write_raw_inventory(&output, &objects)?;

    let total_size: u64 = objects.iter().map(|o| o.size).sum();
    println!("{}", "Inventory:".cyan().bold());
    println!("  Container: {}", store.lister().container());
    println!("  Objects:   {}", objects.len());
    println!("  Size:      {}", format_bytes(total_size));
    print_saved("Raw inventory saved to", &output);
    Ok(())
}
