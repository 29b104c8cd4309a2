//! OSDU CLI - Main entry point

use clap::Parser;
use osdu_cli::commands::{self, GlobalArgs};
use osdu_cli::{Cli, Commands};
use osdu_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("osdu-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok().flatten();

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: Cli) -> osdu_cli::Result<()> {
    let globals = GlobalArgs {
        config: cli.config,
        output_dir: cli.output_dir,
    };

    match cli.command {
        Commands::Inventory { prefix, output } => commands::inventory::run(&globals, prefix, output).await,

        Commands::Process { input } => commands::process::run(&globals, input).await,

        Commands::AssessCoverage {
            inventory,
            schemas_dir,
            schemas_file,
        } => commands::assess_coverage::run(&globals, inventory, schemas_dir, schemas_file).await,

        Commands::GenerateManifests { inventory, group_by } => {
            commands::generate_manifests::run(&globals, inventory, group_by).await
        },

        Commands::Ingest {
            manifests,
            inventory,
            dry_run,
        } => commands::ingest::run(&globals, manifests, inventory, dry_run).await,

        Commands::RegisterDatasets {
            input,
            legal_tag,
            output,
        } => commands::register::run(&globals, input, legal_tag, output).await,

        Commands::DeleteDatasets { input, output } => commands::delete::run(&globals, input, output).await,

        Commands::Run {
            prefix,
            group_by,
            dry_run,
        } => commands::pipeline::run(&globals, prefix, group_by, dry_run).await,
    }
}
