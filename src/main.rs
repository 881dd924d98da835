// Main entry point for specreport

use anyhow::Result;
use clap::Parser;
use tracing::info;

use specreport::cli::{Cli, Commands};
use specreport::commands::{
    handle_completion, handle_init_config, handle_replay, handle_show_config, handle_sinks,
    resolve_report_config,
};
use specreport::logging;
use specreport::report::SinkCatalog;

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    if cli.verbose {
        info!("Starting specreport v{}", env!("CARGO_PKG_VERSION"));
    }

    if cli.show_config {
        return handle_show_config(&cli);
    }

    if let Some(path) = &cli.init_config {
        return handle_init_config(path);
    }

    if let Some(shell_type) = &cli.completion {
        return handle_completion(shell_type);
    }

    let catalog = SinkCatalog::new();
    match &cli.command {
        Some(Commands::Replay(args)) => {
            let report = resolve_report_config(&cli);
            handle_replay(args, &report, &catalog)
        }
        Some(Commands::Sinks) => handle_sinks(&catalog),
        None => {
            eprintln!("No command given. Use 'specreport --help' for usage.");
            Ok(())
        }
    }
}
