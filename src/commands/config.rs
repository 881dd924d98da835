use crate::cli::Cli;
use crate::config::{self, Config, ReportConfig};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

/// Effective report configuration.
///
/// Precedence: `--sinks`, then `SPECREPORT_SINKS`, then the configuration
/// file, then built-in defaults.
pub fn resolve_report_config(cli: &Cli) -> ReportConfig {
    let loaded = match &cli.config {
        Some(path) => {
            let loaded = Config::load_from_file(path);
            if loaded.is_none() {
                warn!("Could not read configuration {}, using defaults", path.display());
            }
            loaded
        }
        None => Config::load(),
    };

    let mut report = loaded.unwrap_or_default().report;
    report.apply_env();
    if let Some(sinks) = &cli.sinks {
        report.sinks = sinks.clone();
    }
    report
}

pub fn handle_show_config(cli: &Cli) -> Result<()> {
    let report = resolve_report_config(cli);

    println!("Current configuration:");
    println!("    Reporting: {}", if report.enabled { "enabled" } else { "disabled" });
    println!("    Sinks: {}", report.sinks);
    for (sink, values) in &report.options {
        println!("    [{}]", sink);
        let options = report.options_for(sink);
        for key in values.keys() {
            println!("      {} = {}", key, options.get(key).unwrap_or_default());
        }
    }

    println!("\n  Environment variables:");
    match std::env::var(config::ENV_SPECREPORT_SINKS) {
        Ok(value) => println!("    {}: {}", config::ENV_SPECREPORT_SINKS, value),
        Err(_) => println!(
            "    {}: not set (default: {})",
            config::ENV_SPECREPORT_SINKS,
            config::default_sinks()
        ),
    }

    println!("\nConfiguration precedence:");
    println!("  1. Command-line arguments (highest)");
    println!("  2. Environment variables");
    println!("  3. Configuration file");
    println!("  4. Built-in defaults (lowest)");
    Ok(())
}

pub fn handle_init_config(path: &Path) -> Result<()> {
    let content = Config::default().to_toml();
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;
    println!("Configuration file created: {}", path.display());
    Ok(())
}
