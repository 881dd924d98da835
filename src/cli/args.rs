// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Build specification reports from recorded lifecycle events
#[derive(Parser, Debug)]
#[command(name = "specreport")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregate specification lifecycle events into reports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Configuration file (default: .specreportrc[.toml] in cwd or home)
    #[arg(long, global = true, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Comma-separated report sinks, overrides configuration
    #[arg(long, global = true, value_name = "SINKS")]
    pub sinks: Option<String>,

    /// Show current configuration and exit
    #[arg(long, default_value_t = false)]
    pub show_config: bool,

    /// Create default configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init_config: Option<PathBuf>,

    /// Print shell completion (bash, zsh, fish, elvish, powershell)
    #[arg(long, value_name = "SHELL_TYPE", value_parser = ["bash", "zsh", "fish", "elvish", "powershell"])]
    pub completion: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON-lines event recording through the configured sinks
    Replay(ReplayArgs),

    /// List available report sinks
    Sinks,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Recording to replay
    #[arg(required = true)]
    pub file: PathBuf,

    /// Exit with an error when any report sink failed
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}
