//! Eddy CLI - Command-line interface
//!
//! Runs the request scheduler against simulated swarms.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use eddy_core::tracing_setup::{ConsoleLevel, init_tracing};

#[derive(Parser)]
#[command(name = "eddy")]
#[command(about = "Chunk request scheduler for BitTorrent-style downloads")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = ConsoleLevel::Info, global = true)]
    log_level: ConsoleLevel,
    /// Directory for the full trace log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
