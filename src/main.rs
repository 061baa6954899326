mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{config::ConfigArgs, start::StartArgs};

#[derive(Parser)]
#[command(author, version, about = "Gridgate command gateway")]
struct Cli {
    /// Path to the configuration file. Defaults to
    /// ~/.config/gridgate/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway in the foreground
    Start(StartArgs),
    /// Inspect or validate the configuration
    Config(ConfigArgs),
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridgate")
        .join("config.toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    match cli.command {
        Commands::Start(args) => commands::start::run(&config_path, args).await,
        Commands::Config(args) => commands::config::run(&config_path, args),
    }
}
