use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use gridgate::{config::Config, logging, server};

#[derive(Args)]
pub struct StartArgs {
    /// Override the configured bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the configured server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the configured log directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

pub async fn run(config_path: &Path, args: StartArgs) -> Result<()> {
    let mut config = Config::load(config_path)
        .with_context(|| format!("unable to load {}", config_path.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(log_dir) = args.log_dir {
        config.log_dir = Some(log_dir);
    }

    logging::init(config.log_dir.as_deref())?;
    info!(
        "loaded {} group(s) from {}",
        config.groups.len(),
        config_path.display()
    );
    server::run(config).await?;
    Ok(())
}
