use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use gridgate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,
}

pub fn run(config_path: &Path, args: ConfigArgs) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("unable to load {}", config_path.display()))?;
    if args.check {
        println!("configuration ok ({} groups)", config.groups.len());
        return Ok(());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
