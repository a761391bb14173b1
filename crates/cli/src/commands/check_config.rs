//! `straddle check-config`: print the effective configuration after all layers.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use straddle_core::DEFAULT_CONFIG_PATH;

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Profile overlay to apply
    #[arg(short, long)]
    pub profile: Option<String>,
}

pub fn run_check_config(args: &CheckConfigArgs) -> Result<()> {
    let config = super::load_config(&args.config, args.profile.as_deref())?;
    info!(config = %args.config, profile = ?args.profile, "Configuration is valid");

    let rendered = serde_json::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{rendered}");
    Ok(())
}
