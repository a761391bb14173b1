//! `straddle locate`: dry-run of the strike search against the option chain.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use straddle_core::DEFAULT_CONFIG_PATH;
use straddle_options_manager::locate;
use straddle_terminal::OptionType;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Right {
    Call,
    Put,
}

impl From<Right> for OptionType {
    fn from(right: Right) -> Self {
        match right {
            Right::Call => Self::Call,
            Right::Put => Self::Put,
        }
    }
}

#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Option chain side to search
    #[arg(long, value_enum)]
    pub right: Right,

    /// Target premium
    #[arg(long)]
    pub premium: f64,
}

pub async fn run_locate(args: LocateArgs) -> Result<()> {
    let config = super::load_config(&args.config, None)?;
    let opened = super::open_terminal(&config, config.store.kind).await?;
    let terminal = opened.terminal;
    let option_type = OptionType::from(args.right);

    let chain = terminal
        .chain_premiums(option_type)
        .await
        .context("Failed to read option chain")?;

    let Some(located) = locate(&chain, args.premium) else {
        println!("No {option_type} strike found near premium {:.2}", args.premium);
        return Ok(());
    };

    let strike = terminal.chain_strike(located.row).await;
    println!("Option type: {option_type}");
    println!("Target premium: {:.2}", args.premium);
    println!("Chain row: {}", located.row);
    println!("Chain premium: {:.2}", located.value);
    match strike {
        Some(strike) => println!("Strike: {}", strike.trunc()),
        None => println!("Strike: <empty>"),
    }
    Ok(())
}
