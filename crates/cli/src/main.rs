use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{CheckConfigArgs, LocateArgs, RunArgs};

#[derive(Parser)]
#[command(name = "straddle")]
#[command(about = "Short-straddle adjustment engine over a spreadsheet trade terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the straddle and monitor it until square-off
    Run(RunArgs),
    /// Show which strike the locator picks for a target premium (no writes)
    Locate(LocateArgs),
    /// Load, validate and print the effective configuration
    CheckConfig(CheckConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run_session(args).await?,
        Commands::Locate(args) => {
            logging::init_stderr();
            commands::run_locate(args).await?;
        }
        Commands::CheckConfig(args) => {
            logging::init_stderr();
            commands::run_check_config(&args)?;
        }
    }

    Ok(())
}
