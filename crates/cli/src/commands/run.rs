//! `straddle run`: one trading session from bootstrap to square-off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use straddle_core::{StoreKind, DEFAULT_CONFIG_PATH};
use straddle_options_manager::{service, EngineState, SystemClock};

use crate::logging;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Profile overlay, loads Config.<profile>.toml next to the config file
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Run against an in-memory copy of the terminal snapshot; nothing is
    /// written back to the live file.
    #[arg(long)]
    pub paper: bool,
}

pub async fn run_session(args: RunArgs) -> Result<()> {
    let config = super::load_config(&args.config, args.profile.as_deref())?;

    match &config.logging.dir {
        Some(dir) => {
            let path = logging::init_session(dir)?;
            info!(path = %path.display(), "Logging to file");
        }
        None => logging::init_stderr(),
    }
    info!(config = %args.config, profile = ?args.profile, "Starting straddle session");

    let kind = if args.paper {
        StoreKind::Paper
    } else {
        config.store.kind
    };
    let opened = super::open_terminal(&config, kind).await?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping after the current tick...");
            stop_on_ctrl_c.store(true, Ordering::SeqCst);
        }
    });

    let report = service::run(opened.terminal, &config, Arc::new(SystemClock), stop).await?;

    if let Some(store) = opened.paper {
        let out = config.store.path.with_extension("paper.json");
        store
            .snapshot()
            .save(&out)
            .await
            .with_context(|| format!("Failed to save paper snapshot {}", out.display()))?;
        info!(path = %out.display(), writes = store.journal().len(), "Paper session saved");
    }

    println!();
    println!("=== Session Summary ===");
    println!("Final state: {:?}", report.state);
    println!("Ticks: {}", report.stats.ticks);
    println!("Adjustments: {}", report.stats.adjustments);
    println!("Missing replacements: {}", report.stats.replacements_missing);
    println!("Abandoned adjustments: {}", report.stats.abandoned_adjustments);
    println!("Closed legs: {}", report.closed_legs.len());
    for leg in &report.open_legs {
        println!(
            "Still open: {} [{}] (row {})",
            leg.contract.display_name(),
            leg.instrument_id(),
            leg.row
        );
    }
    for id in &report.unclosed {
        println!("Square-off NOT written for leg {id}, close it manually");
    }

    if report.state == EngineState::Failed {
        anyhow::bail!("Monitoring stopped on a critical error, check the terminal for open legs");
    }
    Ok(())
}
