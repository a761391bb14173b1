//! Session entry point: opens the straddle and hands it to the engine.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{info, warn};

use straddle_core::AppConfig;
use straddle_terminal::TradeTerminal;

use crate::bootstrap::open_straddle;
use crate::engine::AdjustmentEngine;
use crate::schedule::{Clock, SquareOffSchedule};
use crate::types::{EngineReport, EngineState, EngineStats};

/// Run one trading session against the terminal.
///
/// Nothing is written when the session starts at or after square-off.
///
/// 1. Read symbol, expiry, lot size and search premiums
/// 2. Open the SELL CALL / SELL PUT straddle
/// 3. Wait for the terminal to settle the entry premiums
/// 4. Monitor and adjust until square-off, no legs remain, or `stop` is set
pub async fn run(
    terminal: TradeTerminal,
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
) -> Result<EngineReport> {
    let inputs = terminal
        .read_session_inputs()
        .await
        .context("Failed to read session inputs")?;

    info!(
        symbol = %inputs.symbol,
        expiry = %inputs.expiry,
        lot_size = inputs.lot_size,
        call_search = ?inputs.call_search_premium,
        put_search = ?inputs.put_search_premium,
        square_off = ?config.engine.square_off_time(),
        cutoff_hour = config.engine.adjustment_cutoff_hour,
        "Straddle session started"
    );

    let schedule = SquareOffSchedule::from_config(&config.engine)
        .context("Invalid square-off schedule")?;
    let now = clock.now();
    if schedule.is_square_off(now) {
        warn!(
            time = %now.format("%H:%M:%S"),
            square_off = %schedule.square_off,
            "Session started after square-off, not opening a straddle"
        );
        return Ok(EngineReport {
            state: EngineState::SquaredOff,
            stats: EngineStats::default(),
            open_legs: Vec::new(),
            closed_legs: Vec::new(),
            unclosed: Vec::new(),
        });
    }

    let legs = open_straddle(&terminal, &inputs, &config.terminal.exchange)
        .await
        .context("Failed to open straddle")?;

    info!(
        legs = legs.len(),
        settle_ms = config.engine.settle_delay_ms,
        "Straddle written, waiting for entry premiums"
    );
    sleep(config.engine.settle_delay()).await;

    let engine = AdjustmentEngine::new(terminal, config.engine.clone(), legs, clock)
        .context("Failed to build adjustment engine")?
        .with_fallback_seed(inputs.search_premium_total())
        .with_stop_flag(stop);

    Ok(engine.run().await)
}
