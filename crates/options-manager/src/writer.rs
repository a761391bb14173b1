//! Position writer: resolves a strike by premium and appends an opening row.

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use straddle_terminal::{OptionType, OptionsContract, PositionTicket, Side, StoreError, TradeTerminal};

use crate::locator::locate;
use crate::types::Leg;

/// Why a position could not be written.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// No numeric premium in the chain column.
    #[error("no {option_type} strike found near premium {target:.2}")]
    NoStrike { option_type: OptionType, target: f64 },

    /// The located chain row has no usable strike.
    #[error("strike cell empty on chain row {row} for {option_type}")]
    EmptyStrikeCell { option_type: OptionType, row: u32 },

    /// Writing the terminal row failed.
    #[error("terminal write failed: {0}")]
    Store(#[from] StoreError),
}

impl PlacementError {
    /// True for the expected "no replacement available" outcomes.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoStrike { .. } | Self::EmptyStrikeCell { .. })
    }
}

/// A request to open one leg.
#[derive(Debug, Clone)]
pub struct PositionRequest {
    pub exchange: String,
    pub symbol: String,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub target_premium: f64,
    pub size: u32,
    pub side: Side,
}

/// Picks the strike whose premium is nearest `target_premium` and appends an
/// opening instruction on the next free terminal row.
///
/// # Errors
///
/// [`PlacementError::NoStrike`] / [`PlacementError::EmptyStrikeCell`] when no
/// strike can be resolved (expected during adjustments), or
/// [`PlacementError::Store`] if allocating or writing the row fails.
pub async fn write_position(
    terminal: &TradeTerminal,
    request: &PositionRequest,
) -> Result<Leg, PlacementError> {
    let option_type = request.option_type;
    let not_found = || PlacementError::NoStrike {
        option_type,
        target: request.target_premium,
    };

    let chain = match terminal.chain_premiums(option_type).await {
        Ok(chain) => chain,
        Err(e) => {
            warn!(%option_type, error = %e, "Option chain unreadable, no strike available");
            return Err(not_found());
        }
    };

    let Some(located) = locate(&chain, request.target_premium) else {
        warn!(%option_type, target = request.target_premium, "No valid strike found in option chain");
        return Err(not_found());
    };

    let strike = terminal
        .chain_strike(located.row)
        .await
        .and_then(Decimal::from_f64)
        .map(|s| s.trunc())
        .ok_or(PlacementError::EmptyStrikeCell {
            option_type,
            row: located.row,
        })?;

    let contract = OptionsContract::new(
        &request.exchange,
        &request.symbol,
        request.expiry,
        strike,
        option_type,
    );
    let ticket = PositionTicket {
        instrument_id: contract.instrument_id(),
        size: request.size,
        side: request.side,
    };

    let row = terminal.next_position_row().await?;
    terminal.write_position(row, &ticket).await?;

    info!(
        %option_type,
        instrument = %ticket.instrument_id,
        row,
        chain_premium = located.value,
        target = request.target_premium,
        "Position written (entry premium pending)"
    );

    Ok(Leg::pending(row, contract, request.side, request.size))
}
