//! Opening the initial short straddle from the session inputs.

use thiserror::Error;
use tracing::{error, info, warn};

use straddle_terminal::{OptionType, SessionInputs, Side, TradeTerminal};

use crate::types::Leg;
use crate::writer::{write_position, PositionRequest};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no straddle leg could be opened for {symbol}")]
    NoLegsOpened { symbol: String },
}

/// Writes a SELL CALL at the call search premium and a SELL PUT at the put
/// search premium. A side with no search premium or no matching strike is
/// skipped with a warning.
///
/// # Errors
///
/// Returns [`BootstrapError::NoLegsOpened`] if neither side was written.
pub async fn open_straddle(
    terminal: &TradeTerminal,
    inputs: &SessionInputs,
    exchange: &str,
) -> Result<Vec<Leg>, BootstrapError> {
    let mut legs = Vec::with_capacity(2);

    for (option_type, target) in [
        (OptionType::Call, inputs.call_search_premium),
        (OptionType::Put, inputs.put_search_premium),
    ] {
        let Some(target_premium) = target else {
            warn!(%option_type, "No search premium set, skipping leg");
            continue;
        };

        let request = PositionRequest {
            exchange: exchange.to_string(),
            symbol: inputs.symbol.clone(),
            expiry: inputs.expiry,
            option_type,
            target_premium,
            size: inputs.lot_size,
            side: Side::Sell,
        };

        match write_position(terminal, &request).await {
            Ok(leg) => {
                info!(%option_type, instrument = %leg.instrument_id(), row = leg.row, "Straddle leg opened");
                legs.push(leg);
            }
            Err(e) if e.is_not_found() => warn!(%option_type, error = %e, "Straddle leg not opened"),
            Err(e) => error!(%option_type, error = %e, "Straddle leg write failed"),
        }
    }

    if legs.is_empty() {
        return Err(BootstrapError::NoLegsOpened {
            symbol: inputs.symbol.clone(),
        });
    }
    Ok(legs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use straddle_core::TerminalLayout;
    use straddle_terminal::{CellAddress, CellValue, MemoryStore};

    const CHAIN: &str = "Option_Chain_Output";
    const TERMINAL: &str = "Trade_Terminal";

    fn cell(sheet: &str, reference: &str) -> CellAddress {
        CellAddress::parse(sheet, reference).unwrap()
    }

    fn inputs(call: Option<f64>, put: Option<f64>) -> SessionInputs {
        SessionInputs {
            symbol: "NIFTY".to_string(),
            expiry: NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(),
            lot_size: 75,
            call_search_premium: call,
            put_search_premium: put,
        }
    }

    fn seeded() -> (Arc<MemoryStore>, TradeTerminal) {
        let store = Arc::new(MemoryStore::new());
        for (row, strike, call, put) in [(2, 25000.0, 21.0, 90.0), (3, 25200.0, 9.0, 19.0)] {
            store.set(&cell(CHAIN, &format!("P{row}")), strike);
            store.set(&cell(CHAIN, &format!("J{row}")), call);
            store.set(&cell(CHAIN, &format!("V{row}")), put);
        }
        let terminal = TradeTerminal::new(store.clone(), TerminalLayout::default()).unwrap();
        (store, terminal)
    }

    #[tokio::test]
    async fn opens_call_then_put_on_consecutive_rows() {
        let (store, terminal) = seeded();
        let legs = open_straddle(&terminal, &inputs(Some(20.0), Some(18.0)), "NFO")
            .await
            .unwrap();

        assert_eq!(legs.len(), 2);
        assert_eq!((legs[0].row, legs[1].row), (2, 3));
        assert_eq!(
            store.get(&cell(TERMINAL, "A2")),
            CellValue::Text("NFO:NIFTY28OCT25C25000".into())
        );
        assert_eq!(
            store.get(&cell(TERMINAL, "A3")),
            CellValue::Text("NFO:NIFTY28OCT25P25200".into())
        );
        assert_eq!(store.get(&cell(TERMINAL, "N3")), CellValue::Text("SELL".into()));
    }

    #[tokio::test]
    async fn missing_search_premium_skips_that_side() {
        let (_store, terminal) = seeded();
        let legs = open_straddle(&terminal, &inputs(None, Some(18.0)), "NFO")
            .await
            .unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].option_type(), OptionType::Put);
    }

    #[tokio::test]
    async fn empty_chain_opens_nothing() {
        let store = Arc::new(MemoryStore::new());
        let terminal = TradeTerminal::new(store, TerminalLayout::default()).unwrap();
        let err = open_straddle(&terminal, &inputs(Some(20.0), Some(18.0)), "NFO")
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NoLegsOpened { .. }));
    }
}
