//! Typed access to the trade terminal workbook.
//!
//! Every cell the engine touches is addressed through a method here; the
//! layout (sheet names, columns, input cells) comes from configuration.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use straddle_core::TerminalLayout;
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{normalize_column, CellAddress, CellValue, QuoteStore, StoreError};
use crate::types::{OptionType, PositionTicket, SessionInputs};

/// Errors reading session inputs.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("required input `{field}` missing at {address}")]
    Missing { field: &'static str, address: String },

    #[error("unreadable expiry `{0}` (expected YYYY-MM-DD or a sheet date serial)")]
    Expiry(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
struct ResolvedCells {
    symbol: CellAddress,
    expiry: CellAddress,
    lot_size: CellAddress,
    call_search_premium: CellAddress,
    put_search_premium: CellAddress,
    underlying_ltp: Option<CellAddress>,
}

/// Trade terminal accessor over a [`QuoteStore`].
#[derive(Clone)]
pub struct TradeTerminal {
    store: Arc<dyn QuoteStore>,
    layout: TerminalLayout,
    cells: ResolvedCells,
}

impl TradeTerminal {
    /// Resolves the layout against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAddress`] if any configured column or cell
    /// reference is malformed.
    pub fn new(store: Arc<dyn QuoteStore>, layout: TerminalLayout) -> Result<Self, StoreError> {
        let columns = &layout.columns;
        for column in [
            &columns.instrument,
            &columns.size,
            &columns.side,
            &columns.entry_signal,
            &columns.entry_premium,
            &columns.live_premium,
            &columns.close_signal,
            &layout.chain.call_premium,
            &layout.chain.put_premium,
            &layout.chain.strike,
        ] {
            normalize_column(column)?;
        }

        let input = &layout.cells;
        let cells = ResolvedCells {
            symbol: CellAddress::parse(&layout.input_sheet, &input.symbol)?,
            expiry: CellAddress::parse(&layout.input_sheet, &input.expiry)?,
            lot_size: CellAddress::parse(&layout.input_sheet, &input.lot_size)?,
            call_search_premium: CellAddress::parse(
                &layout.terminal_sheet,
                &input.call_search_premium,
            )?,
            put_search_premium: CellAddress::parse(
                &layout.terminal_sheet,
                &input.put_search_premium,
            )?,
            underlying_ltp: input
                .underlying_ltp
                .as_deref()
                .map(|r| CellAddress::parse(&layout.terminal_sheet, r))
                .transpose()?,
        };

        Ok(Self {
            store,
            layout,
            cells,
        })
    }

    fn terminal_cell(&self, column: &str, row: u32) -> Result<CellAddress, StoreError> {
        CellAddress::new(&self.layout.terminal_sheet, column, row)
    }

    /// Reads a numeric cell; store failures and non-numeric content both
    /// come back as `None`.
    async fn read_number(&self, address: &CellAddress) -> Option<f64> {
        match self.store.read(address).await {
            Ok(value) => value.as_f64(),
            Err(e) => {
                debug!(cell = %address, error = %e, "Cell read failed, treating as absent");
                None
            }
        }
    }

    /// Entry premium (fill price) cell of a position row.
    pub fn entry_premium_cell(&self, row: u32) -> Result<CellAddress, StoreError> {
        self.terminal_cell(&self.layout.columns.entry_premium, row)
    }

    /// Live premium (LTP) cell of a position row.
    pub fn live_premium_cell(&self, row: u32) -> Result<CellAddress, StoreError> {
        self.terminal_cell(&self.layout.columns.live_premium, row)
    }

    /// Close-signal cell of a position row.
    pub fn close_signal_cell(&self, row: u32) -> Result<CellAddress, StoreError> {
        self.terminal_cell(&self.layout.columns.close_signal, row)
    }

    pub async fn entry_premium(&self, row: u32) -> Option<f64> {
        let address = self.entry_premium_cell(row).ok()?;
        self.read_number(&address).await
    }

    pub async fn live_premium(&self, row: u32) -> Option<f64> {
        let address = self.live_premium_cell(row).ok()?;
        self.read_number(&address).await
    }

    /// Underlying LTP, if a cell is configured and readable.
    pub async fn underlying_ltp(&self) -> Option<f64> {
        let address = self.cells.underlying_ltp.as_ref()?;
        self.read_number(address).await
    }

    /// Option-chain premium column for `option_type` as `(row, value)` pairs.
    ///
    /// # Errors
    ///
    /// Propagates the store error; callers treat it as an empty chain.
    pub async fn chain_premiums(
        &self,
        option_type: OptionType,
    ) -> Result<Vec<(u32, CellValue)>, StoreError> {
        let column = match option_type {
            OptionType::Call => &self.layout.chain.call_premium,
            OptionType::Put => &self.layout.chain.put_premium,
        };
        self.store.read_column(&self.layout.chain_sheet, column).await
    }

    /// Strike on an option-chain row.
    pub async fn chain_strike(&self, row: u32) -> Option<f64> {
        let address = CellAddress::new(&self.layout.chain_sheet, &self.layout.chain.strike, row).ok()?;
        self.read_number(&address).await
    }

    /// Next free row in the instrument column.
    ///
    /// # Errors
    ///
    /// Propagates store failures; guessing a row could overwrite a live position.
    pub async fn next_position_row(&self) -> Result<u32, StoreError> {
        let last = self
            .store
            .last_used_row(&self.layout.terminal_sheet, &self.layout.columns.instrument)
            .await?;
        Ok(match last {
            Some(row) => (row + 1).max(self.layout.first_data_row),
            None => self.layout.first_data_row,
        })
    }

    /// Writes an opening instruction on `row`: instrument, size, side, then the
    /// entry marker that arms it.
    ///
    /// # Errors
    ///
    /// Returns the first failing write; earlier cells stay written.
    pub async fn write_position(&self, row: u32, ticket: &PositionTicket) -> Result<(), StoreError> {
        let columns = &self.layout.columns;
        let writes = [
            (&columns.instrument, CellValue::from(ticket.instrument_id.as_str())),
            (&columns.size, CellValue::from(ticket.size)),
            (&columns.side, CellValue::from(ticket.side.to_string())),
            (
                &columns.entry_signal,
                CellValue::from(self.layout.markers.entry_signal.as_str()),
            ),
        ];
        for (column, value) in writes {
            let address = self.terminal_cell(column, row)?;
            self.store.write(&address, value).await?;
        }
        info!(row, instrument = %ticket.instrument_id, size = ticket.size, side = %ticket.side, "Position row written");
        Ok(())
    }

    /// Writes the close marker for a position row.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn write_close_signal(&self, row: u32) -> Result<(), StoreError> {
        let address = self.close_signal_cell(row)?;
        self.store
            .write(&address, CellValue::from(self.layout.markers.close_signal.as_str()))
            .await
    }

    /// Reads symbol, expiry, lot size and the two search premiums.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] if the symbol or expiry is missing/unreadable or
    /// the store fails.
    pub async fn read_session_inputs(&self) -> Result<SessionInputs, InputError> {
        let symbol_value = self.store.read(&self.cells.symbol).await?;
        let symbol = symbol_value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| InputError::Missing {
                field: "symbol",
                address: self.cells.symbol.to_string(),
            })?;

        let expiry_value = self.store.read(&self.cells.expiry).await?;
        if expiry_value.is_empty() {
            return Err(InputError::Missing {
                field: "expiry",
                address: self.cells.expiry.to_string(),
            });
        }
        let expiry = parse_expiry(&expiry_value)?;

        let lot_size = self
            .store
            .read(&self.cells.lot_size)
            .await?
            .as_f64()
            .filter(|v| *v >= 1.0)
            .map_or(1, |v| v as u32);

        Ok(SessionInputs {
            symbol,
            expiry,
            lot_size,
            call_search_premium: self.read_number(&self.cells.call_search_premium).await,
            put_search_premium: self.read_number(&self.cells.put_search_premium).await,
        })
    }
}

/// Parses an expiry cell: ISO date text (optionally with a time) or a
/// spreadsheet date serial (days since 1899-12-30).
///
/// # Errors
///
/// Returns [`InputError::Expiry`] for anything else.
pub fn parse_expiry(value: &CellValue) -> Result<NaiveDate, InputError> {
    match value {
        CellValue::Number(serial) if serial.is_finite() && *serial > 0.0 => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
                .ok_or_else(|| InputError::Expiry(serial.to_string()))?;
            epoch
                .checked_add_signed(Duration::days(serial.trunc() as i64))
                .ok_or_else(|| InputError::Expiry(serial.to_string()))
        }
        CellValue::Text(text) => {
            let text = text.trim();
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.date())
                .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
                .map_err(|_| InputError::Expiry(text.to_string()))
        }
        other => Err(InputError::Expiry(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::MemoryStore;
    use crate::types::Side;

    fn terminal() -> (Arc<MemoryStore>, TradeTerminal) {
        let store = Arc::new(MemoryStore::new());
        let terminal = TradeTerminal::new(store.clone(), TerminalLayout::default()).unwrap();
        (store, terminal)
    }

    fn cell(sheet: &str, reference: &str) -> CellAddress {
        CellAddress::parse(sheet, reference).unwrap()
    }

    #[tokio::test]
    async fn next_row_starts_below_header_and_appends() {
        let (store, terminal) = terminal();
        assert_eq!(terminal.next_position_row().await.unwrap(), 2);

        store.set(&cell("Trade_Terminal", "A1"), "Instrument");
        assert_eq!(terminal.next_position_row().await.unwrap(), 2);

        store.set(&cell("Trade_Terminal", "A2"), "NFO:NIFTY28OCT25C25000");
        store.set(&cell("Trade_Terminal", "A3"), "NFO:NIFTY28OCT25P25000");
        assert_eq!(terminal.next_position_row().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn position_row_written_in_instruction_order() {
        let (store, terminal) = terminal();
        let ticket = PositionTicket {
            instrument_id: "NFO:NIFTY28OCT25C25000".to_string(),
            size: 75,
            side: Side::Sell,
        };
        terminal.write_position(4, &ticket).await.unwrap();

        let written: Vec<String> = store.journal().iter().map(|(a, _)| a.a1()).collect();
        assert_eq!(written, vec!["A4", "M4", "N4", "O4"]);
        assert_eq!(
            store.get(&cell("Trade_Terminal", "N4")),
            CellValue::Text("SELL".into())
        );
        assert_eq!(
            store.get(&cell("Trade_Terminal", "O4")),
            CellValue::Text("True_Market".into())
        );
    }

    #[tokio::test]
    async fn premium_reads_degrade_to_none() {
        let (store, terminal) = terminal();
        store.set(&cell("Trade_Terminal", "K2"), 21.5);
        store.set(&cell("Trade_Terminal", "K3"), "#N/A");
        store.set(&cell("Trade_Terminal", "K4"), 9.0);
        store.fail(&cell("Trade_Terminal", "K4"));

        assert_eq!(terminal.live_premium(2).await, Some(21.5));
        assert_eq!(terminal.live_premium(3).await, None);
        assert_eq!(terminal.live_premium(4).await, None);
        assert_eq!(terminal.entry_premium(2).await, None);
    }

    #[tokio::test]
    async fn session_inputs_parse() {
        let (store, terminal) = terminal();
        store.set(&cell("Option_Chain_Input", "E3"), "NIFTY");
        store.set(&cell("Option_Chain_Input", "E4"), "2025-10-28 00:00:00");
        store.set(&cell("Option_Chain_Input", "C2"), 75.0);
        store.set(&cell("Trade_Terminal", "AH2"), 20.0);

        let inputs = terminal.read_session_inputs().await.unwrap();
        assert_eq!(inputs.symbol, "NIFTY");
        assert_eq!(inputs.expiry, NaiveDate::from_ymd_opt(2025, 10, 28).unwrap());
        assert_eq!(inputs.lot_size, 75);
        assert_eq!(inputs.call_search_premium, Some(20.0));
        assert_eq!(inputs.put_search_premium, None);
    }

    #[tokio::test]
    async fn missing_symbol_is_an_input_error() {
        let (store, terminal) = terminal();
        store.set(&cell("Option_Chain_Input", "E4"), "2025-10-28");
        assert!(matches!(
            terminal.read_session_inputs().await,
            Err(InputError::Missing { field: "symbol", .. })
        ));
    }

    #[tokio::test]
    async fn lot_size_defaults_to_one() {
        let (store, terminal) = terminal();
        store.set(&cell("Option_Chain_Input", "E3"), "NIFTY");
        store.set(&cell("Option_Chain_Input", "E4"), "2025-10-28");
        assert_eq!(terminal.read_session_inputs().await.unwrap().lot_size, 1);
    }

    #[test]
    fn expiry_accepts_date_serials() {
        // 45958 = 2025-10-28
        let date = parse_expiry(&CellValue::Number(45958.0)).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 10, 28).unwrap());
        assert!(parse_expiry(&CellValue::Text("28-10-2025".into())).is_err());
    }

    #[test]
    fn bad_layout_column_is_rejected() {
        let mut layout = TerminalLayout::default();
        layout.columns.entry_premium = "Q1".to_string();
        assert!(TradeTerminal::new(Arc::new(MemoryStore::new()), layout).is_err());
    }
}
