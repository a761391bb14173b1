//! Spreadsheet trade-terminal integration.
//!
//! The terminal is a workbook watched by an external order-management layer.
//! Writing an instrument row opens a position and a close marker closes it;
//! the layer fills in the entry and live premiums.
//!
//! [`store::QuoteStore`] is the cell store seam and [`terminal::TradeTerminal`]
//! gives typed access over the workbook layout. Two stores ship here: an
//! in-memory paper store and a JSON snapshot kept in sync by the workbook bridge.

pub mod file_store;
pub mod paper;
pub mod store;
pub mod terminal;
pub mod types;

pub use file_store::JsonFileStore;
pub use paper::{MemoryStore, WorkbookSnapshot};
pub use store::{CellAddress, CellValue, QuoteStore, StoreError};
pub use terminal::{InputError, TradeTerminal};
pub use types::{OptionType, OptionsContract, PositionTicket, SessionInputs, Side};
