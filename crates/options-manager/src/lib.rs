//! Deterministic short-straddle management over a spreadsheet trade terminal.
//!
//! Runs one trading session:
//! - Opens a SELL CALL / SELL PUT straddle at the configured search premiums
//! - Aggregates entry and live premiums for the open legs
//! - Closes and replaces a leg on premium breach or distress band
//! - Squares off every open leg at the end of the day
//!
//! Every instruction goes through the terminal cells; the engine never talks
//! to a broker directly.

pub mod aggregator;
pub mod bootstrap;
pub mod engine;
pub mod locator;
pub mod schedule;
pub mod service;
pub mod triggers;
pub mod types;
pub mod writer;

pub use aggregator::{aggregate, EntryWait};
pub use bootstrap::{open_straddle, BootstrapError};
pub use engine::{AdjustmentEngine, EngineError};
pub use locator::{locate, Located};
pub use schedule::{Clock, ManualClock, SquareOffSchedule, SystemClock};
pub use triggers::{evaluate, select_leg_to_close};
pub use types::{
    CloseReason, EngineReport, EngineState, EngineStats, EntryPremium, Leg, LegId, LegQuote,
    QuoteSnapshot, TickOutcome, Trigger,
};
pub use writer::{write_position, PlacementError, PositionRequest};
