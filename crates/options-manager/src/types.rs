//! Types for straddle leg management.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use straddle_core::DistressBand;
use straddle_terminal::{OptionType, OptionsContract, Side};

/// Opaque leg identity, generated when the leg is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegId(Uuid);

impl LegId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LegId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LegId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

/// Entry premium (fill price) of a leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntryPremium {
    /// Not yet observed in the terminal.
    Pending,
    /// First observed value; never re-read.
    Settled(f64),
}

impl EntryPremium {
    /// Value for aggregation; pending counts as 0.
    #[must_use]
    pub const fn value(&self) -> f64 {
        match self {
            Self::Pending => 0.0,
            Self::Settled(v) => *v,
        }
    }

    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }
}

/// One option position of the straddle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub id: LegId,
    /// Terminal row holding this position.
    pub row: u32,
    pub contract: OptionsContract,
    pub side: Side,
    pub size: u32,
    pub entry: EntryPremium,
    /// Latest live premium reading; `None` when the last read was missing.
    pub live_premium: Option<f64>,
    pub closed: bool,
}

impl Leg {
    /// A freshly written leg with no premiums observed yet.
    #[must_use]
    pub fn pending(row: u32, contract: OptionsContract, side: Side, size: u32) -> Self {
        Self {
            id: LegId::new(),
            row,
            contract,
            side,
            size,
            entry: EntryPremium::Pending,
            live_premium: None,
            closed: false,
        }
    }

    #[must_use]
    pub fn option_type(&self) -> OptionType {
        self.contract.option_type
    }

    /// Live premium for totals and trigger checks; missing reads count as 0.
    #[must_use]
    pub fn live_or_zero(&self) -> f64 {
        self.live_premium.unwrap_or(0.0)
    }

    #[must_use]
    pub fn instrument_id(&self) -> String {
        self.contract.instrument_id()
    }
}

/// Per-leg premiums captured by one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegQuote {
    pub id: LegId,
    pub row: u32,
    pub entry: EntryPremium,
    pub live: Option<f64>,
}

/// Result of one aggregation pass over the open legs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    /// Sum of settled entry premiums (pending legs count 0).
    pub entry_total: f64,
    /// Sum of live premiums (missing reads count 0).
    pub live_total: f64,
    pub legs: Vec<LegQuote>,
}

impl QuoteSnapshot {
    /// Number of legs whose entry premium is still pending.
    #[must_use]
    pub fn pending_entries(&self) -> usize {
        self.legs.iter().filter(|q| !q.entry.is_settled()).count()
    }
}

/// Adjustment condition that fired on a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// Combined live premium rose above the baseline.
    PremiumBreach { live_total: f64, baseline: f64 },
    /// One leg's live premium sits inside a distress band.
    DistressBand {
        leg: LegId,
        premium: f64,
        band: DistressBand,
    },
}

impl Trigger {
    #[must_use]
    pub const fn reason(&self) -> CloseReason {
        match self {
            Self::PremiumBreach { .. } => CloseReason::PremiumBreach,
            Self::DistressBand { .. } => CloseReason::DistressBand,
        }
    }
}

/// Why a leg was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    PremiumBreach,
    DistressBand,
    SquareOff,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PremiumBreach => write!(f, "premium_breach"),
            Self::DistressBand => write!(f, "distress_band"),
            Self::SquareOff => write!(f, "square_off"),
        }
    }
}

/// Adjustment engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Initializing,
    Monitoring,
    Adjusting,
    /// End-of-day square-off done. Terminal.
    SquaredOff,
    /// No open legs left to monitor. Terminal.
    Flat,
    /// Stopped by the operator between ticks. Terminal.
    Stopped,
    /// A tick failed in a way that leaves leg state uncertain. Terminal.
    Failed,
}

impl EngineState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::SquaredOff | Self::Flat | Self::Stopped | Self::Failed
        )
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing fired (or an adjustment was skipped); keep polling.
    Idle,
    /// A leg was closed; `opened` is its replacement if one was found.
    Adjusted { closed: LegId, opened: Option<LegId> },
    /// A trigger fired but the close instruction could not be written.
    Abandoned,
    SquaredOff,
    Flat,
}

/// Counters kept across the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub adjustments: u64,
    pub replacements_missing: u64,
    pub abandoned_adjustments: u64,
}

/// Final summary returned when the engine loop ends.
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub state: EngineState,
    pub stats: EngineStats,
    pub open_legs: Vec<Leg>,
    pub closed_legs: Vec<Leg>,
    /// Legs whose square-off instruction failed to write.
    pub unclosed: Vec<LegId>,
}
