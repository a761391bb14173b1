use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub terminal: TerminalLayout,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// How the trigger baseline follows the aggregate entry premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    /// Re-seed from the latest entry total on every tick.
    Rolling,
    /// Seed once at start, re-seed only after an adjustment.
    Epoch,
}

/// How a leg with no live premium reading is ranked when picking the leg to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsetPremiumPolicy {
    /// Rank the leg as if its premium were 0.
    TreatAsZero,
    /// Leave the leg out of the ranking entirely.
    Exclude,
}

/// Inclusive premium band that marks a single leg as distressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistressBand {
    pub low: f64,
    pub high: f64,
}

impl DistressBand {
    #[must_use]
    pub fn contains(&self, premium: f64) -> bool {
        self.low <= premium && premium <= self.high
    }
}

/// Adjustment engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Square-off hour (local time, 24h).
    pub square_off_hour: u32,
    /// Square-off minute.
    pub square_off_minute: u32,
    /// Distress-band adjustments only fire before this hour.
    pub adjustment_cutoff_hour: u32,
    /// Baseline = entry total x multiplier.
    pub trigger_multiplier: f64,
    pub distress_bands: Vec<DistressBand>,
    pub baseline_policy: BaselinePolicy,
    pub unset_premium_policy: UnsetPremiumPolicy,
    /// Adjustments are skipped while fewer legs than this are open.
    pub min_open_legs: usize,
    /// Also gate the premium-breach trigger on the cutoff hour.
    pub breach_respects_cutoff: bool,
    /// Max wait per leg for its entry premium to populate (ms).
    pub premium_wait_timeout_ms: u64,
    /// Interval between entry premium polls (ms).
    pub premium_poll_interval_ms: u64,
    /// Wait after writing a replacement leg before re-aggregating (ms).
    pub settle_delay_ms: u64,
    /// Pause after an adjustment before monitoring resumes (ms).
    pub cooldown_ms: u64,
    /// Monitoring tick interval (ms).
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            square_off_hour: 15,
            square_off_minute: 29,
            adjustment_cutoff_hour: 14,
            trigger_multiplier: 1.001,
            distress_bands: vec![DistressBand { low: 5.0, high: 8.0 }],
            baseline_policy: BaselinePolicy::Rolling,
            unset_premium_policy: UnsetPremiumPolicy::TreatAsZero,
            min_open_legs: 1,
            breach_respects_cutoff: false,
            premium_wait_timeout_ms: 5_000,
            premium_poll_interval_ms: 200,
            settle_delay_ms: 5_000,
            cooldown_ms: 5_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl EngineConfig {
    /// Square-off wall-clock time, `None` if hour/minute are out of range.
    #[must_use]
    pub fn square_off_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.square_off_hour, self.square_off_minute, 0)
    }

    #[must_use]
    pub const fn premium_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.premium_wait_timeout_ms)
    }

    #[must_use]
    pub const fn premium_poll_interval(&self) -> Duration {
        Duration::from_millis(self.premium_poll_interval_ms)
    }

    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where everything lives in the trading workbook.
///
/// Cells are A1 references (`"AH2"`) resolved against the owning sheet;
/// columns are bare letters (`"Q"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalLayout {
    pub terminal_sheet: String,
    pub input_sheet: String,
    pub chain_sheet: String,
    /// Exchange prefix of instrument ids (e.g. `NFO`).
    pub exchange: String,
    /// First row that may hold a position (rows above are headers).
    pub first_data_row: u32,
    pub columns: TerminalColumns,
    pub chain: ChainColumns,
    pub cells: InputCells,
    pub markers: SignalMarkers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalColumns {
    pub instrument: String,
    pub size: String,
    pub side: String,
    pub entry_signal: String,
    pub entry_premium: String,
    pub live_premium: String,
    pub close_signal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainColumns {
    pub call_premium: String,
    pub put_premium: String,
    pub strike: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputCells {
    /// On the input sheet.
    pub symbol: String,
    /// On the input sheet.
    pub expiry: String,
    /// On the input sheet.
    pub lot_size: String,
    /// On the terminal sheet.
    pub call_search_premium: String,
    /// On the terminal sheet.
    pub put_search_premium: String,
    /// On the terminal sheet; status logging only.
    pub underlying_ltp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalMarkers {
    pub entry_signal: String,
    pub close_signal: String,
}

impl Default for TerminalLayout {
    fn default() -> Self {
        Self {
            terminal_sheet: "Trade_Terminal".to_string(),
            input_sheet: "Option_Chain_Input".to_string(),
            chain_sheet: "Option_Chain_Output".to_string(),
            exchange: "NFO".to_string(),
            first_data_row: 2,
            columns: TerminalColumns::default(),
            chain: ChainColumns::default(),
            cells: InputCells::default(),
            markers: SignalMarkers::default(),
        }
    }
}

impl Default for TerminalColumns {
    fn default() -> Self {
        Self {
            instrument: "A".to_string(),
            size: "M".to_string(),
            side: "N".to_string(),
            entry_signal: "O".to_string(),
            entry_premium: "Q".to_string(),
            live_premium: "K".to_string(),
            close_signal: "T".to_string(),
        }
    }
}

impl Default for ChainColumns {
    fn default() -> Self {
        Self {
            call_premium: "J".to_string(),
            put_premium: "V".to_string(),
            strike: "P".to_string(),
        }
    }
}

impl Default for InputCells {
    fn default() -> Self {
        Self {
            symbol: "E3".to_string(),
            expiry: "E4".to_string(),
            lot_size: "C2".to_string(),
            call_search_premium: "AH2".to_string(),
            put_search_premium: "AI2".to_string(),
            underlying_ltp: Some("K8".to_string()),
        }
    }
}

impl Default for SignalMarkers {
    fn default() -> Self {
        Self {
            entry_signal: "True_Market".to_string(),
            close_signal: "True_Market".to_string(),
        }
    }
}

/// Backing store for the terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Quote snapshot written by the workbook bridge, plus an instruction file
    /// (`<stem>.instructions.json`) written by this process.
    JsonFile,
    /// Load the JSON snapshot once and keep every write in memory.
    Paper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::JsonFile,
            path: PathBuf::from("terminal.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for per-session log files; `None` logs to stderr only.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: Some(PathBuf::from("Logs/personal_trade")),
        }
    }
}
