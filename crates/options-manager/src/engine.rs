//! Adjustment engine: the monitoring state machine.
//!
//! A tick checks the square-off time first, then refreshes quotes and
//! evaluates the triggers. When one fires, a single leg is closed and replaced
//! by the opposite option type at the closed leg's live premium. Ticks are
//! strictly sequential.
//!
//! Cancellation is honoured between ticks only. An adjustment interrupted by a
//! process exit can leave a leg closed with no replacement written; the
//! terminal has no transactions to roll back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use straddle_core::{validate_engine, BaselinePolicy, ConfigError, EngineConfig};
use straddle_terminal::{StoreError, TradeTerminal};

use crate::aggregator::{aggregate, EntryWait};
use crate::schedule::{Clock, SquareOffSchedule};
use crate::triggers::{evaluate, select_leg_to_close};
use crate::types::{
    CloseReason, EngineReport, EngineState, EngineStats, Leg, LegId, QuoteSnapshot, TickOutcome,
    Trigger,
};
use crate::writer::{write_position, PositionRequest};

/// Faults that end the monitoring loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("leg {0} selected for close is not in the open set")]
    UnknownLeg(LegId),
}

pub struct AdjustmentEngine {
    terminal: TradeTerminal,
    config: EngineConfig,
    schedule: SquareOffSchedule,
    clock: Arc<dyn Clock>,
    state: EngineState,
    open: Vec<Leg>,
    closed: Vec<Leg>,
    unclosed: Vec<LegId>,
    /// Entry total the baseline is derived from.
    baseline_seed: f64,
    /// Used when no entry premium has been observed at initialization.
    fallback_seed: f64,
    stats: EngineStats,
    should_stop: Arc<AtomicBool>,
}

impl AdjustmentEngine {
    /// Creates an engine over the legs opened for this session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the engine settings are invalid.
    pub fn new(
        terminal: TradeTerminal,
        config: EngineConfig,
        legs: Vec<Leg>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        validate_engine(&config)?;
        let schedule = SquareOffSchedule::from_config(&config)?;
        Ok(Self {
            terminal,
            config,
            schedule,
            clock,
            state: EngineState::Initializing,
            open: legs,
            closed: Vec::new(),
            unclosed: Vec::new(),
            baseline_seed: 0.0,
            fallback_seed: 0.0,
            stats: EngineStats::default(),
            should_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Baseline seed to use if the legs show no entry premium at start
    /// (typically the sum of the search premiums).
    #[must_use]
    pub fn with_fallback_seed(mut self, seed: f64) -> Self {
        self.fallback_seed = seed;
        self
    }

    /// Shares an externally owned stop flag.
    #[must_use]
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.should_stop = flag;
        self
    }

    /// Returns a handle to stop the engine between ticks.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.should_stop.clone()
    }

    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn open_legs(&self) -> &[Leg] {
        &self.open
    }

    #[must_use]
    pub fn closed_legs(&self) -> &[Leg] {
        &self.closed
    }

    #[must_use]
    pub const fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Current trigger baseline.
    #[must_use]
    pub fn baseline(&self) -> f64 {
        self.baseline_seed * self.config.trigger_multiplier
    }

    fn entry_wait(&self) -> EntryWait {
        EntryWait {
            timeout: self.config.premium_wait_timeout(),
            poll_interval: self.config.premium_poll_interval(),
        }
    }

    async fn refresh(&mut self) -> QuoteSnapshot {
        let wait = self.entry_wait();
        aggregate(&self.terminal, &mut self.open, wait).await
    }

    /// Establishes the first baseline and moves to `Monitoring`.
    pub async fn initialize(&mut self) {
        let snapshot = self.refresh().await;
        if snapshot.entry_total > 0.0 {
            self.baseline_seed = snapshot.entry_total;
        } else {
            warn!(
                fallback = self.fallback_seed,
                "Initial entry premiums are zero, seeding baseline from search premiums"
            );
            self.baseline_seed = self.fallback_seed;
        }
        info!(
            legs = self.open.len(),
            entry_total = snapshot.entry_total,
            baseline = self.baseline(),
            policy = ?self.config.baseline_policy,
            "Monitoring started"
        );
        self.state = EngineState::Monitoring;
    }

    /// Runs one monitoring tick. Sleeps only inside the aggregation wait and
    /// the post-replacement settle delay; the caller owns the inter-tick pause.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when leg state can no longer be trusted.
    pub async fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        if self.state == EngineState::Initializing {
            self.initialize().await;
        }
        self.stats.ticks += 1;
        let now = self.clock.now();

        // 1. End-of-day square-off precedes everything else
        if self.schedule.is_square_off(now) {
            warn!(time = %now.format("%H:%M:%S"), "Square-off time reached, closing all open legs");
            self.square_off().await;
            return Ok(TickOutcome::SquaredOff);
        }

        if self.open.is_empty() {
            info!("No open legs to monitor");
            self.state = EngineState::Flat;
            return Ok(TickOutcome::Flat);
        }

        // 2. Fresh quotes for every open leg
        let snapshot = self.refresh().await;
        if self.config.baseline_policy == BaselinePolicy::Rolling && snapshot.entry_total > 0.0 {
            self.baseline_seed = snapshot.entry_total;
        }

        let underlying = self.terminal.underlying_ltp().await;
        info!(
            legs = self.open.len(),
            entry_total = %format!("{:.2}", snapshot.entry_total),
            live_total = %format!("{:.2}", snapshot.live_total),
            baseline = %format!("{:.3}", self.baseline()),
            underlying = ?underlying,
            "Status"
        );

        // 3. Triggers in priority order
        let Some(trigger) = evaluate(
            &self.open,
            &snapshot,
            self.baseline(),
            now,
            &self.schedule,
            &self.config,
        ) else {
            return Ok(TickOutcome::Idle);
        };

        if self.open.len() < self.config.min_open_legs {
            warn!(
                open = self.open.len(),
                required = self.config.min_open_legs,
                "Adjustment triggered but too few open legs, skipping"
            );
            return Ok(TickOutcome::Idle);
        }

        // 4. Adjust
        self.state = EngineState::Adjusting;
        let outcome = self.adjust(&trigger).await;
        if self.state == EngineState::Adjusting {
            self.state = EngineState::Monitoring;
        }
        outcome
    }

    async fn adjust(&mut self, trigger: &Trigger) -> Result<TickOutcome, EngineError> {
        let Some(leg_id) = select_leg_to_close(
            &self.open,
            trigger,
            self.config.unset_premium_policy,
        ) else {
            warn!(?trigger, "No eligible leg to close, skipping adjustment");
            return Ok(TickOutcome::Idle);
        };

        let leg = self
            .open
            .iter()
            .find(|l| l.id == leg_id)
            .cloned()
            .ok_or(EngineError::UnknownLeg(leg_id))?;

        info!(
            leg = %leg.id,
            instrument = %leg.instrument_id(),
            live = ?leg.live_premium,
            reason = %trigger.reason(),
            "Closing leg"
        );

        match self.close_leg(leg_id, trigger.reason()).await {
            Ok(true) => {}
            Ok(false) => return Ok(TickOutcome::Idle),
            Err(e) => {
                error!(leg = %leg.id, row = leg.row, error = %e, "Close instruction failed, abandoning adjustment");
                self.stats.abandoned_adjustments += 1;
                return Ok(TickOutcome::Abandoned);
            }
        }
        self.stats.adjustments += 1;

        let request = PositionRequest {
            exchange: leg.contract.exchange.clone(),
            symbol: leg.contract.symbol.clone(),
            expiry: leg.contract.expiry,
            option_type: leg.option_type().opposite(),
            target_premium: leg.live_or_zero(),
            size: leg.size,
            side: leg.side,
        };
        info!(
            option_type = %request.option_type,
            target = %format!("{:.2}", request.target_premium),
            "Searching replacement leg"
        );

        let replacement = match write_position(&self.terminal, &request).await {
            Ok(new_leg) => new_leg,
            Err(e) => {
                if e.is_not_found() {
                    warn!(error = %e, remaining = self.open.len(), "No replacement found, monitoring remaining legs");
                } else {
                    error!(error = %e, remaining = self.open.len(), "Replacement write failed, monitoring remaining legs");
                }
                self.stats.replacements_missing += 1;
                // leg set shrank, rebase on what is still open
                if !self.open.is_empty() {
                    self.rebase().await;
                }
                return Ok(TickOutcome::Adjusted {
                    closed: leg_id,
                    opened: None,
                });
            }
        };

        let opened = replacement.id;
        info!(leg = %opened, instrument = %replacement.instrument_id(), row = replacement.row, "Replacement leg written");
        self.open.push(replacement);

        info!(settle_ms = self.config.settle_delay_ms, "Waiting for replacement entry premium");
        sleep(self.config.settle_delay()).await;

        self.rebase().await;

        Ok(TickOutcome::Adjusted {
            closed: leg_id,
            opened: Some(opened),
        })
    }

    /// Re-seeds the baseline from the open legs after the leg set changed.
    async fn rebase(&mut self) {
        let snapshot = self.refresh().await;
        if snapshot.entry_total > 0.0 {
            self.baseline_seed = snapshot.entry_total;
            info!(
                entry_total = snapshot.entry_total,
                baseline = %format!("{:.3}", self.baseline()),
                "Baseline re-seeded"
            );
        } else {
            warn!(baseline = self.baseline(), "No entry premiums on open legs, baseline unchanged");
        }
    }

    /// Writes the close instruction for a leg and moves it out of the open set.
    ///
    /// Returns `Ok(false)` without writing if the leg is already closed or
    /// unknown.
    ///
    /// # Errors
    ///
    /// Returns the store error if the close marker could not be written; the
    /// leg then stays open.
    pub async fn close_leg(&mut self, id: LegId, reason: CloseReason) -> Result<bool, StoreError> {
        let Some(index) = self.open.iter().position(|l| l.id == id) else {
            return Ok(false);
        };
        if self.open[index].closed {
            return Ok(false);
        }

        let row = self.open[index].row;
        self.terminal.write_close_signal(row).await?;

        let mut leg = self.open.remove(index);
        leg.closed = true;
        info!(leg = %leg.id, row, instrument = %leg.instrument_id(), %reason, "Close instruction written");
        self.closed.push(leg);
        Ok(true)
    }

    async fn square_off(&mut self) {
        let ids: Vec<LegId> = self.open.iter().map(|l| l.id).collect();
        for id in ids {
            if let Err(e) = self.close_leg(id, CloseReason::SquareOff).await {
                error!(leg = %id, error = %e, "Square-off instruction failed, close manually");
                self.unclosed.push(id);
            }
        }
        self.state = EngineState::SquaredOff;
    }

    /// Runs ticks until square-off, no legs remain, a stop request, or a fatal error.
    pub async fn run(mut self) -> EngineReport {
        if self.state == EngineState::Initializing {
            self.initialize().await;
        }

        while !self.state.is_terminal() {
            if self.should_stop.load(Ordering::SeqCst) {
                warn!("Stop requested, leaving monitoring loop");
                self.state = EngineState::Stopped;
                break;
            }

            match self.tick().await {
                Ok(TickOutcome::Idle) => self.pause(self.config.poll_interval()).await,
                Ok(TickOutcome::Adjusted { .. } | TickOutcome::Abandoned) => {
                    info!(cooldown_ms = self.config.cooldown_ms, "Cooling down after adjustment");
                    self.pause(self.config.cooldown()).await;
                }
                Ok(TickOutcome::SquaredOff | TickOutcome::Flat) => {}
                Err(e) => {
                    error!(error = ?e, "Critical error in monitoring, stopping");
                    self.state = EngineState::Failed;
                }
            }
        }

        info!(state = ?self.state, ticks = self.stats.ticks, adjustments = self.stats.adjustments, "Monitoring completed");
        self.report()
    }

    async fn pause(&self, duration: Duration) {
        sleep(duration).await;
    }

    #[must_use]
    pub fn report(&self) -> EngineReport {
        EngineReport {
            state: self.state,
            stats: self.stats.clone(),
            open_legs: self.open.clone(),
            closed_legs: self.closed.clone(),
            unclosed: self.unclosed.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;
    use straddle_core::TerminalLayout;
    use straddle_terminal::{CellAddress, MemoryStore, OptionType, OptionsContract, Side};

    use crate::schedule::ManualClock;

    const TERMINAL: &str = "Trade_Terminal";

    fn cell(reference: &str) -> CellAddress {
        CellAddress::parse(TERMINAL, reference).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 28)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn leg(row: u32, option_type: OptionType) -> Leg {
        let contract = OptionsContract::new(
            "NFO",
            "NIFTY",
            NaiveDate::from_ymd_opt(2025, 10, 28).unwrap(),
            dec!(25000),
            option_type,
        );
        Leg::pending(row, contract, Side::Sell, 75)
    }

    fn engine(store: &Arc<MemoryStore>, legs: Vec<Leg>, clock: &ManualClock) -> AdjustmentEngine {
        let terminal = TradeTerminal::new(store.clone(), TerminalLayout::default()).unwrap();
        let config = EngineConfig {
            distress_bands: Vec::new(),
            ..EngineConfig::default()
        };
        AdjustmentEngine::new(terminal, config, legs, Arc::new(clock.clone())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn close_leg_writes_at_most_once() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(at(10, 0));
        let call = leg(2, OptionType::Call);
        let id = call.id;
        let mut engine = engine(&store, vec![call], &clock);

        assert!(engine.close_leg(id, CloseReason::PremiumBreach).await.unwrap());
        assert!(!engine.close_leg(id, CloseReason::PremiumBreach).await.unwrap());

        assert_eq!(store.writes_to(&cell("T2")), 1);
        assert!(engine.open_legs().is_empty());
        assert!(engine.closed_legs()[0].closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_close_keeps_leg_open() {
        let store = Arc::new(MemoryStore::new());
        store.fail(&cell("T2"));
        let clock = ManualClock::new(at(10, 0));
        let call = leg(2, OptionType::Call);
        let id = call.id;
        let mut engine = engine(&store, vec![call], &clock);

        assert!(engine.close_leg(id, CloseReason::PremiumBreach).await.is_err());
        assert_eq!(engine.open_legs().len(), 1);
        assert!(!engine.open_legs()[0].closed);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_baseline_falls_back_to_search_premiums() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(at(10, 0));
        let mut engine = engine(&store, vec![leg(2, OptionType::Call)], &clock).with_fallback_seed(40.0);

        engine.initialize().await;
        assert_eq!(engine.state(), EngineState::Monitoring);
        assert!((engine.baseline() - 40.04).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn rolling_baseline_tracks_entry_total_epoch_holds() {
        let store = Arc::new(MemoryStore::new());
        store.set(&cell("Q2"), 20.0);
        store.set(&cell("K2"), 10.0);
        let clock = ManualClock::new(at(10, 0));

        let mut rolling = engine(&store, vec![leg(2, OptionType::Call)], &clock).with_fallback_seed(35.0);
        rolling.initialize().await;
        assert!((rolling.baseline() - 20.02).abs() < 1e-9);

        // epoch holds the fallback seed until an adjustment
        let terminal = TradeTerminal::new(store.clone(), TerminalLayout::default()).unwrap();
        let config = EngineConfig {
            baseline_policy: BaselinePolicy::Epoch,
            distress_bands: Vec::new(),
            ..EngineConfig::default()
        };
        let mut epoch = AdjustmentEngine::new(terminal, config, vec![leg(3, OptionType::Put)], Arc::new(clock.clone()))
            .unwrap()
            .with_fallback_seed(35.0);
        epoch.initialize().await;
        assert!((epoch.baseline() - 35.035).abs() < 1e-9);

        store.set(&cell("Q3"), 30.0);
        store.set(&cell("K3"), 1.0);
        assert_eq!(epoch.tick().await.unwrap(), TickOutcome::Idle);
        assert!((epoch.baseline() - 35.035).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_flag_ends_run_between_ticks() {
        let store = Arc::new(MemoryStore::new());
        store.set(&cell("Q2"), 20.0);
        store.set(&cell("K2"), 10.0);
        let clock = ManualClock::new(at(10, 0));
        let engine = engine(&store, vec![leg(2, OptionType::Call)], &clock);
        let stop = engine.stop_handle();
        stop.store(true, Ordering::SeqCst);

        let report = engine.run().await;
        assert_eq!(report.state, EngineState::Stopped);
        assert_eq!(report.open_legs.len(), 1);
        assert!(store.journal().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_legs_goes_flat() {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(at(10, 0));
        let report = engine(&store, Vec::new(), &clock).run().await;
        assert_eq!(report.state, EngineState::Flat);
    }

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(MemoryStore::new());
        let terminal = TradeTerminal::new(store, TerminalLayout::default()).unwrap();
        let config = EngineConfig {
            trigger_multiplier: -1.0,
            ..EngineConfig::default()
        };
        let clock = ManualClock::new(at(10, 0));
        assert!(matches!(
            AdjustmentEngine::new(terminal, config, Vec::new(), Arc::new(clock)),
            Err(EngineError::Config(ConfigError::InvalidMultiplier(_)))
        ));
    }
}
