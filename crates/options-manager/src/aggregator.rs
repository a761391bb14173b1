//! Quote aggregation: entry and live premiums for the open legs.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use straddle_terminal::TradeTerminal;

use crate::types::{EntryPremium, Leg, LegQuote, QuoteSnapshot};

/// Bounds for the entry premium wait.
#[derive(Debug, Clone, Copy)]
pub struct EntryWait {
    /// Max time to wait per pending leg.
    pub timeout: Duration,
    /// Interval between polls while waiting.
    pub poll_interval: Duration,
}

/// Refreshes premiums on `legs` in place and returns the totals.
///
/// Pending legs are polled until their entry premium appears or the wait
/// expires (they stay pending and are retried on the next call). Settled legs
/// keep their first observed entry. Live premiums are re-read on every call.
pub async fn aggregate(terminal: &TradeTerminal, legs: &mut [Leg], wait: EntryWait) -> QuoteSnapshot {
    let mut snapshot = QuoteSnapshot::default();

    for leg in legs.iter_mut() {
        if !leg.entry.is_settled() {
            match await_entry_premium(terminal, leg.row, wait).await {
                Some(premium) => {
                    debug!(leg = %leg.id, row = leg.row, premium, "Entry premium settled");
                    leg.entry = EntryPremium::Settled(premium);
                }
                None => warn!(
                    leg = %leg.id,
                    row = leg.row,
                    timeout_ms = wait.timeout.as_millis() as u64,
                    "Entry premium not populated yet, counting 0 this pass"
                ),
            }
        }

        leg.live_premium = terminal.live_premium(leg.row).await;

        snapshot.entry_total += leg.entry.value();
        snapshot.live_total += leg.live_or_zero();
        snapshot.legs.push(LegQuote {
            id: leg.id,
            row: leg.row,
            entry: leg.entry,
            live: leg.live_premium,
        });
    }

    snapshot
}

async fn await_entry_premium(terminal: &TradeTerminal, row: u32, wait: EntryWait) -> Option<f64> {
    let deadline = Instant::now() + wait.timeout;
    loop {
        if let Some(premium) = terminal.entry_premium(row).await {
            return Some(premium);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(wait.poll_interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use straddle_core::TerminalLayout;
    use straddle_terminal::{CellAddress, MemoryStore, OptionType, OptionsContract, Side};

    const TERMINAL: &str = "Trade_Terminal";

    fn cell(reference: &str) -> CellAddress {
        CellAddress::parse(TERMINAL, reference).unwrap()
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

    fn wait() -> EntryWait {
        EntryWait {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(200),
        }
    }

    fn setup() -> (Arc<MemoryStore>, TradeTerminal) {
        let store = Arc::new(MemoryStore::new());
        let terminal = TradeTerminal::new(store.clone(), TerminalLayout::default()).unwrap();
        (store, terminal)
    }

    #[tokio::test(start_paused = true)]
    async fn sums_entry_and_live_premiums() {
        let (store, terminal) = setup();
        store.set(&cell("Q2"), 20.0);
        store.set(&cell("K2"), 21.0);
        store.set(&cell("Q3"), 18.0);
        store.set(&cell("K3"), 17.5);
        let mut legs = vec![leg(2, OptionType::Call), leg(3, OptionType::Put)];

        let snapshot = aggregate(&terminal, &mut legs, wait()).await;

        assert!((snapshot.entry_total - 38.0).abs() < 1e-9);
        assert!((snapshot.live_total - 38.5).abs() < 1e-9);
        assert_eq!(legs[0].entry, EntryPremium::Settled(20.0));
        assert_eq!(snapshot.legs.len(), 2);
        assert_eq!(snapshot.legs[1].row, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_first_observed_value_and_live_is_latest() {
        let (store, terminal) = setup();
        store.set(&cell("Q2"), 20.0);
        store.set(&cell("K2"), 20.0);
        let mut legs = vec![leg(2, OptionType::Call)];
        aggregate(&terminal, &mut legs, wait()).await;

        // terminal rewrites both cells; only the live reading may move
        store.set(&cell("Q2"), 55.0);
        store.set(&cell("K2"), 31.0);
        let snapshot = aggregate(&terminal, &mut legs, wait()).await;

        assert!((snapshot.entry_total - 20.0).abs() < 1e-9);
        assert!((snapshot.live_total - 31.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_entry_times_out_and_is_retried() {
        let (store, terminal) = setup();
        store.set(&cell("K2"), 12.0);
        let mut legs = vec![leg(2, OptionType::Call)];

        let started = Instant::now();
        let snapshot = aggregate(&terminal, &mut legs, wait()).await;
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(snapshot.entry_total, 0.0);
        assert!((snapshot.live_total - 12.0).abs() < 1e-9);
        assert_eq!(snapshot.pending_entries(), 1);

        store.set(&cell("Q2"), 14.0);
        let snapshot = aggregate(&terminal, &mut legs, wait()).await;
        assert!((snapshot.entry_total - 14.0).abs() < 1e-9);
        assert_eq!(snapshot.pending_entries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_populating_mid_wait_is_picked_up() {
        let (store, terminal) = setup();
        let mut legs = vec![leg(2, OptionType::Put)];

        let feeder = {
            let store = store.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(900)).await;
                store.set(&CellAddress::parse(TERMINAL, "Q2").unwrap(), 18.0);
            })
        };

        let started = Instant::now();
        let snapshot = aggregate(&terminal, &mut legs, wait()).await;
        feeder.await.unwrap();

        assert!((snapshot.entry_total - 18.0).abs() < 1e-9);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_live_premium_counts_zero_but_keeps_leg() {
        let (store, terminal) = setup();
        store.set(&cell("Q2"), 20.0);
        store.set(&cell("Q3"), 18.0);
        store.set(&cell("K3"), 19.0);
        store.fail(&cell("K2"));
        let mut legs = vec![leg(2, OptionType::Call), leg(3, OptionType::Put)];

        let snapshot = aggregate(&terminal, &mut legs, wait()).await;

        assert_eq!(snapshot.legs.len(), 2);
        assert_eq!(legs[0].live_premium, None);
        assert!((snapshot.live_total - 19.0).abs() < 1e-9);
        assert!((snapshot.entry_total - 38.0).abs() < 1e-9);
    }
}
